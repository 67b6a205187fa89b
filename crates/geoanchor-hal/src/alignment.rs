//! The map→ECEF alignment service boundary.
//!
//! Alignment records are fetched once per map over the network. This crate
//! only defines the contract; the transport lives with the implementor. The
//! record arrives already parsed.

use async_trait::async_trait;
use geoanchor_types::{AlignmentRecord, LocError};

/// Source of map→ECEF alignment records.
#[async_trait]
pub trait AlignmentSource: Send + Sync {
    /// Fetch the alignment record for `map_id` using the credential `token`.
    ///
    /// `Ok(None)` means the map exists but has no Earth alignment.
    ///
    /// # Errors
    ///
    /// Returns [`LocError::EngineFault`] when the service rejects the request
    /// or cannot be reached.
    async fn fetch(&self, map_id: u32, token: &str) -> Result<Option<AlignmentRecord>, LocError>;
}
