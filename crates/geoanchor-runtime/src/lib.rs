//! `geoanchor-runtime` – localization session state and the loop that drives
//! it.
//!
//! # Modules
//!
//! - [`session`] – [`LocalizationSession`][session::LocalizationSession]:
//!   attempt/success counters, loaded map, alignment record and the current
//!   anchor pose.
//! - [`localize_loop`] – [`LocalizeLoop`][localize_loop::LocalizeLoop]:
//!   capture → localize off-thread → apply → orient, with at most one engine
//!   call in flight.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod localize_loop;
pub mod session;
pub mod telemetry;

pub use localize_loop::{LocalizeLoop, TickReport};
pub use session::{LocalizationSession, record_attempt};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
