//! [`LocalizeLoop`] – single-flight localization driver.
//!
//! Each tick:
//!
//! 1. **Capture** – take the current frame and camera pose from the
//!    [`Camera`].
//! 2. **Localize** – move the frame and the engine handle onto the blocking
//!    pool and run [`Localizer::localize`] there. The caller's task is never
//!    blocked by the engine.
//! 3. **Apply** – count the attempt and, on a match, rebuild the anchor in the
//!    [`LocalizationSession`].
//! 4. **Orient** – derive the camera's geodetic position and compass heading
//!    once the map's alignment record is known.
//!
//! # Single flight
//!
//! Only one engine call is ever outstanding. [`LocalizeLoop::submit`] returns
//! [`LocError::AttemptInFlight`] while a call is pending. A tick that is
//! cancelled mid-flight (its future dropped) does not lose the call: the next
//! [`tick`][LocalizeLoop::tick] waits for it and applies its result instead of
//! starting a new one.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use geoanchor_hal::sim::{SimCamera, SimLocalizer, StaticAlignmentSource, Wgs84Geodesy};
//! use geoanchor_perception::{Quaternion, Vec3};
//! use geoanchor_runtime::localize_loop::LocalizeLoop;
//!
//! # async fn run() -> Result<(), geoanchor_types::LocError> {
//! let mut lp = LocalizeLoop::new(
//!     Box::new(SimCamera::new("sim")),
//!     Box::new(SimLocalizer::new(0, Vec3::zero(), Quaternion::identity())),
//!     Arc::new(StaticAlignmentSource::new()),
//!     Arc::new(Wgs84Geodesy::new()),
//! );
//! lp.load_map(92528, "token").await?;
//! let report = lp.tick().await?;
//! println!("{}", lp.session().summary());
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geoanchor_hal::{AlignmentSource, Camera, CapturedFrame, Localizer};
use geoanchor_perception::{Affine4, CameraSample, GeoHeading, Geodesy, LocalizationResult};
use geoanchor_types::{LocError, SessionStats};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::session::LocalizationSession;

type EngineReturn = (Box<dyn Localizer>, Result<LocalizationResult, LocError>);

// ─────────────────────────────────────────────────────────────────────────────
// Tick report
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one completed attempt produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Raw engine output.
    pub result: LocalizationResult,
    /// The new anchor, or why it was not updated this tick.
    pub anchor: Result<Affine4, LocError>,
    /// Position and heading of the camera that took the frame. Computed from
    /// the current anchor, which may be from an earlier tick.
    pub heading: Result<GeoHeading, LocError>,
    /// Counters after this attempt.
    pub stats: SessionStats,
    pub completed_at: DateTime<Utc>,
}

struct InFlight {
    handle: JoinHandle<EngineReturn>,
    sample: CameraSample,
}

// ─────────────────────────────────────────────────────────────────────────────
// LocalizeLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the collaborators and the [`LocalizationSession`] they feed.
pub struct LocalizeLoop {
    camera: Box<dyn Camera>,
    /// `None` while the engine handle is out on the blocking pool.
    localizer: Option<Box<dyn Localizer>>,
    alignment_source: Arc<dyn AlignmentSource>,
    geodesy: Arc<dyn Geodesy>,
    session: LocalizationSession,
    in_flight: Option<InFlight>,
}

impl LocalizeLoop {
    pub fn new(
        camera: Box<dyn Camera>,
        localizer: Box<dyn Localizer>,
        alignment_source: Arc<dyn AlignmentSource>,
        geodesy: Arc<dyn Geodesy>,
    ) -> Self {
        Self {
            camera,
            localizer: Some(localizer),
            alignment_source,
            geodesy,
            session: LocalizationSession::new(),
            in_flight: None,
        }
    }

    pub fn session(&self) -> &LocalizationSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut LocalizationSession {
        &mut self.session
    }

    pub fn camera_id(&self) -> &str {
        self.camera.id()
    }

    /// `true` while an engine call is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Switch the session to `map_id` and fetch its alignment record.
    ///
    /// Returns whether an alignment record was stored. `Ok(false)` means the
    /// map has none; localization still works but headings stay unavailable.
    ///
    /// # Errors
    ///
    /// Propagates the alignment service's error. The map stays loaded.
    #[instrument(skip(self, token))]
    pub async fn load_map(&mut self, map_id: u32, token: &str) -> Result<bool, LocError> {
        self.session.load_map(map_id);

        match self.alignment_source.fetch(map_id, token).await {
            Ok(Some(record)) => {
                info!(map_id, "alignment record received");
                Ok(self.session.set_alignment(map_id, record))
            }
            Ok(None) => {
                warn!(map_id, "map has no earth alignment; headings unavailable");
                Ok(false)
            }
            Err(e) => {
                error!(map_id, error = %e, "alignment fetch failed");
                Err(e)
            }
        }
    }

    /// Capture a frame and hand it to the engine on the blocking pool.
    ///
    /// Must be called from inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`LocError::AttemptInFlight`] if a call is already pending.
    /// - [`LocError::EngineFault`] if the camera has no frame or the engine
    ///   handle was lost to a panic in an earlier call.
    pub fn submit(&mut self) -> Result<(), LocError> {
        if self.in_flight.is_some() {
            return Err(LocError::AttemptInFlight);
        }
        let mut localizer = self.localizer.take().ok_or_else(|| {
            LocError::engine("localizer", "engine handle lost after a panicked call")
        })?;

        let CapturedFrame { frame, sample } = match self.camera.capture() {
            Ok(captured) => captured,
            Err(e) => {
                self.localizer = Some(localizer);
                return Err(e);
            }
        };

        debug!(
            camera = self.camera.id(),
            width = frame.width(),
            height = frame.height(),
            "frame submitted"
        );
        let intrinsics = sample.intrinsics;
        let handle = tokio::task::spawn_blocking(move || {
            let outcome = localizer.localize(&frame, &intrinsics);
            (localizer, outcome)
        });
        self.in_flight = Some(InFlight { handle, sample });
        Ok(())
    }

    /// Wait for the pending engine call and apply its result.
    ///
    /// Cancel-safe: if this future is dropped the call stays pending and the
    /// next `complete` picks it up.
    ///
    /// # Errors
    ///
    /// - [`LocError::EngineFault`] if nothing is pending, the engine failed
    ///   or the engine call panicked. Engine faults are not counted as
    ///   attempts.
    pub async fn complete(&mut self) -> Result<TickReport, LocError> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Err(LocError::engine("localize_loop", "no attempt pending"));
        };
        let sample = in_flight.sample;
        let joined = (&mut in_flight.handle).await;
        self.in_flight = None;

        let (localizer, outcome) = joined.map_err(|e| {
            error!(error = %e, "engine call did not complete");
            LocError::engine("localizer", format!("engine call panicked: {e}"))
        })?;
        self.localizer = Some(localizer);

        let result = outcome.inspect_err(|e| warn!(error = %e, "engine fault"))?;
        let anchor = self.session.apply(&result, &sample.transform);
        let heading = self.session.heading(&sample, self.geodesy.as_ref());
        if let Ok(h) = &heading {
            debug!(
                latitude = h.position.latitude,
                longitude = h.position.longitude,
                heading_deg = h.heading_deg,
                "camera oriented"
            );
        }

        Ok(TickReport {
            result,
            anchor,
            heading,
            stats: self.session.stats(),
            completed_at: Utc::now(),
        })
    }

    /// One localization attempt end to end.
    ///
    /// If an earlier tick was cancelled while its call was pending, that call
    /// is completed and reported instead of starting a new one.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<TickReport, LocError> {
        if self.in_flight.is_none() {
            self.submit()?;
        } else {
            debug!("resuming attempt left pending by a cancelled tick");
        }
        self.complete().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
