//! [`LocalizationSession`] – per-process localization state.
//!
//! Holds the attempt/success counters, the map currently loaded, its
//! map→ECEF alignment record (once fetched) and the last good anchor pose.
//! There is no global instance: whoever drives localization owns the session
//! and must serialize calls into it.

use geoanchor_perception::{
    Affine4, CameraSample, GeoHeading, Geodesy, LocalizationResult, build_anchor_pose,
    estimate_geo_heading,
};
use geoanchor_types::{AlignmentRecord, LocError, SessionStats};
use tracing::{debug, info, warn};

/// Pure counter update for one completed attempt.
///
/// `attempts` always increments; `successes` increments iff the engine
/// matched a map.
pub fn record_attempt(stats: SessionStats, result: &LocalizationResult) -> SessionStats {
    SessionStats {
        attempts: stats.attempts + 1,
        successes: stats.successes + u64::from(result.is_success()),
    }
}

/// Mutable localization state for one running session.
///
/// # Example
///
/// ```
/// use geoanchor_perception::{Affine4, LocalizationResult, Quaternion, Vec3};
/// use geoanchor_runtime::session::LocalizationSession;
///
/// let mut session = LocalizationSession::new();
/// session.load_map(92528);
///
/// let hit = LocalizationResult::new(0, Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
/// assert!(session.apply(&hit, &Affine4::identity()).is_ok());
/// assert!(session.apply(&LocalizationResult::no_match(), &Affine4::identity()).is_err());
///
/// assert_eq!(session.summary(), "Successful localizations: 1/2");
/// ```
#[derive(Debug, Default)]
pub struct LocalizationSession {
    stats: SessionStats,
    map_id: Option<u32>,
    alignment: Option<AlignmentRecord>,
    anchor: Option<Affine4>,
}

impl LocalizationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn map_id(&self) -> Option<u32> {
        self.map_id
    }

    pub fn alignment(&self) -> Option<&AlignmentRecord> {
        self.alignment.as_ref()
    }

    /// Map origin in tracking space, from the most recent good localization.
    pub fn anchor(&self) -> Option<&Affine4> {
        self.anchor.as_ref()
    }

    /// Count one completed attempt and return the new snapshot.
    pub fn record_attempt(&mut self, result: &LocalizationResult) -> SessionStats {
        self.stats = record_attempt(self.stats, result);
        self.stats
    }

    /// Switch to `map_id`. The previous map's alignment record and anchor are
    /// dropped; counters carry on.
    pub fn load_map(&mut self, map_id: u32) {
        if self.map_id != Some(map_id) {
            info!(map_id, "map loaded; waiting for alignment record");
        }
        self.map_id = Some(map_id);
        self.alignment = None;
        self.anchor = None;
    }

    /// Store the alignment record fetched for `map_id`.
    ///
    /// Returns `false` and leaves the session unchanged when `map_id` is not
    /// the map currently loaded (a fetch that finished after a map switch).
    pub fn set_alignment(&mut self, map_id: u32, record: AlignmentRecord) -> bool {
        if self.map_id != Some(map_id) {
            warn!(
                map_id,
                current = ?self.map_id,
                "ignoring alignment record for a map that is not loaded"
            );
            return false;
        }
        self.alignment = Some(record);
        true
    }

    /// Record the attempt and, if it localized, update the anchor.
    ///
    /// On error the previous anchor is kept.
    ///
    /// # Errors
    ///
    /// [`LocError::NoLocalization`] or [`LocError::SingularPose`], as from
    /// [`build_anchor_pose`].
    pub fn apply(
        &mut self,
        result: &LocalizationResult,
        camera_transform: &Affine4,
    ) -> Result<Affine4, LocError> {
        let stats = self.record_attempt(result);

        match build_anchor_pose(result, camera_transform) {
            Ok(anchor) => {
                let t = anchor.translation();
                info!(
                    map_handle = result.map_handle,
                    confidence = result.confidence,
                    x = t.x,
                    y = t.y,
                    z = t.z,
                    successes = stats.successes,
                    attempts = stats.attempts,
                    "localized"
                );
                self.anchor = Some(anchor);
                Ok(anchor)
            }
            Err(LocError::NoLocalization) => {
                debug!(attempts = stats.attempts, "no localization this attempt");
                Err(LocError::NoLocalization)
            }
            Err(e) => {
                warn!(error = %e, "keeping previous anchor");
                Err(e)
            }
        }
    }

    /// Tracking space → map space, the inverse of the current anchor.
    ///
    /// # Errors
    ///
    /// - [`LocError::NoLocalization`] before the first good localization.
    /// - [`LocError::SingularPose`] when the stored anchor cannot be
    ///   inverted (e.g. a degenerate camera transform).
    pub fn tracker_to_map(&self) -> Result<Affine4, LocError> {
        let anchor = self.anchor.ok_or(LocError::NoLocalization)?;
        anchor.invert().map_err(|e| {
            warn!(det = e.det, "anchor not invertible; heading unavailable");
            LocError::SingularPose
        })
    }

    /// Geodetic position and compass heading for `camera`.
    ///
    /// # Errors
    ///
    /// - [`LocError::NoLocalization`] before the first good localization.
    /// - [`LocError::SingularPose`] when the anchor cannot be inverted.
    /// - [`LocError::GeodesyUnavailable`] before the alignment record arrives
    ///   or when the geodesy engine fails.
    /// - [`LocError::DegenerateHeading`] when looking straight up or down.
    pub fn heading<G: Geodesy + ?Sized>(
        &self,
        camera: &CameraSample,
        geodesy: &G,
    ) -> Result<GeoHeading, LocError> {
        let tracker_to_map = self.tracker_to_map()?;
        estimate_geo_heading(&tracker_to_map, camera, self.alignment.as_ref(), geodesy)
    }

    /// The on-screen status line.
    pub fn summary(&self) -> String {
        format!("Successful localizations: {}", self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoanchor_hal::sim::{Wgs84Geodesy, level_camera_rotation};
    use geoanchor_perception::{Quaternion, Vec3};
    use geoanchor_types::{CameraIntrinsics, Wgs84};

    fn hit() -> LocalizationResult {
        LocalizationResult::new(0, Vec3::new(1.0, 2.0, 3.0), Quaternion::identity())
    }

    fn camera() -> CameraSample {
        CameraSample::new(Affine4::identity(), CameraIntrinsics::new(1.0, 1.0, 0.5, 0.5))
    }

    #[test]
    fn record_attempt_counts_misses_as_attempts_only() {
        let stats = record_attempt(SessionStats::default(), &LocalizationResult::no_match());
        assert_eq!(
            stats,
            SessionStats {
                attempts: 1,
                successes: 0
            }
        );
    }

    #[test]
    fn ten_attempts_six_successes() {
        let pattern = [true, false, true, true, false, true, false, true, false, true];
        let mut session = LocalizationSession::new();
        for &ok in &pattern {
            let result = if ok { hit() } else { LocalizationResult::no_match() };
            let _ = session.apply(&result, &Affine4::identity());
            // Reads in between never change the counters.
            let _ = session.stats();
            let _ = session.summary();
        }
        assert_eq!(
            session.stats(),
            SessionStats {
                attempts: 10,
                successes: 6
            }
        );
    }

    #[test]
    fn miss_keeps_previous_anchor() {
        let mut session = LocalizationSession::new();
        let anchor = session.apply(&hit(), &Affine4::identity()).unwrap();
        assert_eq!(
            session.apply(&LocalizationResult::no_match(), &Affine4::identity()),
            Err(LocError::NoLocalization)
        );
        assert_eq!(session.anchor(), Some(&anchor));
    }

    #[test]
    fn singular_pose_keeps_previous_anchor_and_counts_success() {
        let mut session = LocalizationSession::new();
        let anchor = session.apply(&hit(), &Affine4::identity()).unwrap();
        let singular = LocalizationResult::new(0, Vec3::zero(), Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(
            session.apply(&singular, &Affine4::identity()),
            Err(LocError::SingularPose)
        );
        assert_eq!(session.anchor(), Some(&anchor));
        // The engine did report a match.
        assert_eq!(session.stats().successes, 2);
    }

    #[test]
    fn load_map_clears_alignment_and_anchor() {
        let mut session = LocalizationSession::new();
        session.load_map(1);
        assert!(session.set_alignment(1, AlignmentRecord::new([1.0; 13])));
        session.apply(&hit(), &Affine4::identity()).unwrap();

        session.load_map(2);
        assert!(session.alignment().is_none());
        assert!(session.anchor().is_none());
        assert_eq!(session.stats().attempts, 1);
    }

    #[test]
    fn stale_alignment_is_ignored() {
        let mut session = LocalizationSession::new();
        session.load_map(2);
        assert!(!session.set_alignment(1, AlignmentRecord::new([1.0; 13])));
        assert!(session.alignment().is_none());
    }

    #[test]
    fn heading_needs_anchor_then_alignment() {
        let geodesy = Wgs84Geodesy::new();
        let mut session = LocalizationSession::new();
        session.load_map(7);

        assert_eq!(
            session.heading(&camera(), &geodesy),
            Err(LocError::NoLocalization)
        );

        let facing_west = LocalizationResult::new(0, Vec3::zero(), level_camera_rotation(90.0));
        session.apply(&facing_west, &camera().transform).unwrap();
        assert!(matches!(
            session.heading(&camera(), &geodesy),
            Err(LocError::GeodesyUnavailable(_))
        ));

        let record = Wgs84Geodesy::enu_aligned_record(Wgs84::new(48.85, 2.35, 35.0), 1.0).unwrap();
        assert!(session.set_alignment(7, record));
        let g = session.heading(&camera(), &geodesy).unwrap();
        assert!((g.heading_deg - 90.0).abs() < 1e-2, "heading={}", g.heading_deg);
        assert!((g.position.latitude - 48.85).abs() < 1e-4);
    }

    #[test]
    fn degenerate_camera_anchor_reports_singular_heading() {
        let geodesy = Wgs84Geodesy::new();
        let mut session = LocalizationSession::new();
        session.load_map(7);
        let record = Wgs84Geodesy::enu_aligned_record(Wgs84::new(48.85, 2.35, 35.0), 1.0).unwrap();
        assert!(session.set_alignment(7, record));

        // Linear block diag(1e-3): the anchor is stored, but its determinant
        // (1e-9) is below the inversion threshold.
        let mut rows = Affine4::identity().rows;
        for (i, row) in rows.iter_mut().enumerate().take(3) {
            row[i] = 1e-3;
        }
        let squashed = CameraSample::new(Affine4::from_rows(rows), camera().intrinsics);

        assert!(session.apply(&hit(), &squashed.transform).is_ok());
        assert_eq!(session.tracker_to_map(), Err(LocError::SingularPose));
        assert_eq!(session.heading(&squashed, &geodesy), Err(LocError::SingularPose));
    }

    #[test]
    fn tracker_to_map_needs_an_anchor() {
        let mut session = LocalizationSession::new();
        assert_eq!(session.tracker_to_map(), Err(LocError::NoLocalization));

        session.apply(&hit(), &Affine4::identity()).unwrap();
        let tracker_to_map = session.tracker_to_map().unwrap();
        let p = tracker_to_map.transform_point(Vec3::zero());
        assert!((p.x - 1.0).abs() < 1e-5 && (p.y - 2.0).abs() < 1e-5 && (p.z - 3.0).abs() < 1e-5);
    }

    #[test]
    fn summary_matches_status_label() {
        let mut session = LocalizationSession::new();
        session.record_attempt(&hit());
        session.record_attempt(&LocalizationResult::no_match());
        session.record_attempt(&hit());
        assert_eq!(session.summary(), "Successful localizations: 2/3");
    }
}
