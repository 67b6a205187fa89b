use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of `f64` values in a map→ECEF [`AlignmentRecord`].
pub const ALIGNMENT_LEN: usize = 13;

/// Map→ECEF alignment record for one map, as delivered by the alignment
/// service.
///
/// The layout is owned by the geodesy engine; everything upstream of the
/// geodesy boundary passes the record around whole without looking inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord([f64; ALIGNMENT_LEN]);

impl AlignmentRecord {
    pub fn new(values: [f64; ALIGNMENT_LEN]) -> Self {
        Self(values)
    }

    /// Raw values, for handing to a geodesy engine.
    pub fn as_array(&self) -> &[f64; ALIGNMENT_LEN] {
        &self.0
    }
}

/// Pinhole camera intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length along X.
    pub fx: f32,
    /// Focal length along Y.
    pub fy: f32,
    /// Principal point X.
    pub ox: f32,
    /// Principal point Y.
    pub oy: f32,
}

impl CameraIntrinsics {
    pub fn new(fx: f32, fy: f32, ox: f32, oy: f32) -> Self {
        Self { fx, fy, ox, oy }
    }

    /// `[fx, fy, ox, oy]`, the order localization engines expect.
    pub fn as_array(&self) -> [f32; 4] {
        [self.fx, self.fy, self.ox, self.oy]
    }
}

/// A geodetic position on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wgs84 {
    /// Geodetic latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Height above the ellipsoid in metres.
    pub altitude: f64,
}

impl Wgs84 {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Cumulative localization counters for one session.
///
/// Both counters only ever grow; `successes <= attempts` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub attempts: u64,
    pub successes: u64,
}

impl SessionStats {
    /// Fraction of attempts that localized, `0.0` before the first attempt.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.successes, self.attempts)
    }
}

/// Error type shared by every geoanchor crate.
///
/// All variants are scoped to a single localization attempt; none of them
/// should bring the process down.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LocError {
    /// The engine found no match for this frame.
    #[error("no localization: engine found no match for this frame")]
    NoLocalization,

    /// The corrected map-local pose could not be inverted.
    #[error("singular pose: map-local pose matrix is not invertible")]
    SingularPose,

    /// No alignment record is loaded, or a geodesy call failed.
    #[error("geodesy unavailable: {0}")]
    GeodesyUnavailable(String),

    /// The camera forward ray has no horizontal component.
    #[error("degenerate heading: forward ray has no horizontal component")]
    DegenerateHeading,

    /// A collaborator (camera, localizer, alignment service) failed.
    #[error("engine fault on {component}: {details}")]
    EngineFault { component: String, details: String },

    /// A localization request is already outstanding.
    #[error("a localization attempt is already in flight")]
    AttemptInFlight,
}

impl LocError {
    /// Shorthand for [`LocError::EngineFault`].
    pub fn engine(component: impl Into<String>, details: impl Into<String>) -> Self {
        Self::EngineFault {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_record_serialization_roundtrip() {
        let mut values = [0.0; ALIGNMENT_LEN];
        values[0] = 6_378_137.0;
        values[12] = 1.0;
        let record = AlignmentRecord::new(values);
        let json = serde_json::to_string(&record).unwrap();
        let back: AlignmentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn intrinsics_array_order() {
        let k = CameraIntrinsics::new(1400.0, 1410.0, 960.0, 540.0);
        assert_eq!(k.as_array(), [1400.0, 1410.0, 960.0, 540.0]);
    }

    #[test]
    fn session_stats_display_and_rate() {
        let stats = SessionStats {
            attempts: 10,
            successes: 6,
        };
        assert_eq!(stats.to_string(), "6/10");
        assert!((stats.success_rate() - 0.6).abs() < 1e-12);
        assert_eq!(SessionStats::default().success_rate(), 0.0);
    }

    #[test]
    fn loc_error_display() {
        let err = LocError::GeodesyUnavailable("no alignment record".to_string());
        assert!(err.to_string().contains("no alignment record"));

        let err2 = LocError::engine("localizer", "engine returned -3");
        assert!(err2.to_string().contains("localizer"));
        assert!(err2.to_string().contains("-3"));
    }

    #[test]
    fn loc_error_roundtrip() {
        let err = LocError::engine("camera", "disconnected");
        let json = serde_json::to_string(&err).unwrap();
        let back: LocError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
