//! Tangent-plane compass heading.
//!
//! Two points along the camera's forward ray are pushed from tracking space
//! into map space, then through the [`Geodesy`] engine into ECEF. The ECEF
//! displacement between them is rotated into the local East-North-Up frame
//! at the camera's latitude/longitude, and its horizontal part is reduced to
//! an angle.
//!
//! Positions up to map space are `f32`; everything from ECEF on is `f64`.
//!
//! # Heading convention
//!
//! `heading = atan2(-d.x, d.y)` in degrees, wrapped into `[0, 360)`, where
//! `d` is the unit horizontal (east, north) displacement. Facing north reads
//! 0°. The angle grows counter-clockwise seen from above, so west reads 90°
//! and east 270°.

use geoanchor_types::{AlignmentRecord, CameraIntrinsics, LocError, Wgs84};
use tracing::debug;

use crate::transform::{Affine4, Quaternion, Vec3};

/// An ECEF position in metres.
pub type Ecef = [f64; 3];

/// Below this length a displacement is treated as zero.
const DEGENERATE_EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Geodesy boundary
// ────────────────────────────────────────────────────────────────────────────

/// The external geodesy engine.
///
/// Implementations own the layout of [`AlignmentRecord`]; callers hand the
/// record over whole. Every failure must be reported as
/// [`LocError::GeodesyUnavailable`].
pub trait Geodesy: Send + Sync {
    /// Map-local position → ECEF.
    fn map_to_ecef(&self, map: Vec3, alignment: &AlignmentRecord) -> Result<Ecef, LocError>;

    /// ECEF → map-local position.
    fn ecef_to_map(&self, ecef: Ecef, alignment: &AlignmentRecord) -> Result<Vec3, LocError>;

    /// ECEF → geodetic latitude/longitude/altitude.
    fn ecef_to_wgs84(&self, ecef: Ecef) -> Result<Wgs84, LocError>;

    /// Geodetic → ECEF.
    fn wgs84_to_ecef(&self, wgs84: Wgs84) -> Result<Ecef, LocError>;

    /// Map-local orientation → ECEF orientation.
    fn rot_map_to_ecef(
        &self,
        map: Quaternion,
        alignment: &AlignmentRecord,
    ) -> Result<Quaternion, LocError>;

    /// ECEF orientation → map-local orientation.
    fn rot_ecef_to_map(
        &self,
        ecef: Quaternion,
        alignment: &AlignmentRecord,
    ) -> Result<Quaternion, LocError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs / outputs
// ────────────────────────────────────────────────────────────────────────────

/// Per-frame camera snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSample {
    /// Camera → tracking space.
    pub transform: Affine4,
    pub intrinsics: CameraIntrinsics,
}

impl CameraSample {
    pub fn new(transform: Affine4, intrinsics: CameraIntrinsics) -> Self {
        Self {
            transform,
            intrinsics,
        }
    }

    /// Camera position in tracking space.
    pub fn position(&self) -> Vec3 {
        self.transform.translation()
    }

    /// Viewing direction in tracking space; the camera looks down its own −Z.
    pub fn forward(&self) -> Vec3 {
        self.transform.axis(2).neg()
    }
}

/// Geodetic camera position plus compass heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoHeading {
    pub position: Wgs84,
    /// Degrees in `[0, 360)`, 0° = north, growing counter-clockwise seen
    /// from above (west 90°, east 270°). Not a clockwise compass bearing:
    /// a UI showing one needs `(360 - heading_deg) % 360`.
    pub heading_deg: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Estimation
// ────────────────────────────────────────────────────────────────────────────

/// ECEF → ENU rotation at a geodetic point:
/// `Rx(90° − lat) · Rz(90° + lon)`, Z applied first.
///
/// Both factors are frame rotations, so the rows of the result are the local
/// East, North and Up unit vectors expressed in ECEF.
pub fn tangent_rotation(latitude_deg: f64, longitude_deg: f64) -> [[f64; 3]; 3] {
    let (s1, c1) = (90.0 - latitude_deg).to_radians().sin_cos();
    let (s3, c3) = (90.0 + longitude_deg).to_radians().sin_cos();
    let rx = [[1.0, 0.0, 0.0], [0.0, c1, s1], [0.0, -s1, c1]];
    let rz = [[c3, s3, 0.0], [-s3, c3, 0.0], [0.0, 0.0, 1.0]];

    let mut out = [[0.0f64; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| rx[i][k] * rz[k][j]).sum();
        }
    }
    out
}

/// Heading in degrees for a horizontal (east, north) displacement.
///
/// # Errors
///
/// [`LocError::DegenerateHeading`] when the displacement is zero.
pub fn heading_from_horizontal(east: f64, north: f64) -> Result<f64, LocError> {
    let len = east.hypot(north);
    if !(len > DEGENERATE_EPSILON) {
        return Err(LocError::DegenerateHeading);
    }
    let (dx, dy) = (east / len, north / len);

    let mut heading = (-dx).atan2(dy).to_degrees();
    if heading < 0.0 {
        heading += 360.0;
    }
    // -tiny + 360 rounds to exactly 360.
    if heading >= 360.0 {
        heading -= 360.0;
    }
    Ok(heading)
}

/// Camera geodetic position and compass heading.
///
/// # Errors
///
/// - [`LocError::GeodesyUnavailable`] when `alignment` is `None` or any
///   geodesy call fails.
/// - [`LocError::DegenerateHeading`] when the forward ray is vertical.
pub fn estimate_geo_heading<G: Geodesy + ?Sized>(
    tracker_to_map: &Affine4,
    camera: &CameraSample,
    alignment: Option<&AlignmentRecord>,
    geodesy: &G,
) -> Result<GeoHeading, LocError> {
    let alignment = alignment.ok_or_else(|| {
        LocError::GeodesyUnavailable("no alignment record for the current map".to_string())
    })?;

    let p = camera.position();
    let a = tracker_to_map.transform_point(p);
    let b = tracker_to_map.transform_point(p.add(camera.forward()));

    let a_ecef = geodesy.map_to_ecef(a, alignment).map_err(as_geodesy_error)?;
    let b_ecef = geodesy.map_to_ecef(b, alignment).map_err(as_geodesy_error)?;
    let position = geodesy.ecef_to_wgs84(a_ecef).map_err(as_geodesy_error)?;

    let v = [
        b_ecef[0] - a_ecef[0],
        b_ecef[1] - a_ecef[1],
        b_ecef[2] - a_ecef[2],
    ];
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if !(len > DEGENERATE_EPSILON) {
        return Err(LocError::DegenerateHeading);
    }
    let v = [v[0] / len, v[1] / len, v[2] / len];

    let r = tangent_rotation(position.latitude, position.longitude);
    let east = r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2];
    let north = r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2];

    let heading_deg = heading_from_horizontal(east, north)?;
    debug!(
        lat = position.latitude,
        lon = position.longitude,
        heading_deg,
        "heading estimated"
    );
    Ok(GeoHeading {
        position,
        heading_deg,
    })
}

/// Compass heading only; see [`estimate_geo_heading`].
pub fn estimate_heading_degrees<G: Geodesy + ?Sized>(
    tracker_to_map: &Affine4,
    camera: &CameraSample,
    alignment: Option<&AlignmentRecord>,
    geodesy: &G,
) -> Result<f64, LocError> {
    estimate_geo_heading(tracker_to_map, camera, alignment, geodesy).map(|g| g.heading_deg)
}

fn as_geodesy_error(err: LocError) -> LocError {
    match err {
        LocError::GeodesyUnavailable(_) => err,
        other => LocError::GeodesyUnavailable(other.to_string()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
