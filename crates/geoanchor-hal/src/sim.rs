//! In-process simulated collaborators for tests and demos without a device.
//!
//! - [`SimCamera`] – fixed-pose camera that hands out a flat grey frame.
//! - [`SimLocalizer`] – scripted engine that reports a known map pose on a
//!   repeating hit/miss pattern.
//! - [`StaticAlignmentSource`] – serves alignment records from memory.
//! - [`Wgs84Geodesy`] – reference WGS84 geodesy engine.
//!
//! # Alignment record layout
//!
//! [`Wgs84Geodesy`] reads an [`AlignmentRecord`] as the map origin in ECEF
//! (`[0..3]`), a row-major 3×3 rotation whose columns are the map axes in
//! ECEF (`[3..12]`), and a uniform scale (`[12]`):
//! `ecef = origin + scale · R · map`.
//!
//! # Example
//!
//! ```rust
//! use geoanchor_hal::sim::Wgs84Geodesy;
//! use geoanchor_perception::{Geodesy, Vec3};
//! use geoanchor_types::Wgs84;
//!
//! let geodesy = Wgs84Geodesy::new();
//! let origin = Wgs84::new(60.17, 24.94, 15.0);
//! let record = Wgs84Geodesy::enu_aligned_record(origin, 1.0).unwrap();
//!
//! // Ten metres up the map's +Y axis is ten metres higher.
//! let ecef = geodesy.map_to_ecef(Vec3::new(0.0, 10.0, 0.0), &record).unwrap();
//! let wgs = geodesy.ecef_to_wgs84(ecef).unwrap();
//! assert!((wgs.altitude - 25.0).abs() < 1e-3);
//! ```

use std::collections::HashMap;
use std::f32::consts::PI;
use std::time::Duration;

use async_trait::async_trait;
use geoanchor_perception::{CameraSample, Ecef, Geodesy, LocalizationResult, Quaternion, Vec3};
use geoanchor_types::{ALIGNMENT_LEN, AlignmentRecord, CameraIntrinsics, LocError, Wgs84};
use tracing::debug;

use crate::alignment::AlignmentSource;
use crate::camera::{Camera, CameraFrame, CapturedFrame, ChannelFormat};
use crate::localizer::Localizer;

/// WGS84 semi-major axis (metres).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera with a settable tracking-space pose.
/// Always succeeds.
pub struct SimCamera {
    id: String,
    sample: CameraSample,
    width: u32,
    height: u32,
}

impl SimCamera {
    /// Camera at the tracking origin with a 4×4 greyscale sensor.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sample: CameraSample::new(
                Default::default(),
                CameraIntrinsics::new(4.0, 4.0, 2.0, 2.0),
            ),
            width: 4,
            height: 4,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Move the camera; the next capture reports the new pose.
    pub fn set_sample(&mut self, sample: CameraSample) {
        self.sample = sample;
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CapturedFrame, LocError> {
        let len = self.width as usize * self.height as usize;
        Ok(CapturedFrame {
            frame: CameraFrame::new(self.width, self.height, ChannelFormat::Grey, vec![128u8; len])?,
            sample: self.sample,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Localizer
// ────────────────────────────────────────────────────────────────────────────

/// Engine-frame rotation of a camera held level and turned `yaw_deg`
/// counter-clockwise (about map +Y) from facing map −Z.
///
/// The engine's camera frame has Y down and Z forward, hence the half turn
/// about X.
pub fn level_camera_rotation(yaw_deg: f32) -> Quaternion {
    Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw_deg.to_radians())
        .mul(Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), PI))
}

/// A scripted localizer.
///
/// Each call consumes the next entry of a repeating hit/miss pattern (all
/// hits when the pattern is empty). Hits report the configured map pose,
/// optionally spun about map +Y by a fixed step per call.
pub struct SimLocalizer {
    map_handle: i32,
    position: Vec3,
    rotation: Quaternion,
    pattern: Vec<bool>,
    spin_step_deg: f32,
    latency: Duration,
    calls: usize,
}

impl SimLocalizer {
    pub fn new(map_handle: i32, position: Vec3, rotation: Quaternion) -> Self {
        Self {
            map_handle,
            position,
            rotation,
            pattern: Vec::new(),
            spin_step_deg: 0.0,
            latency: Duration::ZERO,
            calls: 0,
        }
    }

    /// Repeating hit (`true`) / miss (`false`) pattern.
    pub fn with_pattern(mut self, pattern: Vec<bool>) -> Self {
        self.pattern = pattern;
        self
    }

    /// Turn the reported pose by `step_deg` about map +Y on every call.
    pub fn with_spin(mut self, step_deg: f32) -> Self {
        self.spin_step_deg = step_deg;
        self
    }

    /// Block for `latency` inside every call, like a real engine does.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of `localize` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Localizer for SimLocalizer {
    fn localize(
        &mut self,
        frame: &CameraFrame,
        _intrinsics: &CameraIntrinsics,
    ) -> Result<LocalizationResult, LocError> {
        if frame.data().is_empty() {
            return Err(LocError::engine("sim_localizer", "empty frame"));
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let call = self.calls;
        self.calls += 1;

        let hit = self.pattern.is_empty() || self.pattern[call % self.pattern.len()];
        if !hit {
            debug!(call, "sim localizer: scripted miss");
            return Ok(LocalizationResult::no_match());
        }

        let spin = Quaternion::from_axis_angle(
            Vec3::new(0.0, 1.0, 0.0),
            (self.spin_step_deg * call as f32).to_radians(),
        );
        Ok(
            LocalizationResult::new(self.map_handle, self.position, spin.mul(self.rotation))
                .with_confidence(100),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Alignment source
// ────────────────────────────────────────────────────────────────────────────

/// Serves alignment records from an in-memory table.
#[derive(Default)]
pub struct StaticAlignmentSource {
    records: HashMap<u32, AlignmentRecord>,
}

impl StaticAlignmentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, map_id: u32, record: AlignmentRecord) -> Self {
        self.records.insert(map_id, record);
        self
    }
}

#[async_trait]
impl AlignmentSource for StaticAlignmentSource {
    async fn fetch(&self, map_id: u32, token: &str) -> Result<Option<AlignmentRecord>, LocError> {
        if token.is_empty() {
            return Err(LocError::engine("alignment", "credential token is empty"));
        }
        Ok(self.records.get(&map_id).copied())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Geodesy
// ────────────────────────────────────────────────────────────────────────────

/// Reference WGS84 geodesy; see the module docs for the record layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Wgs84Geodesy;

impl Wgs84Geodesy {
    pub fn new() -> Self {
        Self
    }

    /// Record for a map whose origin sits at `origin` with X = east,
    /// Y = up and Z = south, so a camera facing map −Z faces north.
    ///
    /// # Errors
    ///
    /// [`LocError::GeodesyUnavailable`] for a non-finite origin or a
    /// non-positive scale.
    pub fn enu_aligned_record(origin: Wgs84, scale: f64) -> Result<AlignmentRecord, LocError> {
        if !(scale > 0.0) {
            return Err(unavailable(format!("alignment scale must be positive, got {scale}")));
        }
        let o = wgs84_to_ecef(origin)?;
        let (sin_lat, cos_lat) = origin.latitude.to_radians().sin_cos();
        let (sin_lon, cos_lon) = origin.longitude.to_radians().sin_cos();
        let east = [-sin_lon, cos_lon, 0.0];
        let north = [-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat];
        let up = [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat];

        let mut values = [0.0; ALIGNMENT_LEN];
        values[..3].copy_from_slice(&o);
        for i in 0..3 {
            values[3 + i * 3] = east[i];
            values[3 + i * 3 + 1] = up[i];
            values[3 + i * 3 + 2] = -north[i];
        }
        values[12] = scale;
        Ok(AlignmentRecord::new(values))
    }
}

struct Alignment {
    origin: Ecef,
    rotation: [[f64; 3]; 3],
    scale: f64,
}

fn decode(record: &AlignmentRecord) -> Result<Alignment, LocError> {
    let v = record.as_array();
    if v.iter().any(|x| !x.is_finite()) {
        return Err(unavailable("alignment record contains non-finite values"));
    }
    if v[12].abs() < f64::EPSILON {
        return Err(unavailable("alignment scale is zero"));
    }
    Ok(Alignment {
        origin: [v[0], v[1], v[2]],
        rotation: [
            [v[3], v[4], v[5]],
            [v[6], v[7], v[8]],
            [v[9], v[10], v[11]],
        ],
        scale: v[12],
    })
}

fn unavailable(msg: impl Into<String>) -> LocError {
    LocError::GeodesyUnavailable(msg.into())
}

fn wgs84_to_ecef(wgs84: Wgs84) -> Result<Ecef, LocError> {
    if !(wgs84.latitude.is_finite() && wgs84.longitude.is_finite() && wgs84.altitude.is_finite()) {
        return Err(unavailable("non-finite geodetic position"));
    }
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = wgs84.latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = wgs84.longitude.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let h = wgs84.altitude;
    Ok([
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (n * (1.0 - e2) + h) * sin_lat,
    ])
}

fn ecef_to_wgs84(ecef: Ecef) -> Result<Wgs84, LocError> {
    if ecef.iter().any(|x| !x.is_finite()) {
        return Err(unavailable("non-finite ECEF position"));
    }
    let [x, y, z] = ecef;
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let p = x.hypot(y);
    let lon = y.atan2(x);

    // Fixed-point iteration on latitude; converges in a handful of steps
    // anywhere off the polar axis.
    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let h = height_above(p, z, lat);
        let next = z.atan2(p * (1.0 - e2 * n / (n + h)));
        let done = (next - lat).abs() < 1e-14;
        lat = next;
        if done {
            break;
        }
    }

    Ok(Wgs84::new(lat.to_degrees(), lon.to_degrees(), height_above(p, z, lat)))
}

fn height_above(p: f64, z: f64, lat: f64) -> f64 {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = lat.sin_cos();
    p * cos_lat + z * sin_lat - WGS84_A * (1.0 - e2 * sin_lat * sin_lat).sqrt()
}

fn rotation_f32(r: &[[f64; 3]; 3]) -> [[f32; 3]; 3] {
    r.map(|row| row.map(|c| c as f32))
}

impl Geodesy for Wgs84Geodesy {
    fn map_to_ecef(&self, map: Vec3, alignment: &AlignmentRecord) -> Result<Ecef, LocError> {
        let a = decode(alignment)?;
        let m = [map.x as f64, map.y as f64, map.z as f64];
        let mut out = a.origin;
        for (i, o) in out.iter_mut().enumerate() {
            *o += a.scale * (0..3).map(|k| a.rotation[i][k] * m[k]).sum::<f64>();
        }
        Ok(out)
    }

    fn ecef_to_map(&self, ecef: Ecef, alignment: &AlignmentRecord) -> Result<Vec3, LocError> {
        let a = decode(alignment)?;
        let d = [
            ecef[0] - a.origin[0],
            ecef[1] - a.origin[1],
            ecef[2] - a.origin[2],
        ];
        // Rᵀ · d / scale
        let m: [f64; 3] =
            std::array::from_fn(|i| (0..3).map(|k| a.rotation[k][i] * d[k]).sum::<f64>() / a.scale);
        Ok(Vec3::new(m[0] as f32, m[1] as f32, m[2] as f32))
    }

    fn ecef_to_wgs84(&self, ecef: Ecef) -> Result<Wgs84, LocError> {
        ecef_to_wgs84(ecef)
    }

    fn wgs84_to_ecef(&self, wgs84: Wgs84) -> Result<Ecef, LocError> {
        wgs84_to_ecef(wgs84)
    }

    fn rot_map_to_ecef(
        &self,
        map: Quaternion,
        alignment: &AlignmentRecord,
    ) -> Result<Quaternion, LocError> {
        let a = decode(alignment)?;
        let q = Quaternion::from_rotation_matrix(&rotation_f32(&a.rotation));
        Ok(q.mul(map))
    }

    fn rot_ecef_to_map(
        &self,
        ecef: Quaternion,
        alignment: &AlignmentRecord,
    ) -> Result<Quaternion, LocError> {
        let a = decode(alignment)?;
        let q = Quaternion::from_rotation_matrix(&rotation_f32(&a.rotation));
        Ok(q.conjugate().mul(ecef))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use geoanchor_perception::{Affine4, build_anchor_pose, estimate_heading_degrees};

    fn helsinki() -> AlignmentRecord {
        Wgs84Geodesy::enu_aligned_record(Wgs84::new(60.17, 24.94, 15.0), 1.0).unwrap()
    }

    #[test]
    fn sim_camera_returns_grey_frame() {
        let mut cam = SimCamera::new("front");
        let captured = cam.capture().unwrap();
        assert_eq!(captured.frame.width(), 4);
        assert_eq!(captured.frame.height(), 4);
        assert!(captured.frame.data().iter().all(|&b| b == 128));
        assert_eq!(cam.id(), "front");
    }

    #[test]
    fn sim_camera_reports_new_pose_after_move() {
        let mut cam = SimCamera::new("front").with_resolution(8, 2);
        let moved = CameraSample::new(
            Affine4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            CameraIntrinsics::new(8.0, 8.0, 4.0, 1.0),
        );
        cam.set_sample(moved);
        let captured = cam.capture().unwrap();
        assert_eq!(captured.sample, moved);
        assert_eq!(captured.frame.data().len(), 16);
    }

    #[test]
    fn sim_localizer_follows_pattern() {
        let mut loc = SimLocalizer::new(2, Vec3::zero(), Quaternion::identity())
            .with_pattern(vec![true, false, false]);
        let frame = CameraFrame::new(1, 1, ChannelFormat::Grey, vec![0]).unwrap();
        let k = CameraIntrinsics::new(1.0, 1.0, 0.5, 0.5);

        let handles: Vec<i32> = (0..6)
            .map(|_| loc.localize(&frame, &k).unwrap().map_handle)
            .collect();
        assert_eq!(handles, vec![2, -1, -1, 2, -1, -1]);
        assert_eq!(loc.calls(), 6);
    }

    #[test]
    fn sim_localizer_rejects_empty_frame() {
        let mut loc = SimLocalizer::new(0, Vec3::zero(), Quaternion::identity());
        let frame = CameraFrame::new(0, 0, ChannelFormat::Grey, vec![]).unwrap();
        let k = CameraIntrinsics::new(1.0, 1.0, 0.5, 0.5);
        assert!(loc.localize(&frame, &k).is_err());
        assert_eq!(loc.calls(), 0);
    }

    #[tokio::test]
    async fn static_alignment_source_serves_known_maps() {
        let record = helsinki();
        let source = StaticAlignmentSource::new().with_record(92528, record);
        assert_eq!(source.fetch(92528, "token").await.unwrap(), Some(record));
        assert_eq!(source.fetch(1, "token").await.unwrap(), None);
        assert!(source.fetch(92528, "").await.is_err());
    }

    #[test]
    fn wgs84_roundtrip_within_millimetres() {
        let geodesy = Wgs84Geodesy::new();
        for &(lat, lon, alt) in &[
            (0.0, 0.0, 0.0),
            (60.17, 24.94, 15.0),
            (-33.86, 151.21, 58.0),
            (89.5, -120.0, 2500.0),
        ] {
            let ecef = geodesy.wgs84_to_ecef(Wgs84::new(lat, lon, alt)).unwrap();
            let back = geodesy.ecef_to_wgs84(ecef).unwrap();
            assert!((back.latitude - lat).abs() < 1e-9, "lat {lat} -> {}", back.latitude);
            assert!((back.longitude - lon).abs() < 1e-9, "lon {lon} -> {}", back.longitude);
            assert!((back.altitude - alt).abs() < 1e-3, "alt {alt} -> {}", back.altitude);
        }
    }

    #[test]
    fn equator_prime_meridian_is_semi_major_axis() {
        let ecef = Wgs84Geodesy::new().wgs84_to_ecef(Wgs84::new(0.0, 0.0, 0.0)).unwrap();
        assert!((ecef[0] - WGS84_A).abs() < 1e-6);
        assert!(ecef[1].abs() < 1e-6);
        assert!(ecef[2].abs() < 1e-6);
    }

    #[test]
    fn map_ecef_roundtrip() {
        let geodesy = Wgs84Geodesy::new();
        let record = helsinki();
        let p = Vec3::new(12.5, -3.0, 40.25);
        let ecef = geodesy.map_to_ecef(p, &record).unwrap();
        let back = geodesy.ecef_to_map(ecef, &record).unwrap();
        assert!((back.x - p.x).abs() < 1e-3);
        assert!((back.y - p.y).abs() < 1e-3);
        assert!((back.z - p.z).abs() < 1e-3);
    }

    #[test]
    fn rotation_roundtrip() {
        let geodesy = Wgs84Geodesy::new();
        let record = helsinki();
        let q = Quaternion::from_axis_angle(Vec3::new(0.3, 1.0, 0.2), 0.6);
        let ecef = geodesy.rot_map_to_ecef(q, &record).unwrap();
        let back = geodesy.rot_ecef_to_map(ecef, &record).unwrap();
        let dot = q.x * back.x + q.y * back.y + q.z * back.z + q.w * back.w;
        assert!((dot.abs() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn zero_scale_is_unavailable() {
        let mut values = *helsinki().as_array();
        values[12] = 0.0;
        let err = Wgs84Geodesy::new()
            .map_to_ecef(Vec3::zero(), &AlignmentRecord::new(values))
            .unwrap_err();
        assert!(matches!(err, LocError::GeodesyUnavailable(_)));
        assert!(Wgs84Geodesy::enu_aligned_record(Wgs84::new(0.0, 0.0, 0.0), 0.0).is_err());
    }

    #[test]
    fn level_camera_heading_matches_yaw() {
        let geodesy = Wgs84Geodesy::new();
        let record = helsinki();
        let camera = CameraSample::new(Affine4::identity(), CameraIntrinsics::new(1.0, 1.0, 0.5, 0.5));

        for yaw in [0.0f32, 45.0, 90.0, 200.0, 315.0] {
            let result = LocalizationResult::new(0, Vec3::new(3.0, 1.5, -7.0), level_camera_rotation(yaw));
            let anchor = build_anchor_pose(&result, &camera.transform).unwrap();
            let tracker_to_map = anchor.invert().unwrap();
            let h = estimate_heading_degrees(&tracker_to_map, &camera, Some(&record), &geodesy).unwrap();
            let diff = (h - yaw as f64).rem_euclid(360.0);
            assert!(diff < 1e-2 || diff > 360.0 - 1e-2, "yaw={yaw} heading={h}");
        }
    }
}
