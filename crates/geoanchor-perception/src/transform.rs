//! Vector, quaternion and 4×4 affine-transform primitives.
//!
//! All arithmetic is single precision, matching what the localization engine
//! returns.
//!
//! # Matrix convention
//!
//! [`Affine4`] is stored row-major and used with row vectors, the same way the
//! render scene stores node transforms:
//!
//! - rows 0–2 hold the images of the X, Y and Z axes,
//! - row 3 holds the translation,
//! - a point maps as `p' = [p, 1] · M`,
//! - `a.compose(b)` is `a · b`, i.e. apply `a` first, then `b`.
//!
//! # Example
//!
//! ```rust
//! use geoanchor_perception::transform::{Affine4, Quaternion, Vec3};
//!
//! // Node 1 m along +X with no rotation, parented under a node 2 m along +Y.
//! let local = Affine4::from_rotation_translation(
//!     Quaternion::identity().to_rotation_matrix(),
//!     Vec3::new(1.0, 0.0, 0.0),
//! );
//! let parent = Affine4::from_translation(Vec3::new(0.0, 2.0, 0.0));
//!
//! let p = local.compose(&parent).transform_point(Vec3::zero());
//! assert!((p.x - 1.0).abs() < 1e-6);
//! assert!((p.y - 2.0).abs() < 1e-6);
//!
//! let back = local.invert().unwrap().transform_point(Vec3::new(1.0, 0.0, 0.0));
//! assert!(back.x.abs() < 1e-6);
//! ```

use thiserror::Error;

/// Below this absolute determinant the linear block is treated as singular.
pub const SINGULAR_EPSILON: f32 = 1e-6;

/// 3×3 rotation matrix, row-major, acting on column vectors (`v' = R · v`).
pub type Mat3 = [[f32; 3]; 3];

// ────────────────────────────────────────────────────────────────────────────
// Vec3
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D point or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn neg(self) -> Self {
        self.scale(-1.0)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternion
// ────────────────────────────────────────────────────────────────────────────

/// A rotation quaternion in (x, y, z, w) order, as the localization engine
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1); nothing here renormalizes.
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Rotation of `angle_rad` about `axis` (need not be normalized).
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let len = axis.length();
        if len <= f32::EPSILON {
            return Self::identity();
        }
        let (s, c) = (angle_rad * 0.5).sin_cos();
        let a = axis.scale(s / len);
        Self::new(a.x, a.y, a.z, c)
    }

    /// Hamilton product: `self * rhs` rotates by `rhs` first, then `self`.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(v.x, v.y, v.z, 0.0);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Rotation matrix acting on column vectors.
    ///
    /// Uses the homogeneous form, so a non-unit quaternion yields `|q|² · R`
    /// and the zero quaternion yields the zero matrix rather than a silent
    /// identity.
    pub fn to_rotation_matrix(self) -> Mat3 {
        let Self { x, y, z, w } = self;
        let (xx, yy, zz, ww) = (x * x, y * y, z * z, w * w);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (xw, yw, zw) = (x * w, y * w, z * w);
        [
            [ww + xx - yy - zz, 2.0 * (xy - zw), 2.0 * (xz + yw)],
            [2.0 * (xy + zw), ww - xx + yy - zz, 2.0 * (yz - xw)],
            [2.0 * (xz - yw), 2.0 * (yz + xw), ww - xx - yy + zz],
        ]
    }

    /// Recover a unit quaternion from a proper rotation matrix.
    pub fn from_rotation_matrix(r: &Mat3) -> Self {
        let trace = r[0][0] + r[1][1] + r[2][2];
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new(
                (r[2][1] - r[1][2]) / s,
                (r[0][2] - r[2][0]) / s,
                (r[1][0] - r[0][1]) / s,
                0.25 * s,
            )
        } else if r[0][0] > r[1][1] && r[0][0] > r[2][2] {
            let s = (1.0 + r[0][0] - r[1][1] - r[2][2]).sqrt() * 2.0;
            Self::new(
                0.25 * s,
                (r[0][1] + r[1][0]) / s,
                (r[0][2] + r[2][0]) / s,
                (r[2][1] - r[1][2]) / s,
            )
        } else if r[1][1] > r[2][2] {
            let s = (1.0 + r[1][1] - r[0][0] - r[2][2]).sqrt() * 2.0;
            Self::new(
                (r[0][1] + r[1][0]) / s,
                0.25 * s,
                (r[1][2] + r[2][1]) / s,
                (r[0][2] - r[2][0]) / s,
            )
        } else {
            let s = (1.0 + r[2][2] - r[0][0] - r[1][1]).sqrt() * 2.0;
            Self::new(
                (r[0][2] + r[2][0]) / s,
                (r[1][2] + r[2][1]) / s,
                0.25 * s,
                (r[1][0] - r[0][1]) / s,
            )
        }
    }
}

/// Free-function form of [`Quaternion::to_rotation_matrix`].
pub fn quaternion_to_rotation_matrix(q: Quaternion) -> Mat3 {
    q.to_rotation_matrix()
}

// ────────────────────────────────────────────────────────────────────────────
// Affine4
// ────────────────────────────────────────────────────────────────────────────

/// Inverting a transform whose 3×3 linear block has (near-)zero determinant.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("matrix is singular (det = {det})")]
pub struct SingularMatrix {
    pub det: f32,
}

/// A 4×4 affine transform; see the module docs for the convention.
///
/// The fourth column is always `(0, 0, 0, 1)` for transforms built through
/// this API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine4 {
    pub rows: [[f32; 4]; 4],
}

impl Affine4 {
    /// Build from raw rows.
    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self { rows }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Pure translation.
    pub fn from_translation(t: Vec3) -> Self {
        let mut m = Self::identity();
        m.rows[3] = [t.x, t.y, t.z, 1.0];
        m
    }

    /// Build from axis rows and a translation row.
    pub fn from_axes(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3, translation: Vec3) -> Self {
        Self::from_rows([
            [x_axis.x, x_axis.y, x_axis.z, 0.0],
            [y_axis.x, y_axis.y, y_axis.z, 0.0],
            [z_axis.x, z_axis.y, z_axis.z, 0.0],
            [translation.x, translation.y, translation.z, 1.0],
        ])
    }

    /// Build from a column-vector rotation matrix and a translation.
    ///
    /// Row `i` of the result is column `i` of `r`.
    pub fn from_rotation_translation(r: Mat3, t: Vec3) -> Self {
        Self::from_axes(
            Vec3::new(r[0][0], r[1][0], r[2][0]),
            Vec3::new(r[0][1], r[1][1], r[2][1]),
            Vec3::new(r[0][2], r[1][2], r[2][2]),
            t,
        )
    }

    /// Image of axis `i` (0 = X, 1 = Y, 2 = Z) under the linear block.
    pub fn axis(&self, i: usize) -> Vec3 {
        let r = self.rows[i];
        Vec3::new(r[0], r[1], r[2])
    }

    pub fn translation(&self) -> Vec3 {
        self.axis(3)
    }

    /// Determinant of the 3×3 linear block.
    pub fn linear_determinant(&self) -> f32 {
        let m = &self.rows;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// `self · other`: apply `self`, then `other`.
    pub fn compose(&self, other: &Self) -> Self {
        let mut out = [[0.0f32; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.rows[i][k] * other.rows[k][j]).sum();
            }
        }
        Self::from_rows(out)
    }

    /// Inverse transform.
    ///
    /// # Errors
    ///
    /// Returns [`SingularMatrix`] when `|det|` of the linear block is below
    /// [`SINGULAR_EPSILON`].
    pub fn invert(&self) -> Result<Self, SingularMatrix> {
        let det = self.linear_determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return Err(SingularMatrix { det });
        }
        let m = &self.rows;
        let inv_det = 1.0 / det;

        // Adjugate of the linear block, scaled.
        let a = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
            ],
        ];

        // p = (p' - t) · A⁻¹  ⇒  translation row is -t · A⁻¹.
        let t = self.translation();
        let tx = -(t.x * a[0][0] + t.y * a[1][0] + t.z * a[2][0]);
        let ty = -(t.x * a[0][1] + t.y * a[1][1] + t.z * a[2][1]);
        let tz = -(t.x * a[0][2] + t.y * a[1][2] + t.z * a[2][2]);

        Ok(Self::from_rows([
            [a[0][0], a[0][1], a[0][2], 0.0],
            [a[1][0], a[1][1], a[1][2], 0.0],
            [a[2][0], a[2][1], a[2][2], 0.0],
            [tx, ty, tz, 1.0],
        ]))
    }

    /// Map a point: `[p, 1] · M`.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let m = &self.rows;
        Vec3::new(
            p.x * m[0][0] + p.y * m[1][0] + p.z * m[2][0] + m[3][0],
            p.x * m[0][1] + p.y * m[1][1] + p.z * m[2][1] + m[3][1],
            p.x * m[0][2] + p.y * m[1][2] + p.z * m[2][2] + m[3][2],
        )
    }

    /// Map a direction (translation ignored).
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.transform_point(v).sub(self.translation())
    }

    /// Element-wise comparison within `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f32) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= tol)
    }
}

impl Default for Affine4 {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
