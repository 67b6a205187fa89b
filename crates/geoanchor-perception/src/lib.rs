//! `geoanchor-perception` – pose composition and heading derivation.
//!
//! Pure, synchronous geometry: nothing in this crate performs I/O or blocks.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3],
//!   [`Quaternion`][transform::Quaternion] and
//!   [`Affine4`][transform::Affine4]: single-precision primitives with
//!   compose / invert / transform-point.
//! - [`anchor`] – [`build_anchor_pose`][anchor::build_anchor_pose]: turns a
//!   [`LocalizationResult`][anchor::LocalizationResult] into the map anchor's
//!   tracking-space transform, correcting the Y/Z handedness mismatch between
//!   the localization engine and the render scene.
//! - [`heading`] – [`estimate_heading_degrees`][heading::estimate_heading_degrees]:
//!   projects the camera's forward ray into the local East-North-Up plane via
//!   the external [`Geodesy`][heading::Geodesy] engine and reduces it to a
//!   compass angle.

pub mod anchor;
pub mod heading;
pub mod transform;

pub use anchor::{LocalizationResult, build_anchor_pose, corrected_pose_matrix};
pub use heading::{
    CameraSample, Ecef, GeoHeading, Geodesy, estimate_geo_heading, estimate_heading_degrees,
    tangent_rotation,
};
pub use transform::{Affine4, Quaternion, SingularMatrix, Vec3};
