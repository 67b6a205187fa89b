//! `geoanchor-hal` – boundaries to the outside world.
//!
//! geoanchor never talks to a device SDK or a web API directly. It goes
//! through the narrow traits defined here. Real integrations implement them
//! out of tree. The [`sim`] module implements every one of them in-process.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera] and the owned
//!   [`CameraFrame`][camera::CameraFrame] buffer.
//! - [`localizer`] – [`Localizer`][localizer::Localizer]: the blocking
//!   visual-localization engine call.
//! - [`alignment`] – [`AlignmentSource`][alignment::AlignmentSource]: async
//!   fetch of a map's map→ECEF alignment record.
//! - [`sim`] – simulated camera, localizer, alignment source and a WGS84
//!   reference [`Geodesy`][geoanchor_perception::Geodesy] engine.

pub mod alignment;
pub mod camera;
pub mod localizer;
pub mod sim;

pub use alignment::AlignmentSource;
pub use camera::{Camera, CameraFrame, CapturedFrame, ChannelFormat};
pub use localizer::Localizer;
