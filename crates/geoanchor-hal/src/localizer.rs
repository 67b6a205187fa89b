//! The visual-localization engine boundary.

use geoanchor_perception::LocalizationResult;
use geoanchor_types::{CameraIntrinsics, LocError};

use crate::camera::CameraFrame;

/// A visual-localization engine.
///
/// `localize` blocks for as long as the engine takes, so callers must run it
/// off any thread that drives rendering or UI. Taking `&mut self` means one
/// engine handle can only ever have one call outstanding.
pub trait Localizer: Send {
    /// Localize `frame` against the loaded maps.
    ///
    /// A result whose `map_handle` is negative means "no match" and is not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`LocError::EngineFault`] when the engine itself fails, e.g.
    /// no map is loaded or the frame is unusable.
    fn localize(
        &mut self,
        frame: &CameraFrame,
        intrinsics: &CameraIntrinsics,
    ) -> Result<LocalizationResult, LocError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ChannelFormat;
    use geoanchor_perception::{Quaternion, Vec3};

    /// Matches only frames whose first pixel is bright.
    struct ThresholdLocalizer;

    impl Localizer for ThresholdLocalizer {
        fn localize(
            &mut self,
            frame: &CameraFrame,
            _intrinsics: &CameraIntrinsics,
        ) -> Result<LocalizationResult, LocError> {
            match frame.data().first() {
                None => Err(LocError::engine("localizer", "empty frame")),
                Some(&p) if p > 127 => Ok(LocalizationResult::new(
                    0,
                    Vec3::new(1.0, 0.0, 0.0),
                    Quaternion::identity(),
                )),
                Some(_) => Ok(LocalizationResult::no_match()),
            }
        }
    }

    #[test]
    fn no_match_is_not_an_error() {
        let k = CameraIntrinsics::new(1.0, 1.0, 0.5, 0.5);
        let mut loc = ThresholdLocalizer;

        let dark = CameraFrame::new(1, 1, ChannelFormat::Grey, vec![0]).unwrap();
        let result = loc.localize(&dark, &k).unwrap();
        assert!(!result.is_success());

        let bright = CameraFrame::new(1, 1, ChannelFormat::Grey, vec![255]).unwrap();
        assert!(loc.localize(&bright, &k).unwrap().is_success());

        let empty = CameraFrame::new(0, 0, ChannelFormat::Grey, vec![]).unwrap();
        assert!(loc.localize(&empty, &k).is_err());
    }
}
