//! Generic `Camera` trait and the owned frame buffer handed to the localizer.

use geoanchor_perception::CameraSample;
use geoanchor_types::LocError;

/// Pixel layout of a [`CameraFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFormat {
    /// Single luminance plane (the Y plane of a YCbCr capture).
    Grey,
    Rgb,
    Rgba,
}

impl ChannelFormat {
    /// Bytes per pixel, which is also the channel count engines expect.
    pub fn channels(self) -> usize {
        match self {
            ChannelFormat::Grey => 1,
            ChannelFormat::Rgb => 3,
            ChannelFormat::Rgba => 4,
        }
    }
}

/// An owned, contiguous image buffer.
///
/// The buffer lives as long as the frame does, so a localizer borrowing it
/// for one call always sees valid, unchanged pixels.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    width: u32,
    height: u32,
    format: ChannelFormat,
    data: Vec<u8>,
}

impl CameraFrame {
    /// Wrap `data` as a `width × height` image.
    ///
    /// # Errors
    ///
    /// Returns [`LocError::EngineFault`] if `data` is not exactly
    /// `width * height * channels` bytes long.
    pub fn new(width: u32, height: u32, format: ChannelFormat, data: Vec<u8>) -> Result<Self, LocError> {
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(LocError::engine(
                "camera",
                format!(
                    "{width}x{height} {format:?} frame needs {expected} bytes, got {}",
                    data.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ChannelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One capture: the image plus the camera pose and intrinsics it was taken
/// with.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: CameraFrame,
    pub sample: CameraSample,
}

/// A camera-tracking session that can hand out the current frame.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"rear_wide"`.
    fn id(&self) -> &str;

    /// Capture the current frame.
    ///
    /// # Errors
    ///
    /// Returns [`LocError::EngineFault`] if no frame is available (session
    /// not running, tracking lost, ...).
    fn capture(&mut self) -> Result<CapturedFrame, LocError>;
}
