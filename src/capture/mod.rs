mod webcam;

pub use webcam::{list_cameras, WebcamCapture};

use anyhow::Result;
use image::RgbImage;

/// Trait for camera capture sources
pub trait VideoSource {
    /// Read a single frame
    ///
    /// `Ok(None)` means the device answered but delivered no image data.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of captured frames
    fn resolution(&self) -> (u32, u32);

    /// Stop streaming and hand the device back
    fn release(&mut self) -> Result<()>;
}
