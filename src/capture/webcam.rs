use super::VideoSource;
use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

pub struct WebcamCapture {
    camera: Camera,
    index: u32,
    width: u32,
    height: u32,
}

impl WebcamCapture {
    /// Open camera `device_index` and start streaming
    ///
    /// With `resolution` set, the camera picks its highest frame rate at that
    /// size; otherwise it streams at its highest resolution.
    pub fn open(device_index: u32, resolution: Option<(u32, u32)>) -> Result<Self> {
        let index = CameraIndex::Index(device_index);
        let format_type = match resolution {
            Some((width, height)) => {
                tracing::info!("Initializing webcam {} at {}x{}", device_index, width, height);
                RequestedFormatType::HighestResolution(Resolution::new(width, height))
            }
            None => {
                tracing::info!("Initializing webcam {} at highest resolution", device_index);
                RequestedFormatType::AbsoluteHighestResolution
            }
        };
        let requested = RequestedFormat::new::<RgbFormat>(format_type);

        let mut camera = Camera::new(index, requested)
            .with_context(|| format!("Failed to open camera {}", device_index))?;

        camera.open_stream()
            .context("Failed to open camera stream")?;

        let negotiated = camera.resolution();
        tracing::info!(
            "Webcam {} streaming at {}x{}",
            device_index,
            negotiated.width(),
            negotiated.height()
        );

        Ok(Self {
            camera,
            index: device_index,
            width: negotiated.width(),
            height: negotiated.height(),
        })
    }
}

impl VideoSource for WebcamCapture {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let frame = self
            .camera
            .frame()
            .context("Failed to capture frame")?;

        if frame.buffer().is_empty() {
            return Ok(None);
        }

        let decoded = frame.decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(Some(decoded))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) -> Result<()> {
        tracing::info!("Releasing webcam {}", self.index);
        self.camera
            .stop_stream()
            .with_context(|| format!("Failed to stop camera {}", self.index))
    }
}

/// Log the cameras the platform backend can see
pub fn list_cameras() -> Result<()> {
    let cameras = nokhwa::query(ApiBackend::Auto).context("Failed to query cameras")?;

    if cameras.is_empty() {
        tracing::info!("No cameras found");
    }
    for info in cameras {
        tracing::info!("[{}] {} ({})", info.index(), info.human_name(), info.description());
    }

    Ok(())
}
