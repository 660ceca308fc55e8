mod midas;
mod normalize;
mod preprocess;
mod resize;

pub use midas::MidasSmall;
pub use normalize::{normalize, BitDepth, DepthMap};

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array2, Array4};
use ort::execution_providers::ExecutionProvider;
use ort::execution_providers::CUDAExecutionProvider;
use std::fmt;
use std::path::Path;

/// Where model inference runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    /// CUDA execution provider
    Accelerator,
    /// CPU execution provider
    Fallback,
}

impl ComputeDevice {
    /// Pick the accelerator when the CUDA execution provider is usable on this
    /// host. Called once at startup; the result is passed down explicitly.
    pub fn detect() -> Self {
        match CUDAExecutionProvider::default().is_available() {
            Ok(true) => ComputeDevice::Accelerator,
            Ok(false) => ComputeDevice::Fallback,
            Err(e) => {
                tracing::debug!("CUDA availability check failed: {}", e);
                ComputeDevice::Fallback
            }
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Accelerator => f.write_str("CUDA"),
            ComputeDevice::Fallback => f.write_str("CPU"),
        }
    }
}

/// Trait for monocular depth models
/// Allows swapping between exported networks (MiDaS small, DPT, ...)
pub trait DepthModel {
    /// Model-specific transform from an RGB frame to an NCHW input tensor
    fn preprocess(&self, frame: &RgbImage) -> Result<Array4<f32>>;

    /// Run the network on a preprocessed tensor
    ///
    /// # Returns
    /// * Relative depth at the model's native resolution, shape (height, width)
    fn infer(&mut self, input: Array4<f32>) -> Result<Array2<f32>>;

    /// Native output resolution, fixed regardless of input size
    ///
    /// Returns (width, height)
    fn native_size(&self) -> (u32, u32);

    fn name(&self) -> &str;
}

/// Turns camera frames into depth estimates at the frame's own resolution
pub struct DepthEngine {
    model: Box<dyn DepthModel>,
    device: ComputeDevice,
}

impl DepthEngine {
    pub fn new(model: Box<dyn DepthModel>, device: ComputeDevice) -> Self {
        let (width, height) = model.native_size();
        tracing::info!(
            "Depth engine ready: {} ({}x{}) on {}",
            model.name(),
            width,
            height,
            device
        );
        Self { model, device }
    }

    pub fn device(&self) -> ComputeDevice {
        self.device
    }

    /// Raw depth estimate with shape (frame height, frame width)
    pub fn infer(&mut self, frame: &RgbImage) -> Result<Array2<f32>> {
        let _span = tracing::debug_span!("depth_infer").entered();

        let input = self.model.preprocess(frame)?;
        let native = self
            .model
            .infer(input)
            .with_context(|| format!("{} inference failed", self.model.name()))?;

        let (width, height) = frame.dimensions();
        Ok(resize::bicubic(native.view(), height as usize, width as usize))
    }

    /// Depth estimate for `frame`, normalized to `bits`
    pub fn depth_map(&mut self, frame: &RgbImage, bits: BitDepth) -> Result<DepthMap> {
        let estimate = self.infer(frame)?;
        Ok(normalize(&estimate, bits))
    }
}

/// Load the default depth model (MiDaS small)
pub fn create_default_model(
    model_path: impl AsRef<Path>,
    device: ComputeDevice,
) -> Result<Box<dyn DepthModel>> {
    let model = MidasSmall::new(model_path, device)?;
    Ok(Box::new(model))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::preprocess::Preprocessor;
    use super::*;
    use image::Rgb;

    /// Model whose output is a fixed-size gradient offset by the mean
    /// of the input tensor
    pub(crate) struct GradientModel {
        native: (u32, u32),
    }

    impl GradientModel {
        pub(crate) fn new(width: u32, height: u32) -> Self {
            Self {
                native: (width, height),
            }
        }
    }

    impl DepthModel for GradientModel {
        fn preprocess(&self, frame: &RgbImage) -> Result<Array4<f32>> {
            Preprocessor::new(self.native.0, self.native.1).preprocess(frame)
        }

        fn infer(&mut self, input: Array4<f32>) -> Result<Array2<f32>> {
            let bias = input.mean().unwrap_or(0.0);
            let (width, height) = self.native;
            Ok(Array2::from_shape_fn(
                (height as usize, width as usize),
                |(r, c)| bias + r as f32 + c as f32 * 0.5,
            ))
        }

        fn native_size(&self) -> (u32, u32) {
            self.native
        }

        fn name(&self) -> &str {
            "gradient"
        }
    }

    pub(crate) struct FailingModel;

    impl DepthModel for FailingModel {
        fn preprocess(&self, _frame: &RgbImage) -> Result<Array4<f32>> {
            Ok(Array4::zeros((1, 3, 4, 4)))
        }

        fn infer(&mut self, _input: Array4<f32>) -> Result<Array2<f32>> {
            anyhow::bail!("device out of memory")
        }

        fn native_size(&self) -> (u32, u32) {
            (4, 4)
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn estimate_matches_frame_resolution() {
        let mut engine = DepthEngine::new(Box::new(GradientModel::new(16, 16)), ComputeDevice::Fallback);

        for (width, height) in [(64, 48), (7, 31), (16, 16), (3, 2)] {
            let frame = RgbImage::from_pixel(width, height, Rgb([90, 120, 200]));
            let estimate = engine.infer(&frame).unwrap();
            assert_eq!(estimate.dim(), (height as usize, width as usize));
        }
    }

    #[test]
    fn depth_map_uses_requested_width_and_full_range() {
        let mut engine = DepthEngine::new(Box::new(GradientModel::new(8, 8)), ComputeDevice::Fallback);
        let frame = RgbImage::from_pixel(32, 24, Rgb([10, 20, 30]));

        match engine.depth_map(&frame, BitDepth::Eight).unwrap() {
            DepthMap::Eight(map) => {
                assert_eq!(map.dim(), (24, 32));
                assert_eq!(map.iter().copied().min(), Some(0));
                assert_eq!(map.iter().copied().max(), Some(u8::MAX));
            }
            other => panic!("expected 8-bit map, got {:?}", other.bit_depth()),
        }
    }

    #[test]
    fn model_failure_propagates_with_context() {
        let mut engine = DepthEngine::new(Box::new(FailingModel), ComputeDevice::Accelerator);
        let frame = RgbImage::new(4, 4);

        let err = engine.infer(&frame).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("failing inference failed"), "{message}");
        assert!(message.contains("device out of memory"), "{message}");
    }

    #[test]
    fn engine_keeps_configured_device() {
        let engine = DepthEngine::new(Box::new(GradientModel::new(4, 4)), ComputeDevice::Accelerator);
        assert_eq!(engine.device(), ComputeDevice::Accelerator);
        assert_eq!(engine.device().to_string(), "CUDA");
    }
}
