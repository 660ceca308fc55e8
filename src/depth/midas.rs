use super::preprocess::Preprocessor;
use super::{ComputeDevice, DepthModel};
use crate::error::ScanError;
use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array2, Array4};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// MiDaS v2.1 small, exported to ONNX with a fixed 256x256 input
///
/// Produces relative inverse depth: larger values are closer to the camera.
pub struct MidasSmall {
    session: Session,
    preprocessor: Preprocessor,
    width: u32,
    height: u32,
}

impl MidasSmall {
    /// Create a new MiDaS small model from an ONNX file
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `device` - Execution provider to register; the CPU provider is
    ///   always available underneath
    pub fn new<P: AsRef<Path>>(model_path: P, device: ComputeDevice) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading MiDaS small from {} on {}", path.display(), device);

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        if device == ComputeDevice::Accelerator {
            builder = builder.with_execution_providers([CUDAExecutionProvider::default().build()])?;
        }

        let session = builder
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("MiDaS small loaded successfully");

        let width = 256;
        let height = 256;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(width, height),
            width,
            height,
        })
    }
}

/// Drop the batch (and optional channel) axes of a depth output
fn depth_plane(shape: &[usize]) -> Result<(usize, usize), ScanError> {
    match shape {
        [1, h, w] | [1, 1, h, w] => Ok((*h, *w)),
        other => Err(ScanError::UnexpectedOutputShape(other.to_vec())),
    }
}

impl DepthModel for MidasSmall {
    fn preprocess(&self, frame: &RgbImage) -> Result<Array4<f32>> {
        self.preprocessor.preprocess(frame)
    }

    fn infer(&mut self, input: Array4<f32>) -> Result<Array2<f32>> {
        let _span = tracing::debug_span!("midas_inference").entered();

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])
            .context("Failed to run inference")?;

        let prediction = outputs[0].try_extract_array::<f32>()?;
        let (h, w) = depth_plane(prediction.shape())?;
        let values: Vec<f32> = prediction.iter().copied().collect();

        Ok(Array2::from_shape_vec((h, w), values)?)
    }

    fn native_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn name(&self) -> &str {
        "MiDaS small"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_batched_depth_outputs() {
        assert_eq!(depth_plane(&[1, 256, 256]).unwrap(), (256, 256));
        assert_eq!(depth_plane(&[1, 1, 128, 96]).unwrap(), (128, 96));
    }

    #[test]
    fn rejects_other_output_shapes() {
        assert!(matches!(
            depth_plane(&[2, 256, 256]),
            Err(ScanError::UnexpectedOutputShape(shape)) if shape == vec![2, 256, 256]
        ));
        assert!(depth_plane(&[256, 256]).is_err());
    }
}
