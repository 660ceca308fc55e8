use anyhow::{ensure, Result};
use image::{imageops, RgbImage};
use ndarray::Array4;

/// ImageNet channel statistics used by the MiDaS family
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessor for converting RGB frames to depth model input tensors
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    /// ImageNet-normalizing preprocessor for a `target_width`x`target_height` input
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Preprocess an RGB frame into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions (bicubic)
    /// 2. Scale to [0, 1], then subtract channel mean and divide by channel std
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "cannot preprocess an empty {}x{} frame", width, height);

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::CatmullRom,
            )
        } else {
            image.clone()
        };

        let mut tensor = Array4::<f32>::zeros((
            1,
            3,
            self.target_height as usize,
            self.target_width as usize,
        ));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (value - self.mean[c]) / self.std[c];
            }
        }

        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn produces_nchw_at_target_size() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]));
        let tensor = Preprocessor::new(256, 256).preprocess(&frame).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 256, 256]);
    }

    #[test]
    fn applies_channel_normalization() {
        let frame = RgbImage::from_pixel(4, 4, Rgb([255, 0, 128]));
        let tensor = Preprocessor::new(4, 4).preprocess(&frame).unwrap();

        let expected_r = (1.0 - 0.485) / 0.229;
        let expected_g = (0.0 - 0.456) / 0.224;
        let expected_b = (128.0 / 255.0 - 0.406) / 0.225;
        assert!((tensor[[0, 0, 2, 1]] - expected_r).abs() < 1e-5);
        assert!((tensor[[0, 1, 0, 3]] - expected_g).abs() < 1e-5);
        assert!((tensor[[0, 2, 3, 0]] - expected_b).abs() < 1e-5);
    }

    #[test]
    fn rejects_empty_frame() {
        let frame = RgbImage::new(0, 0);
        assert!(Preprocessor::new(8, 8).preprocess(&frame).is_err());
    }
}
