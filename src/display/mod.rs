mod window;

pub use window::WindowDisplay;

use crate::depth::DepthMap;
use anyhow::Result;
use image::RgbImage;
use std::time::Duration;

/// Keyboard events the scanner reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Lowercase ASCII letter or digit
    Char(char),
    Escape,
    /// The user closed the sink's primary window through the window manager
    WindowClosed,
}

/// Image handed to a display sink
#[derive(Debug, Clone, Copy)]
pub enum DisplayImage<'a> {
    Rgb(&'a RgbImage),
    Depth(&'a DepthMap),
}

impl DisplayImage<'_> {
    /// (width, height)
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            DisplayImage::Rgb(image) => (image.width() as usize, image.height() as usize),
            DisplayImage::Depth(map) => {
                let (rows, cols) = map.dim();
                (cols, rows)
            }
        }
    }

    /// Packed 0RGB pixels, row-major; depth maps render as grayscale
    pub fn to_argb(&self) -> Vec<u32> {
        match self {
            DisplayImage::Rgb(image) => image
                .pixels()
                .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
                .collect(),
            DisplayImage::Depth(map) => map
                .to_gray8()
                .into_iter()
                .map(|v| {
                    let v = v as u32;
                    (v << 16) | (v << 8) | v
                })
                .collect(),
        }
    }
}

/// Trait for on-screen output
pub trait DisplaySink {
    /// Render `image` in the window called `window`, creating it on first use
    fn show(&mut self, window: &str, image: DisplayImage<'_>) -> Result<()>;

    /// Wait up to `timeout` for a key press
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>>;

    /// Close every window
    fn destroy_all(&mut self);
}
