use thiserror::Error;

/// Failures owned by depthscan itself
///
/// Device and model errors from the underlying crates travel as
/// `anyhow::Error` with context attached; these are the cases we detect.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("unsupported bit depth {0}, expected 1 (8-bit) or 2 (16-bit)")]
    InvalidBitDepth(u8),

    #[error("capture key must be a single ASCII letter or digit, got {0:?}")]
    InvalidCaptureKey(char),

    #[error("depth model returned an output of shape {0:?}, expected [1, H, W] or [1, 1, H, W]")]
    UnexpectedOutputShape(Vec<usize>),

    #[error("scanner session already closed")]
    SessionClosed,
}
