mod capture;
mod depth;
mod display;
mod error;
mod scanner;

use anyhow::{Context, Result};
use capture::WebcamCapture;
use clap::Parser;
use depth::{BitDepth, ComputeDevice, DepthEngine};
use display::WindowDisplay;
use scanner::{DepthScanner, EmptyFramePolicy, ScannerConfig, ScannerState, LIVE_WINDOW};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Live monocular depth scanning from a webcam", long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    camera: u32,

    /// Depth-map every frame instead of capturing on demand
    #[arg(short, long)]
    live_mapping: bool,

    /// Depth map width in bytes: 1 (8-bit) or 2 (16-bit)
    #[arg(short, long, default_value_t = 2)]
    bits: u8,

    /// Path to the depth model (MiDaS small, ONNX)
    #[arg(short, long, default_value = "models/midas_v21_small_256.onnx")]
    model: PathBuf,

    /// Key that captures a single depth frame
    #[arg(long, default_value_t = 'c')]
    capture_key: char,

    /// Key poll timeout per frame, in milliseconds
    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    /// Requested capture width (needs --height)
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Requested capture height (needs --width)
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Keep reading when the camera returns an empty frame instead of stopping
    #[arg(long)]
    skip_empty_frames: bool,

    /// List available cameras and exit
    #[arg(long)]
    list_cameras: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn scanner_config(&self) -> Result<ScannerConfig> {
        Ok(ScannerConfig {
            camera_index: self.camera,
            live_mapping: self.live_mapping,
            bits: BitDepth::try_from(self.bits)?,
            capture_key: scanner::parse_capture_key(self.capture_key)?,
            poll_interval: Duration::from_millis(self.poll_ms),
            empty_frames: if self.skip_empty_frames {
                EmptyFramePolicy::Skip
            } else {
                EmptyFramePolicy::Stop
            },
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.list_cameras {
        return capture::list_cameras();
    }

    let config = args.scanner_config()?;

    let device = ComputeDevice::detect();
    tracing::info!("Compute device: {}", device);

    // Initialize depth model
    let model = depth::create_default_model(&args.model, device)
        .context("Failed to load depth model")?;
    let engine = DepthEngine::new(model, device);

    // Initialize capture
    let resolution = args.width.zip(args.height);
    let camera = WebcamCapture::open(config.camera_index, resolution)
        .context("Failed to initialize webcam capture")?;

    let mut scanner = DepthScanner::new(camera, WindowDisplay::new(LIVE_WINDOW), engine, config);
    tracing::info!("{}", scanner);

    let handle = scanner.handle();
    ctrlc::set_handler(move || {
        if handle.state() == ScannerState::Running && !handle.stop_requested() {
            tracing::info!("Ctrl+C received, stopping...");
            handle.stop();
        }
    })
    .context("Failed to install Ctrl+C handler")?;

    if scanner.config().live_mapping {
        tracing::info!("Live mapping enabled. Press ESC to quit");
    } else {
        tracing::info!(
            "Press '{}' to capture a depth frame, ESC to quit",
            scanner.config().capture_key
        );
    }

    let summary = scanner.run().context("Depth scan session failed")?;
    tracing::debug!("Scanner state after session: {:?}", scanner.state());
    tracing::info!(
        "Session ended ({:?}): {} frames, {} captures, {} empty frames skipped",
        summary.reason,
        summary.frames,
        summary.captures,
        summary.skipped
    );

    Ok(())
}
