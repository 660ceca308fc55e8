use crate::capture::VideoSource;
use crate::depth::{BitDepth, DepthEngine};
use crate::display::{DisplayImage, DisplaySink, Key};
use crate::error::ScanError;
use anyhow::Result;
use image::RgbImage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Window showing the camera feed, or the live depth map
pub const LIVE_WINDOW: &str = "Standard Camera";
/// Window showing one-shot depth captures
pub const CAPTURE_WINDOW: &str = "Depth Scan";

/// Frames between timing reports
const STATS_INTERVAL: u64 = 30;

/// What to do when the camera hands back a frame without image data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyFramePolicy {
    /// Treat it as end of stream
    #[default]
    Stop,
    /// Drop it and read again
    Skip,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub camera_index: u32,
    /// Depth-map every displayed frame instead of capturing on demand
    pub live_mapping: bool,
    pub bits: BitDepth,
    pub capture_key: char,
    /// Upper bound on the key wait per iteration
    pub poll_interval: Duration,
    pub empty_frames: EmptyFramePolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            live_mapping: false,
            bits: BitDepth::Sixteen,
            capture_key: 'c',
            poll_interval: Duration::from_millis(10),
            empty_frames: EmptyFramePolicy::Stop,
        }
    }
}

/// Normalize a capture key to the form display sinks report
pub fn parse_capture_key(key: char) -> Result<char, ScanError> {
    if key.is_ascii_alphanumeric() {
        Ok(key.to_ascii_lowercase())
    } else {
        Err(ScanError::InvalidCaptureKey(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Stopped,
    Running,
}

/// Shared session flags
#[derive(Debug, Default)]
struct SessionFlags {
    /// Cleared to ask the loop to finish
    keep_running: AtomicBool,
    /// Set from `run()` until the camera and windows are released
    active: AtomicBool,
}

impl SessionFlags {
    fn state(&self) -> ScannerState {
        if self.active.load(Ordering::SeqCst) {
            ScannerState::Running
        } else {
            ScannerState::Stopped
        }
    }
}

/// Cloneable view of the scanner's session, usable from other threads
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    flags: Arc<SessionFlags>,
}

impl ScannerHandle {
    /// `Running` until cleanup has finished, even after `stop()`
    pub fn state(&self) -> ScannerState {
        self.flags.state()
    }

    pub fn stop_requested(&self) -> bool {
        self.state() == ScannerState::Running && !self.flags.keep_running.load(Ordering::SeqCst)
    }

    /// Ask the loop to finish after the current iteration
    pub fn stop(&self) {
        self.flags.keep_running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Quit key
    Quit,
    /// A window was closed by the user
    WindowClosed,
    /// The camera stopped delivering frames
    EndOfStream,
    /// `ScannerHandle::stop`
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub captures: u64,
    pub skipped: u64,
    pub reason: StopReason,
}

/// Outcome of one loop iteration
enum Step {
    Continue,
    Stop(StopReason),
    Fail(anyhow::Error),
}

/// Accumulated per-stage timings
#[derive(Default)]
struct FrameStats {
    frames: u64,
    read: Duration,
    depth: Duration,
    show: Duration,
}

impl FrameStats {
    fn record(&mut self, read: Duration, depth: Duration, show: Duration) {
        self.frames += 1;
        self.read += read;
        self.depth += depth;
        self.show += show;

        if self.frames % STATS_INTERVAL == 0 {
            let avg = |total: Duration| total.as_secs_f64() * 1000.0 / self.frames as f64;
            let (read_ms, depth_ms, show_ms) = (avg(self.read), avg(self.depth), avg(self.show));
            let total_ms = read_ms + depth_ms + show_ms;
            tracing::info!(
                "Frame {}: read={:.1}ms, depth={:.1}ms, show={:.1}ms, total={:.1}ms, fps={:.1}",
                self.frames,
                read_ms,
                depth_ms,
                show_ms,
                total_ms,
                1000.0 / total_ms
            );
        }
    }
}

/// Camera → depth → window loop with keyboard capture/quit control
pub struct DepthScanner<C, O> {
    source: C,
    display: O,
    engine: DepthEngine,
    config: ScannerConfig,
    flags: Arc<SessionFlags>,
    closed: bool,
    captures: u64,
    skipped: u64,
    stats: FrameStats,
}

impl<C, O> DepthScanner<C, O>
where
    C: VideoSource,
    O: DisplaySink,
{
    pub fn new(source: C, display: O, engine: DepthEngine, config: ScannerConfig) -> Self {
        Self {
            source,
            display,
            engine,
            config,
            flags: Arc::new(SessionFlags::default()),
            closed: false,
            captures: 0,
            skipped: 0,
            stats: FrameStats::default(),
        }
    }

    pub fn handle(&self) -> ScannerHandle {
        ScannerHandle {
            flags: Arc::clone(&self.flags),
        }
    }

    pub fn state(&self) -> ScannerState {
        self.flags.state()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Stream until quit, end of stream, external stop or failure
    ///
    /// The camera is released and every window closed before this returns,
    /// whichever way the session ends. A scanner runs one session only.
    pub fn run(&mut self) -> Result<SessionSummary> {
        if self.closed {
            return Err(ScanError::SessionClosed.into());
        }

        self.flags.keep_running.store(true, Ordering::SeqCst);
        self.flags.active.store(true, Ordering::SeqCst);
        let (width, height) = self.source.resolution();
        tracing::info!(
            "[{}] Running depth scan on camera {} ({}x{}), live_mapping={}",
            self.engine.device(),
            self.config.camera_index,
            width,
            height,
            self.config.live_mapping
        );

        let outcome = loop {
            if !self.flags.keep_running.load(Ordering::SeqCst) {
                break Ok(StopReason::External);
            }
            match self.step() {
                Step::Continue => {}
                Step::Stop(reason) => break Ok(reason),
                Step::Fail(e) => {
                    tracing::error!("Error during camera streaming: {:#}", e);
                    break Err(e);
                }
            }
        };

        let released = self.shutdown();
        tracing::info!("Scanner closed");

        if let (Err(_), Err(e)) = (&outcome, &released) {
            tracing::warn!("Camera release also failed: {:#}", e);
        }
        let reason = outcome?;
        released?;

        Ok(SessionSummary {
            frames: self.stats.frames,
            captures: self.captures,
            skipped: self.skipped,
            reason,
        })
    }

    fn step(&mut self) -> Step {
        match self.iterate() {
            Ok(step) => step,
            Err(e) => Step::Fail(e),
        }
    }

    fn iterate(&mut self) -> Result<Step> {
        let read_start = Instant::now();
        let Some(frame) = self.source.read_frame()? else {
            return self.on_empty_frame();
        };
        let read_time = read_start.elapsed();

        let depth_start = Instant::now();
        let live = if self.config.live_mapping {
            Some(self.engine.depth_map(&frame, self.config.bits)?)
        } else {
            None
        };
        let depth_time = depth_start.elapsed();

        let show_start = Instant::now();
        let image = match &live {
            Some(map) => DisplayImage::Depth(map),
            None => DisplayImage::Rgb(&frame),
        };
        self.display.show(LIVE_WINDOW, image)?;
        let show_time = show_start.elapsed();

        self.stats.record(read_time, depth_time, show_time);

        let key = self.display.poll_key(self.config.poll_interval)?;
        if key == Some(Key::Char(self.config.capture_key)) && !self.config.live_mapping {
            self.capture(&frame)?;
        }

        Ok(self.on_key(key))
    }

    /// One-shot depth map of `frame` in its own window
    fn capture(&mut self, frame: &RgbImage) -> Result<()> {
        let map = self.engine.depth_map(frame, self.config.bits)?;
        self.display.show(CAPTURE_WINDOW, DisplayImage::Depth(&map))?;
        self.captures += 1;
        tracing::info!("Frame captured!");
        tracing::debug!("Capture {} rendered as {:?} depth", self.captures, map.bit_depth());
        Ok(())
    }

    fn on_key(&self, key: Option<Key>) -> Step {
        match key {
            Some(Key::Escape) => {
                tracing::info!("Closing scanner...");
                Step::Stop(StopReason::Quit)
            }
            Some(Key::WindowClosed) => {
                tracing::info!("Window closed, closing scanner...");
                Step::Stop(StopReason::WindowClosed)
            }
            _ => Step::Continue,
        }
    }

    fn on_empty_frame(&mut self) -> Result<Step> {
        match self.config.empty_frames {
            EmptyFramePolicy::Stop => {
                tracing::info!("Camera returned an empty frame, treating it as end of stream");
                Ok(Step::Stop(StopReason::EndOfStream))
            }
            EmptyFramePolicy::Skip => {
                self.skipped += 1;
                tracing::debug!("Skipping empty frame ({} so far)", self.skipped);
                // Keep the quit key responsive while the camera is silent.
                let key = self.display.poll_key(self.config.poll_interval)?;
                Ok(self.on_key(key))
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        self.flags.keep_running.store(false, Ordering::SeqCst);
        self.closed = true;

        let released = self.source.release();
        self.display.destroy_all();
        self.flags.active.store(false, Ordering::SeqCst);
        released
    }
}

impl<C, O> fmt::Display for DepthScanner<C, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DepthScanner(camera={}, device={})",
            self.config.camera_index,
            self.engine.device()
        )
    }
}
