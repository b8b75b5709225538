use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crate::pipeline::frame_rate_scheduler::FrameRateScheduler;
use crate::pipeline::session_logger::{NullSessionLogger, SessionLogger};
use crate::shared::frame::{Frame, FrameSize};
use crate::shared::media_time::MediaTime;
use crate::shared::pipeline_error::PipelineError;
use crate::source::domain::frame_source::FrameSource;
use crate::video::domain::video_encoder::VideoEncoder;

pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Lifecycle of one encoding session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Writing,
    Finalizing,
    Done,
}

/// Per-session output settings.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub output_path: PathBuf,
    pub frame_interval: MediaTime,
    /// Remove a file already at `output_path` instead of failing.
    pub overwrite: bool,
}

impl SessionConfig {
    pub fn new(output_path: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            output_path: output_path.into(),
            frame_interval: MediaTime::frame_interval(fps),
            overwrite: true,
        }
    }
}

/// Single-writer pull loop from one [`FrameSource`] into one
/// [`VideoEncoder`].
///
/// While the encoder reports it is not ready the loop waits without
/// pulling, so backpressure never drops frames. Frames are stamped by a
/// [`FrameRateScheduler`] and fitted to the source's frame size when the
/// session opens. Single-use: a second `run` fails.
pub struct VideoEncodingSink {
    source: Option<Box<dyn FrameSource>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    config: SessionConfig,
    scheduler: FrameRateScheduler,
    state: SinkState,
    logger: Box<dyn SessionLogger>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl VideoEncodingSink {
    pub fn new(
        source: Box<dyn FrameSource>,
        encoder: Box<dyn VideoEncoder>,
        config: SessionConfig,
    ) -> Self {
        Self {
            source: Some(source),
            encoder: Some(encoder),
            scheduler: FrameRateScheduler::new(config.frame_interval),
            config,
            state: SinkState::Idle,
            logger: Box::new(NullSessionLogger),
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn SessionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// `callback(written, total)` runs after every frame; returning false
    /// cancels the session.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Runs the session on a dedicated thread and hands its outcome to
    /// `completion` exactly once.
    pub fn spawn(
        mut self,
        completion: impl FnOnce(Result<PathBuf, PipelineError>) + Send + 'static,
    ) -> JoinHandle<()> {
        std::thread::spawn(move || {
            let result = self.run();
            completion(result);
        })
    }

    /// Writes every frame the source yields and finalizes the container.
    pub fn run(&mut self) -> Result<PathBuf, PipelineError> {
        let (Some(mut source), Some(mut encoder)) = (self.source.take(), self.encoder.take())
        else {
            return Err(PipelineError::InvalidRequest(
                "encoding session already ran".into(),
            ));
        };

        let result = self.write_all(&mut *source, &mut *encoder);
        if let Err(ref e) = result {
            log::warn!("Encoding session failed: {e}");
        }
        self.state = SinkState::Done;
        self.logger.summary();
        result
    }

    fn write_all(
        &mut self,
        source: &mut dyn FrameSource,
        encoder: &mut dyn VideoEncoder,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.config.output_path.clone();
        prepare_output(&path, self.config.overwrite)?;

        if !source.has_more() {
            return Err(PipelineError::NoFramesProduced);
        }
        let size = source.frame_size();
        encoder
            .open(&path, size, self.config.frame_interval)
            .map_err(|e| PipelineError::EncoderInit(e.to_string()))?;
        self.state = SinkState::Writing;
        self.logger.info(&format!(
            "Writing {}x{} frames to {} every {}",
            size.width,
            size.height,
            path.display(),
            self.config.frame_interval
        ));

        let written = match self.pull_loop(source, encoder, size) {
            Ok(written) => written,
            Err(e) => {
                discard_output(encoder, &path);
                return Err(e);
            }
        };

        self.state = SinkState::Finalizing;
        if let Err(e) = encoder.finish() {
            remove_if_exists(&path);
            return Err(PipelineError::Encode(e.to_string()));
        }

        if written == 0 {
            remove_if_exists(&path);
            return Err(PipelineError::NoFramesProduced);
        }
        log::info!("Wrote {written} frames to {}", path.display());
        Ok(path)
    }

    fn pull_loop(
        &mut self,
        source: &mut dyn FrameSource,
        encoder: &mut dyn VideoEncoder,
        size: FrameSize,
    ) -> Result<usize, PipelineError> {
        let mut written = 0;
        let mut backpressure_waits = 0usize;

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(PipelineError::Cancelled);
            }
            if !source.has_more() {
                break;
            }
            if !encoder.is_ready_for_more() {
                backpressure_waits += 1;
                std::thread::yield_now();
                continue;
            }

            let pull_start = Instant::now();
            let Some(frame) = source.take_next() else {
                break;
            };
            self.logger.timing("pull", elapsed_ms(pull_start));

            let frame = fit(frame, size);
            let pts = self.scheduler.next();
            let encode_start = Instant::now();
            encoder
                .append(&frame, pts)
                .map_err(|e| PipelineError::Encode(e.to_string()))?;
            self.logger.timing("encode", elapsed_ms(encode_start));

            written += 1;
            let total = source.total_frame_count().max(written);
            self.logger.progress(written, total);
            if let Some(ref callback) = self.on_progress {
                if !callback(written, total) {
                    self.cancelled.store(true, Ordering::Relaxed);
                }
            }
        }

        self.logger
            .metric("backpressure_waits", backpressure_waits as f64);
        Ok(written)
    }
}

fn fit(frame: Frame, size: FrameSize) -> Frame {
    if frame.size() == size && frame.channels() == 3 {
        frame
    } else {
        frame.fit_to(size)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Clears the way for a new output file.
fn prepare_output(path: &Path, overwrite: bool) -> Result<(), PipelineError> {
    if !path.exists() {
        return Ok(());
    }
    if !overwrite {
        return Err(PipelineError::InvalidRequest(format!(
            "{} already exists",
            path.display()
        )));
    }
    log::debug!("Removing existing output {}", path.display());
    std::fs::remove_file(path)?;
    Ok(())
}

fn discard_output(encoder: &mut dyn VideoEncoder, path: &Path) {
    if let Err(e) = encoder.finish() {
        log::debug!("Ignoring encoder error while discarding output: {e}");
    }
    remove_if_exists(path);
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {e}", path.display());
        }
    }
}
