use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::buffer::domain::buffer_state::BufferConfig;
use crate::buffer::domain::frame_extractor::ClipOpener;
use crate::buffer::domain::memory_pressure::MemoryPressureSignal;
use crate::buffer::infrastructure::bounded_frame_buffer::BoundedFrameBuffer;
use crate::pipeline::images_to_video_use_case::already_executed;
use crate::pipeline::sampling::{sample_timestamps, TimelapseSettings};
use crate::pipeline::session_logger::SessionLogger;
use crate::pipeline::video_encoding_sink::{ProgressCallback, SessionConfig, VideoEncodingSink};
use crate::shared::pipeline_error::PipelineError;
use crate::video::domain::video_encoder::VideoEncoder;

/// Speeds a clip up by sampling it evenly and re-encoding the samples at
/// the target frame rate.
///
/// Frames are decoded through a [`BoundedFrameBuffer`], so only a window of
/// the clip is ever held in memory. Single-use.
pub struct TimelapseUseCase {
    opener: Box<dyn ClipOpener>,
    encoder: Option<Box<dyn VideoEncoder>>,
    settings: TimelapseSettings,
    buffer_config: BufferConfig,
    pressure: Option<MemoryPressureSignal>,
    logger: Option<Box<dyn SessionLogger>>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl TimelapseUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opener: Box<dyn ClipOpener>,
        encoder: Box<dyn VideoEncoder>,
        settings: TimelapseSettings,
        buffer_config: BufferConfig,
        pressure: Option<MemoryPressureSignal>,
        logger: Option<Box<dyn SessionLogger>>,
        on_progress: Option<ProgressCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            opener,
            encoder: Some(encoder),
            settings,
            buffer_config,
            pressure,
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(&mut self, input: &Path, output: &Path) -> Result<PathBuf, PipelineError> {
        let encoder = self.encoder.take().ok_or_else(already_executed)?;

        let clip = self.opener.open_clip(input)?;
        let timestamps = sample_timestamps(clip.metadata.duration, &self.settings);
        log::info!(
            "Timelapse of {}: {} samples over {:.2}s at {} fps, {}x",
            input.display(),
            timestamps.len(),
            clip.metadata.duration.seconds(),
            self.settings.target_fps,
            self.settings.speed
        );

        let buffer = BoundedFrameBuffer::new(
            clip.extractor,
            clip.metadata.frame_size(),
            timestamps,
            self.buffer_config,
            self.pressure.as_ref(),
        );
        let config = SessionConfig {
            output_path: output.to_path_buf(),
            frame_interval: self.settings.frame_interval(),
            overwrite: true,
        };

        let mut sink = VideoEncodingSink::new(Box::new(buffer), encoder, config)
            .with_cancel_flag(self.cancelled.clone());
        if let Some(logger) = self.logger.take() {
            sink = sink.with_logger(logger);
        }
        if let Some(on_progress) = self.on_progress.take() {
            sink = sink.with_progress(on_progress);
        }
        sink.run()
    }
}
