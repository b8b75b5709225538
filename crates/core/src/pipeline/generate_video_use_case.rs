use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::domain::buffer_state::BufferConfig;
use crate::buffer::domain::frame_extractor::ClipOpener;
use crate::buffer::domain::memory_pressure::MemoryPressureSignal;
use crate::buffer::infrastructure::bounded_frame_buffer::BoundedFrameBuffer;
use crate::pipeline::images_to_video_use_case::{already_executed, decode_images};
use crate::pipeline::sampling::{sample_timestamps, TimelapseSettings};
use crate::pipeline::session_logger::SessionLogger;
use crate::pipeline::video_encoding_sink::{ProgressCallback, SessionConfig, VideoEncodingSink};
use crate::shared::constants::{
    DEFAULT_OUTPUT_EXTENSION, DEFAULT_SPEED, DEFAULT_TARGET_FPS, IMAGE_EXTENSIONS,
    VIDEO_EXTENSIONS,
};
use crate::shared::pipeline_error::PipelineError;
use crate::source::domain::frame_compositor::FrameCompositor;
use crate::source::domain::frame_source::FrameSource;
use crate::source::domain::image_decoder::ImageDecoder;
use crate::source::domain::multiplexed_frame_source::MultiplexedFrameSource;
use crate::source::infrastructure::array_frame_source::ArrayFrameSource;
use crate::source::infrastructure::composited_frame_source::CompositedFrameSource;
use crate::video::domain::video_encoder::VideoEncoder;

/// A request to turn videos and images into one output video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateVideoRequest {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_fps() -> u32 {
    DEFAULT_TARGET_FPS
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

impl GenerateVideoRequest {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidRequest(e.to_string()))
    }

    /// The output path, with the default container extension added when
    /// none was given.
    pub fn output_path(&self) -> PathBuf {
        if self.output.extension().is_some() {
            self.output.clone()
        } else {
            self.output.with_extension(DEFAULT_OUTPUT_EXTENSION)
        }
    }
}

/// Outcome of a request: exactly one of the fields is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateVideoResponse {
    pub output: Option<String>,
    pub error: Option<String>,
}

impl GenerateVideoResponse {
    pub fn from_result(result: &Result<PathBuf, PipelineError>) -> Self {
        match result {
            Ok(path) => Self {
                output: Some(path.to_string_lossy().into_owned()),
                error: None,
            },
            Err(e) => Self {
                output: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"output":null,"error":"{e}"}}"#))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Video,
}

/// Classifies an input by its file extension, case-insensitively.
pub fn classify_input(path: &Path) -> Result<InputKind, PipelineError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| PipelineError::UnsupportedInput(path.to_path_buf()))?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(InputKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(InputKind::Video)
    } else {
        Err(PipelineError::UnsupportedInput(path.to_path_buf()))
    }
}

/// Handles a [`GenerateVideoRequest`].
///
/// Every video becomes a [`BoundedFrameBuffer`] sampled at `fps / speed`;
/// all images together become one in-memory source placed where the first
/// image appears in the input list. Several sources are multiplexed onto
/// the longest timeline and composited in input order, bottom first.
/// Inputs that open with no frames are dropped; if none remain the request
/// fails with [`PipelineError::NoUsableSource`]. Single-use.
pub struct GenerateVideoUseCase {
    decoder: Option<Box<dyn ImageDecoder>>,
    opener: Box<dyn ClipOpener>,
    compositor: Option<Box<dyn FrameCompositor>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    buffer_config: BufferConfig,
    pressure: Option<MemoryPressureSignal>,
    logger: Option<Box<dyn SessionLogger>>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl GenerateVideoUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decoder: Box<dyn ImageDecoder>,
        opener: Box<dyn ClipOpener>,
        compositor: Box<dyn FrameCompositor>,
        encoder: Box<dyn VideoEncoder>,
        buffer_config: BufferConfig,
        pressure: Option<MemoryPressureSignal>,
        logger: Option<Box<dyn SessionLogger>>,
        on_progress: Option<ProgressCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            decoder: Some(decoder),
            opener,
            compositor: Some(compositor),
            encoder: Some(encoder),
            buffer_config,
            pressure,
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(&mut self, request: &GenerateVideoRequest) -> Result<PathBuf, PipelineError> {
        let settings = TimelapseSettings::new(request.fps, request.speed)?;
        if request.inputs.is_empty() {
            return Err(PipelineError::InvalidRequest("no inputs given".into()));
        }
        let kinds = request
            .inputs
            .iter()
            .map(|path| classify_input(path))
            .collect::<Result<Vec<_>, _>>()?;

        let decoder = self.decoder.take().ok_or_else(already_executed)?;
        let compositor = self.compositor.take().ok_or_else(already_executed)?;
        let encoder = self.encoder.take().ok_or_else(already_executed)?;

        let sources = self.open_sources(&request.inputs, &kinds, &*decoder, &settings)?;
        let source = combine(sources, compositor)?;

        let config = SessionConfig {
            output_path: request.output_path(),
            frame_interval: settings.frame_interval(),
            overwrite: true,
        };
        let mut sink = VideoEncodingSink::new(source, encoder, config)
            .with_cancel_flag(self.cancelled.clone());
        if let Some(logger) = self.logger.take() {
            sink = sink.with_logger(logger);
        }
        if let Some(on_progress) = self.on_progress.take() {
            sink = sink.with_progress(on_progress);
        }
        sink.run()
    }

    fn open_sources(
        &self,
        inputs: &[PathBuf],
        kinds: &[InputKind],
        decoder: &dyn ImageDecoder,
        settings: &TimelapseSettings,
    ) -> Result<Vec<Box<dyn FrameSource>>, PipelineError> {
        let images: Vec<PathBuf> = inputs
            .iter()
            .zip(kinds)
            .filter(|(_, kind)| **kind == InputKind::Image)
            .map(|(path, _)| path.clone())
            .collect();
        let mut images = Some(images);

        let mut sources: Vec<Box<dyn FrameSource>> = Vec::new();
        for (path, kind) in inputs.iter().zip(kinds) {
            match kind {
                InputKind::Video => match self.open_video(path, settings) {
                    Ok(source) => sources.push(source),
                    Err(e) => log::warn!("Skipping {}: {e}", path.display()),
                },
                InputKind::Image => {
                    if let Some(images) = images.take() {
                        let frames = decode_images(decoder, &images);
                        log::debug!("Decoded {} of {} images", frames.len(), images.len());
                        sources.push(Box::new(ArrayFrameSource::new(frames)));
                    }
                }
            }
        }

        sources.retain(|source| source.has_more());
        Ok(sources)
    }

    fn open_video(
        &self,
        path: &Path,
        settings: &TimelapseSettings,
    ) -> Result<Box<dyn FrameSource>, PipelineError> {
        let clip = self.opener.open_clip(path)?;
        let timestamps = sample_timestamps(clip.metadata.duration, settings);
        log::info!("Sampling {} frames from {}", timestamps.len(), path.display());
        Ok(Box::new(BoundedFrameBuffer::new(
            clip.extractor,
            clip.metadata.frame_size(),
            timestamps,
            self.buffer_config,
            self.pressure.as_ref(),
        )))
    }
}

fn combine(
    mut sources: Vec<Box<dyn FrameSource>>,
    compositor: Box<dyn FrameCompositor>,
) -> Result<Box<dyn FrameSource>, PipelineError> {
    match sources.len() {
        0 => Err(PipelineError::NoUsableSource),
        1 => sources.pop().ok_or(PipelineError::NoUsableSource),
        _ => {
            let layers = MultiplexedFrameSource::new(sources)?;
            Ok(Box::new(CompositedFrameSource::new(layers, compositor)))
        }
    }
}
