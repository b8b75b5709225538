use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::pipeline::session_logger::SessionLogger;
use crate::pipeline::video_encoding_sink::{ProgressCallback, SessionConfig, VideoEncodingSink};
use crate::shared::frame::Frame;
use crate::shared::pipeline_error::PipelineError;
use crate::source::domain::frame_source::FrameSource;
use crate::source::domain::image_decoder::ImageDecoder;
use crate::source::infrastructure::array_frame_source::ArrayFrameSource;
use crate::source::infrastructure::file_sequence_frame_source::{
    FileSequenceFrameSource, FileSequenceOptions,
};
use crate::video::domain::video_encoder::VideoEncoder;

/// Where the stills come from.
#[derive(Clone, Debug)]
pub enum ImageInput {
    /// Explicit files, decoded up front in the given order.
    Files(Vec<PathBuf>),
    /// A numbered sequence such as `frames/img_%04d.png`, decoded lazily.
    Sequence {
        template: String,
        options: FileSequenceOptions,
    },
}

/// Encodes still images into a video at a fixed frame rate.
///
/// Single-use: `execute` consumes the decoder and encoder.
pub struct ImagesToVideoUseCase {
    decoder: Option<Box<dyn ImageDecoder>>,
    encoder: Option<Box<dyn VideoEncoder>>,
    logger: Option<Box<dyn SessionLogger>>,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl ImagesToVideoUseCase {
    pub fn new(
        decoder: Box<dyn ImageDecoder>,
        encoder: Box<dyn VideoEncoder>,
        logger: Option<Box<dyn SessionLogger>>,
        on_progress: Option<ProgressCallback>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            decoder: Some(decoder),
            encoder: Some(encoder),
            logger,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(
        &mut self,
        input: ImageInput,
        config: SessionConfig,
    ) -> Result<PathBuf, PipelineError> {
        let decoder = self.decoder.take().ok_or_else(already_executed)?;
        let encoder = self.encoder.take().ok_or_else(already_executed)?;

        let source: Box<dyn FrameSource> = match input {
            ImageInput::Files(paths) => {
                Box::new(ArrayFrameSource::new(decode_images(&*decoder, &paths)))
            }
            ImageInput::Sequence { template, options } => {
                Box::new(FileSequenceFrameSource::open(&template, options, decoder))
            }
        };
        if !source.has_more() {
            return Err(PipelineError::NoUsableSource);
        }

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
}

pub(crate) fn already_executed() -> PipelineError {
    PipelineError::InvalidRequest("pipeline already executed".into())
}

/// Decodes `paths` in order, skipping files that fail to decode.
pub fn decode_images(decoder: &dyn ImageDecoder, paths: &[PathBuf]) -> Vec<Frame> {
    paths
        .iter()
        .filter_map(|path| decode_one(decoder, path))
        .enumerate()
        .map(|(i, frame)| frame.with_index(i))
        .collect()
}

fn decode_one(decoder: &dyn ImageDecoder, path: &Path) -> Option<Frame> {
    match decoder.decode(path) {
        Ok(frame) => Some(frame),
        Err(e) => {
            log::warn!("Skipping image {}: {e}", path.display());
            None
        }
    }
}
