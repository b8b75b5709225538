use std::ops::ControlFlow;
use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::media_time::MediaTime;
use crate::shared::pipeline_error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;

pub type ExtractError = Box<dyn std::error::Error + Send + Sync>;

/// Callback receiving `(request_index, result)` for each requested time.
///
/// Returning `ControlFlow::Break` asks the extractor to stop decoding the
/// rest of the batch.
pub type FrameCallback<'a> =
    dyn FnMut(usize, Result<Frame, ExtractError>) -> ControlFlow<()> + 'a;

/// Decodes frames of a source video at requested presentation times.
///
/// `times` are ascending. The extractor calls `on_frame` once per requested
/// time, roughly in request order, with either the frame on screen at that
/// time or the reason it could not be produced. An `Err` return means the
/// batch as a whole failed (container could not be opened, etc.).
pub trait FrameExtractor: Send {
    fn extract(
        &mut self,
        times: &[MediaTime],
        on_frame: &mut FrameCallback<'_>,
    ) -> Result<(), ExtractError>;
}

/// A video file opened for extraction.
pub struct OpenedClip {
    pub metadata: VideoMetadata,
    pub extractor: Box<dyn FrameExtractor>,
}

/// Opens video files as [`FrameExtractor`]s.
pub trait ClipOpener: Send {
    fn open_clip(&self, path: &Path) -> Result<OpenedClip, PipelineError>;
}
