use std::path::Path;

use crate::shared::frame::{Frame, FrameSize};
use crate::shared::media_time::MediaTime;

/// Abstracts video encoding so the sink can write output without
/// depending on a specific codec library.
pub trait VideoEncoder: Send {
    /// Creates the output container at `path` for RGB frames of `size`
    /// shown once every `frame_interval`.
    fn open(
        &mut self,
        path: &Path,
        size: FrameSize,
        frame_interval: MediaTime,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// False while the encoder cannot accept another frame yet.
    fn is_ready_for_more(&self) -> bool {
        true
    }

    /// Appends one RGB frame of the opened size at presentation time `pts`.
    fn append(&mut self, frame: &Frame, pts: MediaTime) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes pending packets and finalizes the container.
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
