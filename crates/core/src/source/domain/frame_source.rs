use crate::shared::frame::{Frame, FrameSize};

/// A sequence of frames pulled one at a time by a single consumer.
///
/// `total_frame_count` is the number of frames the source expects to
/// deliver. It may be revised downward when a frame cannot be decoded, so
/// callers re-read it rather than caching it.
pub trait FrameSource: Send {
    fn frame_size(&self) -> FrameSize;

    fn total_frame_count(&self) -> usize;

    /// Number of frames already handed out.
    fn current_index(&self) -> usize;

    fn has_more(&self) -> bool {
        self.current_index() < self.total_frame_count()
    }

    /// Removes and returns the next frame, or `None` once exhausted.
    fn take_next(&mut self) -> Option<Frame>;
}

/// A source that yields several layers per step instead of one frame.
///
/// Kept apart from [`FrameSource`] so a multi-layer source cannot be pulled
/// sequentially by mistake; it must be paired with a compositor first.
pub trait CompositeFrameSource: Send {
    /// Size of the canvas the layers are meant to be composed onto.
    fn frame_size(&self) -> FrameSize;

    fn total_frame_count(&self) -> usize;

    fn has_more(&self) -> bool;

    /// Resolves every layer for the next virtual position, bottom first.
    fn next_layers(&mut self) -> Option<Vec<&Frame>>;
}
