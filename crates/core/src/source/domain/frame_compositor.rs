use crate::shared::frame::{Frame, FrameSize};

/// Flattens a stack of layers into one RGB frame of `size`.
pub trait FrameCompositor: Send {
    /// `layers` is ordered bottom to top and is never empty.
    fn compose(&self, layers: &[&Frame], size: FrameSize) -> Frame;
}
