use std::collections::VecDeque;

use crate::shared::frame::{Frame, FrameSize};
use crate::source::domain::frame_source::FrameSource;

/// Serves frames that are already decoded and held in memory.
///
/// The frame size is taken from the first frame.
pub struct ArrayFrameSource {
    frames: VecDeque<Frame>,
    frame_size: FrameSize,
    total: usize,
    index: usize,
}

impl ArrayFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        let frame_size = frames.first().map(Frame::size).unwrap_or_default();
        let total = frames.len();
        Self {
            frames: frames.into(),
            frame_size,
            total,
            index: 0,
        }
    }
}

impl FrameSource for ArrayFrameSource {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn total_frame_count(&self) -> usize {
        self.total
    }

    fn current_index(&self) -> usize {
        self.index
    }

    fn take_next(&mut self) -> Option<Frame> {
        let frame = self.frames.pop_front()?;
        self.index += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(index: usize, w: u32, h: u32) -> Frame {
        Frame::new(vec![index as u8; (w * h * 3) as usize], w, h, 3, index)
    }

    #[test]
    fn test_yields_frames_in_order_then_exhausts() {
        let frames = (0..3).map(|i| solid_frame(i, 2, 2)).collect();
        let mut source = ArrayFrameSource::new(frames);

        assert_eq!(source.total_frame_count(), 3);
        for expected in 0..3 {
            assert!(source.has_more());
            assert_eq!(source.take_next().unwrap().index(), expected);
        }
        assert!(!source.has_more());
        assert!(source.take_next().is_none());
        assert_eq!(source.current_index(), 3);
    }

    #[test]
    fn test_frame_size_from_first_frame() {
        let source = ArrayFrameSource::new(vec![solid_frame(0, 4, 2), solid_frame(1, 8, 8)]);
        assert_eq!(source.frame_size(), FrameSize::new(4, 2));
    }

    #[test]
    fn test_empty_source() {
        let mut source = ArrayFrameSource::new(Vec::new());
        assert_eq!(source.frame_size(), FrameSize::default());
        assert!(!source.has_more());
        assert!(source.take_next().is_none());
    }
}
