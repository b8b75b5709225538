use crate::shared::frame::{Frame, FrameSize};
use crate::source::domain::frame_compositor::FrameCompositor;
use crate::source::domain::frame_source::{CompositeFrameSource, FrameSource};

/// Turns a multi-layer source into a sequential one by composing each
/// step's layers into a single frame.
pub struct CompositedFrameSource<S: CompositeFrameSource> {
    layers: S,
    compositor: Box<dyn FrameCompositor>,
    emitted: usize,
    exhausted: bool,
}

impl<S: CompositeFrameSource> CompositedFrameSource<S> {
    pub fn new(layers: S, compositor: Box<dyn FrameCompositor>) -> Self {
        Self {
            layers,
            compositor,
            emitted: 0,
            exhausted: false,
        }
    }
}

impl<S: CompositeFrameSource> FrameSource for CompositedFrameSource<S> {
    fn frame_size(&self) -> FrameSize {
        self.layers.frame_size()
    }

    fn total_frame_count(&self) -> usize {
        if self.exhausted {
            self.emitted
        } else {
            self.layers.total_frame_count()
        }
    }

    fn current_index(&self) -> usize {
        self.emitted
    }

    fn has_more(&self) -> bool {
        !self.exhausted && self.layers.has_more()
    }

    fn take_next(&mut self) -> Option<Frame> {
        if self.exhausted {
            return None;
        }
        let size = self.layers.frame_size();
        let Some(layers) = self.layers.next_layers() else {
            self.exhausted = true;
            return None;
        };
        let frame = self.compositor.compose(&layers, size).with_index(self.emitted);
        self.emitted += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::domain::multiplexed_frame_source::MultiplexedFrameSource;
    use crate::source::infrastructure::array_frame_source::ArrayFrameSource;
    use crate::source::infrastructure::overlay_compositor::OverlayCompositor;

    fn frames(count: usize, w: u32, h: u32, base: u8) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::new(vec![base + i as u8; (w * h * 3) as usize], w, h, 3, i))
            .collect()
    }

    fn composited(sources: Vec<Box<dyn FrameSource>>) -> CompositedFrameSource<MultiplexedFrameSource> {
        let mux = MultiplexedFrameSource::new(sources).unwrap();
        CompositedFrameSource::new(mux, Box::new(OverlayCompositor::new()))
    }

    #[test]
    fn test_emits_one_frame_per_virtual_position() {
        let video: Box<dyn FrameSource> = Box::new(ArrayFrameSource::new(frames(4, 2, 2, 0)));
        let overlay: Box<dyn FrameSource> = Box::new(ArrayFrameSource::new(frames(2, 1, 1, 100)));
        let mut source = composited(vec![video, overlay]);

        assert_eq!(source.total_frame_count(), 4);
        assert_eq!(source.frame_size(), FrameSize::new(2, 2));

        let mut out = Vec::new();
        while source.has_more() {
            out.push(source.take_next().unwrap());
        }

        assert_eq!(out.len(), 4);
        let overlay_pixels: Vec<u8> = out.iter().map(|f| f.data()[0]).collect();
        assert_eq!(overlay_pixels, vec![100, 100, 101, 101]);
        let base_pixels: Vec<u8> = out.iter().map(|f| f.data()[3]).collect();
        assert_eq!(base_pixels, vec![0, 1, 2, 3]);
        let indices: Vec<usize> = out.iter().map(Frame::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(source.take_next().is_none());
    }

    #[test]
    fn test_failed_layer_marks_exhausted() {
        struct Broken;
        impl FrameSource for Broken {
            fn frame_size(&self) -> FrameSize {
                FrameSize::new(1, 1)
            }
            fn total_frame_count(&self) -> usize {
                3
            }
            fn current_index(&self) -> usize {
                0
            }
            fn take_next(&mut self) -> Option<Frame> {
                None
            }
        }

        let mut source = composited(vec![Box::new(Broken)]);
        assert!(source.has_more());
        assert!(source.take_next().is_none());
        assert!(!source.has_more());
        assert_eq!(source.total_frame_count(), 0);
    }
}
