use ndarray::{s, Axis, Zip};

use crate::shared::frame::{Frame, FrameSize};
use crate::source::domain::frame_compositor::FrameCompositor;

/// Stacks layers at the top-left corner of the canvas.
///
/// The bottom layer is fitted to the canvas. RGBA layers above it are
/// alpha-blended; RGB layers cover whatever lies beneath them.
pub struct OverlayCompositor;

impl OverlayCompositor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCompositor for OverlayCompositor {
    fn compose(&self, layers: &[&Frame], size: FrameSize) -> Frame {
        let Some((base, overlays)) = layers.split_first() else {
            return Frame::new(
                vec![0; size.width as usize * size.height as usize * 3],
                size.width,
                size.height,
                3,
                0,
            );
        };

        let base = base.fit_to(size);
        let index = base.index();
        let mut canvas = base.as_ndarray().to_owned();

        for overlay in overlays {
            let rows = overlay.height().min(size.height) as usize;
            let cols = overlay.width().min(size.width) as usize;
            let has_alpha = overlay.channels() == 4;
            let top = overlay.as_ndarray();

            Zip::from(canvas.slice_mut(s![..rows, ..cols, ..]).lanes_mut(Axis(2)))
                .and(top.slice(s![..rows, ..cols, ..]).lanes(Axis(2)))
                .for_each(|mut dst, px| {
                    if px.len() < 3 {
                        dst.fill(px[0]);
                    } else if has_alpha {
                        let alpha = px[3] as u16;
                        for c in 0..3 {
                            let blended = px[c] as u16 * alpha + dst[c] as u16 * (255 - alpha);
                            dst[c] = ((blended + 127) / 255) as u8;
                        }
                    } else {
                        for c in 0..3 {
                            dst[c] = px[c];
                        }
                    }
                });
        }

        let (data, _) = canvas.into_raw_vec_and_offset();
        Frame::new(data, size.width, size.height, 3, index)
    }
}
