use ndarray::{s, Array3, ArrayView3, Axis, Zip};

/// Width and height of a frame in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A single decoded still: contiguous pixel bytes in row-major order.
///
/// Frames are immutable once built and move from source to sink by value.
/// `channels` is 3 (RGB) for decoded video and 3 or 4 (RGBA) for stills;
/// encoders only ever see RGB, produced by [`Frame::fit_to`].
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of this frame within the sequence that produced it.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(self, index: usize) -> Self {
        Self { index, ..self }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Draws this frame at the top-left of a black RGB canvas of `size`.
    ///
    /// Larger frames are cropped, smaller ones padded. Alpha is flattened
    /// over black; single-channel frames are expanded to gray RGB.
    pub fn fit_to(&self, size: FrameSize) -> Frame {
        if self.size() == size && self.channels == 3 {
            return self.clone();
        }

        let mut canvas = Array3::<u8>::zeros((size.height as usize, size.width as usize, 3));
        let rows = self.height.min(size.height) as usize;
        let cols = self.width.min(size.width) as usize;
        let channels = self.channels as usize;

        let src = self.as_ndarray();
        Zip::from(canvas.slice_mut(s![..rows, ..cols, ..]).lanes_mut(Axis(2)))
            .and(src.slice(s![..rows, ..cols, ..]).lanes(Axis(2)))
            .for_each(|mut dst, px| match channels {
                4 => {
                    let alpha = px[3] as u16;
                    for c in 0..3 {
                        dst[c] = ((px[c] as u16 * alpha + 127) / 255) as u8;
                    }
                }
                3 => {
                    for c in 0..3 {
                        dst[c] = px[c];
                    }
                }
                _ => dst.fill(px[0]),
            });

        let (data, _) = canvas.into_raw_vec_and_offset();
        Frame::new(data, size.width, size.height, 3, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
