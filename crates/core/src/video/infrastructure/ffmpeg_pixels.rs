use crate::shared::frame::Frame;

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
pub fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

/// Builds an RGB24 ffmpeg frame from a packed RGB [`Frame`], respecting stride.
pub fn rgb_video_frame(frame: &Frame) -> ffmpeg_next::util::frame::video::Video {
    let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
        ffmpeg_next::format::Pixel::RGB24,
        frame.width(),
        frame.height(),
    );
    let row_len = frame.width() as usize * 3;
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data_mut(0);
    for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
        let dst_start = row * stride;
        data[dst_start..dst_start + row_len].copy_from_slice(src);
    }
    rgb_frame
}
