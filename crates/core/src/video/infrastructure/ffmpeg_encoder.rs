use std::path::Path;

use crate::shared::frame::{Frame, FrameSize};
use crate::shared::media_time::MediaTime;
use crate::video::domain::video_encoder::VideoEncoder;
use crate::video::infrastructure::ffmpeg_pixels::rgb_video_frame;

/// Encodes RGB frames to MPEG-4 video via ffmpeg-next.
///
/// The encoder time base is `1 / timescale` of the frame interval, so
/// presentation times map to exact integer ticks.
pub struct FfmpegEncoder {
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    size: FrameSize,
    time_base: ffmpeg_next::Rational,
    frame_count: usize,
    video_stream_index: usize,
}

// Safety: FfmpegEncoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegEncoder {}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            octx: None,
            encoder: None,
            scaler: None,
            size: FrameSize::default(),
            time_base: ffmpeg_next::Rational(1, 1),
            frame_count: 0,
            video_stream_index: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    fn drain_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) else {
            return Err("FfmpegEncoder: not opened".into());
        };
        let ost_time_base = octx
            .stream(self.video_stream_index)
            .ok_or("FfmpegEncoder: output stream missing")?
            .time_base();

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.video_stream_index);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        Ok(())
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn open(
        &mut self,
        path: &Path,
        size: FrameSize,
        frame_interval: MediaTime,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        if size.is_empty() {
            return Err(format!("cannot encode {}x{} frames", size.width, size.height).into());
        }
        if frame_interval.value() <= 0 {
            return Err(format!("frame interval must be positive, got {frame_interval}").into());
        }
        let ticks_per_frame =
            i32::try_from(frame_interval.value()).map_err(|_| "frame interval out of range")?;

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        // Use MPEG4 as a widely compatible encoder
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        let time_base = ffmpeg_next::Rational(1, frame_interval.timescale());
        encoder_ctx.set_width(size.width);
        encoder_ctx.set_height(size.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(
            frame_interval.timescale(),
            ticks_per_frame,
        )));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        self.video_stream_index = ost.index();

        octx.write_header()?;

        // Set up RGB -> YUV scaler
        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            size.width,
            size.height,
            ffmpeg_next::format::Pixel::YUV420P,
            size.width,
            size.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.size = size;
        self.time_base = time_base;
        self.frame_count = 0;

        Ok(())
    }

    fn append(&mut self, frame: &Frame, pts: MediaTime) -> Result<(), Box<dyn std::error::Error>> {
        let (Some(encoder), Some(scaler)) = (self.encoder.as_mut(), self.scaler.as_mut()) else {
            return Err("FfmpegEncoder: not opened".into());
        };
        if frame.size() != self.size || frame.channels() != 3 {
            return Err(format!(
                "expected {}x{} RGB frame, got {}x{} with {} channels",
                self.size.width,
                self.size.height,
                frame.width(),
                frame.height(),
                frame.channels()
            )
            .into());
        }

        let rgb_frame = rgb_video_frame(frame);

        // Convert RGB -> YUV
        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(pts.rescale(self.time_base.denominator() as i64)));

        encoder.send_frame(&yuv_frame)?;
        self.drain_packets()?;

        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.encoder.is_none() {
            return Ok(());
        }

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.send_eof()?;
        }
        self.drain_packets()?;
        if let Some(octx) = self.octx.as_mut() {
            octx.write_trailer()?;
        }

        self.octx = None;
        self.encoder = None;
        self.scaler = None;

        Ok(())
    }
}
