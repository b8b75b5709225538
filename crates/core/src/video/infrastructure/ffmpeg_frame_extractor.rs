use std::path::{Path, PathBuf};

use crate::buffer::domain::frame_extractor::{
    ClipOpener, ExtractError, FrameCallback, FrameExtractor, OpenedClip,
};
use crate::shared::frame::Frame;
use crate::shared::media_time::MediaTime;
use crate::shared::pipeline_error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::infrastructure::ffmpeg_pixels::extract_rgb_pixels;
use crate::video::infrastructure::ffmpeg_probe::{probe, AV_TIME_BASE};

/// Decodes the frames of a video file that are on screen at given times.
///
/// Each batch opens the container, seeks to the keyframe at or before the
/// first requested time and decodes forward. A request is answered with the
/// latest frame whose presentation time is not after it; requests past the
/// end get the last frame.
pub struct FfmpegFrameExtractor {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl FfmpegFrameExtractor {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let metadata = probe(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }
}

/// Opens clips with [`FfmpegFrameExtractor`].
pub struct FfmpegClipOpener;

impl ClipOpener for FfmpegClipOpener {
    fn open_clip(&self, path: &Path) -> Result<OpenedClip, PipelineError> {
        let extractor = FfmpegFrameExtractor::open(path)?;
        Ok(OpenedClip {
            metadata: extractor.metadata().clone(),
            extractor: Box::new(extractor),
        })
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn extract(
        &mut self,
        times: &[MediaTime],
        on_frame: &mut FrameCallback<'_>,
    ) -> Result<(), ExtractError> {
        let Some(&first) = times.first() else {
            return Ok(());
        };

        let mut ictx = ffmpeg_next::format::input(&self.path)?;
        let (stream_index, time_base, start_ticks, decoder) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or("No video stream found")?;
            let start = stream.start_time();
            let start = if start == ffmpeg_next::ffi::AV_NOPTS_VALUE {
                0
            } else {
                start
            };
            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
            (
                stream.index(),
                stream.time_base(),
                start,
                codec_ctx.decoder().video()?,
            )
        };

        if first > MediaTime::ZERO {
            let start = MediaTime::from_time_base(
                start_ticks,
                time_base.numerator(),
                time_base.denominator(),
            );
            let target = first.add(start).rescale(AV_TIME_BASE);
            if let Err(e) = ictx.seek(target, ..target) {
                log::debug!("Seek to {first} failed, decoding from start: {e}");
            }
        }

        let mut frames = DecodedFrames {
            ictx: &mut ictx,
            decoder,
            stream_index,
            time_base,
            start_ticks,
            flushing: false,
            done: false,
        };
        let mut converter = RgbConverter::default();
        let mut shown: Option<DecodedFrame> = None;
        let mut upcoming: Option<DecodedFrame> = None;

        for (i, &time) in times.iter().enumerate() {
            loop {
                if upcoming.is_none() {
                    upcoming = frames.next();
                }
                match upcoming.take() {
                    Some(frame) if frame.pts <= time => shown = Some(frame),
                    other => {
                        upcoming = other;
                        break;
                    }
                }
            }

            // A seek can land after the request; the first frame decoded is
            // then the closest one available.
            let result = match shown.as_ref().or(upcoming.as_ref()) {
                Some(frame) => converter.convert(&frame.video, i),
                None => Err(format!("no decodable frame at {time}").into()),
            };
            if on_frame(i, result).is_break() {
                break;
            }
        }
        Ok(())
    }
}

struct DecodedFrame {
    pts: MediaTime,
    video: ffmpeg_next::util::frame::video::Video,
}

/// Lazy decode loop yielding raw frames with stream-relative timestamps.
struct DecodedFrames<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    time_base: ffmpeg_next::Rational,
    start_ticks: i64,
    flushing: bool,
    done: bool,
}

impl Iterator for DecodedFrames<'_> {
    type Item = DecodedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let ticks = decoded.timestamp().or(decoded.pts()).unwrap_or(self.start_ticks);
                let pts = MediaTime::from_time_base(
                    ticks.saturating_sub(self.start_ticks),
                    self.time_base.numerator(),
                    self.time_base.denominator(),
                );
                return Some(DecodedFrame {
                    pts,
                    video: decoded,
                });
            }

            if self.flushing {
                self.done = true;
                return None;
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }
}

/// Converts decoded frames to packed RGB, rebuilding the scaler only when
/// the input format or size changes.
#[derive(Default)]
struct RgbConverter {
    scaler: Option<ffmpeg_next::software::scaling::Context>,
}

impl RgbConverter {
    fn convert(
        &mut self,
        video: &ffmpeg_next::util::frame::video::Video,
        index: usize,
    ) -> Result<Frame, ExtractError> {
        let (width, height, format) = (video.width(), video.height(), video.format());
        let stale = self.scaler.as_ref().map_or(true, |scaler| {
            let input = scaler.input();
            input.format != format || input.width != width || input.height != height
        });
        if stale {
            self.scaler = Some(ffmpeg_next::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?);
        }
        let scaler = self.scaler.as_mut().ok_or("scaler unavailable")?;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(video, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        Ok(Frame::new(pixels, width, height, 3, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::domain::buffer_state::BufferConfig;
    use crate::buffer::infrastructure::bounded_frame_buffer::BoundedFrameBuffer;
    use crate::shared::frame::FrameSize;
    use crate::source::domain::frame_source::FrameSource;
    use crate::video::infrastructure::ffmpeg_probe::test_support::create_test_video;
    use std::ops::ControlFlow;

    fn mean(frame: &Frame) -> f64 {
        frame.data().iter().map(|&b| b as f64).sum::<f64>() / frame.data().len() as f64
    }

    fn gray_of(source_frame: usize) -> f64 {
        ((source_frame * 40) % 256) as f64
    }

    fn clip(dir: &Path) -> PathBuf {
        let path = dir.join("clip.mp4");
        create_test_video(&path, 30, 160, 120, 30);
        path
    }

    fn extract_all(extractor: &mut FfmpegFrameExtractor, times: &[MediaTime]) -> Vec<Frame> {
        let mut out = Vec::new();
        extractor
            .extract(times, &mut |_, result| {
                out.push(result.unwrap());
                ControlFlow::Continue(())
            })
            .unwrap();
        out
    }

    #[test]
    fn test_open_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = clip(dir.path());

        let extractor = FfmpegFrameExtractor::open(&path).unwrap();
        assert_eq!(extractor.metadata().width, 160);
        assert_eq!(extractor.metadata().height, 120);
    }

    #[test]
    fn test_clip_opener_reports_probe_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = clip(dir.path());

        let opened = FfmpegClipOpener.open_clip(&path).unwrap();
        assert_eq!(opened.metadata.frame_size(), FrameSize::new(160, 120));
        assert_eq!(opened.metadata.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(FfmpegFrameExtractor::open(Path::new("/nonexistent/clip.mp4")).is_err());
    }

    #[test]
    fn test_extracts_frame_on_screen_at_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = FfmpegFrameExtractor::open(&clip(dir.path())).unwrap();

        // Midway between source frames 5/6, 10/11 and 20/21
        let times = [
            MediaTime::new(11, 60),
            MediaTime::new(21, 60),
            MediaTime::new(41, 60),
        ];
        let frames = extract_all(&mut extractor, &times);

        assert_eq!(frames.len(), 3);
        for (frame, source_frame) in frames.iter().zip([5, 10, 20]) {
            assert_eq!(frame.size(), extractor.metadata().frame_size());
            assert_eq!(frame.channels(), 3);
            let expected = gray_of(source_frame);
            assert!(
                (mean(frame) - expected).abs() < 20.0,
                "frame {source_frame}: mean {} expected {expected}",
                mean(frame)
            );
        }
    }

    #[test]
    fn test_time_past_end_gets_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = FfmpegFrameExtractor::open(&clip(dir.path())).unwrap();

        let frames = extract_all(&mut extractor, &[MediaTime::new(5, 1)]);

        assert_eq!(frames.len(), 1);
        assert!((mean(&frames[0]) - gray_of(29)).abs() < 20.0);
    }

    #[test]
    fn test_break_stops_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = FfmpegFrameExtractor::open(&clip(dir.path())).unwrap();
        let times: Vec<MediaTime> = (0..10).map(|i| MediaTime::new(i, 30)).collect();

        let mut calls = 0;
        extractor
            .extract(&times, &mut |_, _| {
                calls += 1;
                if calls == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert_eq!(calls, 3);
    }

    #[test]
    fn test_feeds_bounded_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegFrameExtractor::open(&clip(dir.path())).unwrap();
        let size = extractor.metadata().frame_size();
        // Midway through each of the first 15 source frames
        let timestamps: Vec<MediaTime> = (0..15).map(|i| MediaTime::new(2 * i + 1, 60)).collect();

        let mut buffer = BoundedFrameBuffer::new(
            Box::new(extractor),
            size,
            timestamps,
            BufferConfig::new(2, 4).unwrap(),
            None,
        );

        let mut means = Vec::new();
        while let Some(frame) = buffer.take_next() {
            means.push(mean(&frame));
        }
        assert_eq!(means.len(), 15);
        for (k, m) in means.iter().enumerate() {
            assert!((m - gray_of(k)).abs() < 20.0, "position {k}: mean {m}");
        }
    }
}
