use std::path::Path;

use crate::shared::media_time::MediaTime;
use crate::shared::pipeline_error::PipelineError;
use crate::shared::video_metadata::VideoMetadata;

/// Container-level time unit used by `Input::duration` and `Input::seek`.
pub const AV_TIME_BASE: i64 = 1_000_000;

/// Opens `path` and describes its best video stream.
pub fn probe(path: &Path) -> Result<VideoMetadata, PipelineError> {
    let decode_error = |e: ffmpeg_next::Error| PipelineError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    ffmpeg_next::init().map_err(decode_error)?;
    let ictx = ffmpeg_next::format::input(path).map_err(decode_error)?;

    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| PipelineError::NoVideoTrack {
            path: path.to_path_buf(),
        })?;

    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .map_err(decode_error)?;
    let decoder = codec_ctx.decoder().video().map_err(decode_error)?;

    let rate = stream.avg_frame_rate();
    let rate = if rate.denominator() != 0 && rate.numerator() != 0 {
        rate
    } else {
        stream.rate()
    };
    let fps = if rate.denominator() != 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    };

    let time_base = stream.time_base();
    let duration = if stream.duration() > 0 {
        MediaTime::from_time_base(
            stream.duration(),
            time_base.numerator(),
            time_base.denominator(),
        )
    } else if ictx.duration() > 0 {
        MediaTime::new(ictx.duration(), AV_TIME_BASE as i32)
    } else {
        MediaTime::ZERO
    };

    Ok(VideoMetadata {
        width: decoder.width(),
        height: decoder.height(),
        fps,
        total_frames: stream.frames().max(0) as usize,
        duration,
        codec: decoder
            .codec()
            .map(|c| c.name().to_string())
            .unwrap_or_default(),
        source_path: Some(path.to_path_buf()),
    })
}
