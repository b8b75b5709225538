pub mod ffmpeg_encoder;
pub mod ffmpeg_frame_extractor;
pub mod ffmpeg_pixels;
pub mod ffmpeg_probe;
