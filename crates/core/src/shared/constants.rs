/// Refill starts once the buffered queue drops below this many frames.
pub const DEFAULT_LOW_WATERMARK: usize = 5;

/// Refill stops once the buffered queue grows past this many frames.
pub const DEFAULT_HIGH_WATERMARK: usize = 20;

pub const DEFAULT_TARGET_FPS: u32 = 30;
pub const DEFAULT_SPEED: f64 = 2.0;

/// Upper bound when probing a numbered image sequence for its length.
pub const DEFAULT_PROBE_LIMIT: usize = 100_000;

/// Available-memory fraction under which the system monitor raises pressure.
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 0.05;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp", "gif"];

/// Container written by the encoder when the caller gives a bare name.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "mp4";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "avi", "webm"];
