pub mod constants;
pub mod frame;
pub mod media_time;
pub mod pipeline_error;
pub mod video_metadata;
