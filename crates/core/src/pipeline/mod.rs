pub mod frame_rate_scheduler;
pub mod generate_video_use_case;
pub mod images_to_video_use_case;
pub mod sampling;
pub mod session_logger;
pub mod timelapse_use_case;
pub mod video_encoding_sink;
