pub mod frame_compositor;
pub mod frame_source;
pub mod image_decoder;
pub mod multiplexed_frame_source;
