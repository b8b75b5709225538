pub mod array_frame_source;
pub mod composited_frame_source;
pub mod file_sequence_frame_source;
pub mod image_crate_decoder;
pub mod overlay_compositor;
