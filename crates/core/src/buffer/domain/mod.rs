pub mod buffer_state;
pub mod frame_extractor;
pub mod memory_pressure;
