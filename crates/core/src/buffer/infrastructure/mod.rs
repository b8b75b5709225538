pub mod bounded_frame_buffer;
pub mod system_memory_monitor;
