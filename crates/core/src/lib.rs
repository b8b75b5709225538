pub mod buffer;
pub mod pipeline;
pub mod shared;
pub mod source;
pub mod video;
