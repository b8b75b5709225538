use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes one still image file into a [`Frame`].
pub trait ImageDecoder: Send {
    fn decode(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error + Send + Sync>>;
}
