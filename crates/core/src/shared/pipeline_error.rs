use std::path::PathBuf;

use thiserror::Error;

/// Why an encoding run produced no output.
///
/// Per-frame decode failures never show up here; they shrink the expected
/// frame count of the source instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no video track in {path}")]
    NoVideoTrack { path: PathBuf },
    #[error("failed to initialise encoder: {0}")]
    EncoderInit(String),
    #[error("no usable frame source")]
    NoUsableSource,
    #[error("source produced no frames")]
    NoFramesProduced,
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unsupported input: {0}")]
    UnsupportedInput(PathBuf),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_reason() {
        let err = PipelineError::NoVideoTrack {
            path: PathBuf::from("clip.mov"),
        };
        assert_eq!(err.to_string(), "no video track in clip.mov");
        assert_eq!(
            PipelineError::EncoderInit("codec missing".into()).to_string(),
            "failed to initialise encoder: codec missing"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
