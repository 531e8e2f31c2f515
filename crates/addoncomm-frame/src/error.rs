/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The inbound buffer is not a valid frame.
    #[error("malformed frame ({len} bytes): {reason}")]
    MalformedFrame { reason: &'static str, len: usize },

    /// The configured frame size cannot hold a multi-part header plus content.
    #[error("invalid max frame size {size} (min {min})")]
    InvalidFrameSize { size: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
