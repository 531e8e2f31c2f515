/// Errors reported by a channel transport when a frame cannot be placed on the wire.
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    /// The encoded frame exceeds what the channel accepts.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The channel refused the frame (e.g. recipient offline, channel muted).
    #[error("channel rejected frame: {0}")]
    Rejected(String),

    /// The channel is temporarily unable to send.
    #[error("channel unavailable")]
    Unavailable,

    /// An I/O error occurred in the underlying channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransmitError>;
