use addoncomm_channel::Distribution;

/// Errors that can occur in dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The prefix is empty or too long.
    #[error("invalid prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    /// Another handler already owns the prefix.
    #[error("prefix '{0}' already registered")]
    AlreadyRegistered(String),

    /// The distribution name is not recognized.
    #[error(transparent)]
    UnknownDistribution(#[from] addoncomm_channel::UnknownDistribution),

    /// The distribution addresses one recipient but none was given.
    #[error("distribution {0} requires a target")]
    MissingTarget(Distribution),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] addoncomm_frame::FrameError),

    /// Channel-level error.
    #[error("transmit error: {0}")]
    Transmit(#[from] addoncomm_channel::TransmitError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
