use std::time::Duration;

use addoncomm_frame::{
    FrameConfig, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE, MIN_FRAME_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Default throttle refill rate in bytes per second.
pub const DEFAULT_RATE: f64 = 2000.0;
/// Default throttle capacity in bytes.
pub const DEFAULT_BURST_CAPACITY: f64 = 4000.0;
/// Default cost multiplier for bulk-priority frames.
pub const DEFAULT_BULK_MULTIPLIER: f64 = 4.0;

/// Tunables for a [`Dispatcher`](crate::Dispatcher).
///
/// Every field has a default, so a JSON document only needs the values it
/// changes:
///
/// ```json
/// { "rate": 800, "reassembly_timeout_secs": 30 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Largest encoded frame the channel accepts, header included.
    pub max_frame_size: usize,
    /// Throttle refill rate in bytes per second.
    pub rate: f64,
    /// Throttle capacity in bytes.
    pub burst_capacity: f64,
    /// Cost multiplier applied to bulk frames.
    pub bulk_multiplier: f64,
    /// Largest payload a reassembly entry may buffer.
    pub max_message_size: usize,
    /// Age after which an open reassembly is dropped during `tick`.
    /// `None` keeps partial messages until a new `First` replaces them.
    pub reassembly_timeout_secs: Option<f64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            rate: DEFAULT_RATE,
            burst_capacity: DEFAULT_BURST_CAPACITY,
            bulk_multiplier: DEFAULT_BULK_MULTIPLIER,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reassembly_timeout_secs: None,
        }
    }
}

impl TransportConfig {
    /// Parse a JSON document and validate the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size < MIN_FRAME_SIZE {
            return Err(DispatchError::InvalidConfig(format!(
                "max_frame_size {} is below the minimum of {MIN_FRAME_SIZE}",
                self.max_frame_size
            )));
        }
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(DispatchError::InvalidConfig(format!(
                "rate must be a positive number, got {}",
                self.rate
            )));
        }
        if !(self.burst_capacity.is_finite() && self.burst_capacity > 0.0) {
            return Err(DispatchError::InvalidConfig(format!(
                "burst_capacity must be a positive number, got {}",
                self.burst_capacity
            )));
        }
        if !(self.bulk_multiplier.is_finite() && self.bulk_multiplier >= 1.0) {
            return Err(DispatchError::InvalidConfig(format!(
                "bulk_multiplier must be at least 1, got {}",
                self.bulk_multiplier
            )));
        }
        if self.max_message_size == 0 {
            return Err(DispatchError::InvalidConfig(
                "max_message_size must be non-zero".to_string(),
            ));
        }
        if let Some(secs) = self.reassembly_timeout_secs {
            if !(secs.is_finite() && secs >= 0.0) {
                return Err(DispatchError::InvalidConfig(format!(
                    "reassembly_timeout_secs must be a non-negative number, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Reassembly timeout as a [`Duration`], if configured.
    pub fn reassembly_timeout(&self) -> Option<Duration> {
        self.reassembly_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Frame-layer view of this configuration.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            max_message_size: self.max_message_size,
        }
    }
}
