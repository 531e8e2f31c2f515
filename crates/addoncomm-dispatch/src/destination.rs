use std::fmt;

use addoncomm_channel::Distribution;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Where an outbound message goes: a distribution plus an optional target.
///
/// `WHISPER` needs a player name and `CHANNEL` a channel name; every other
/// distribution addresses a group and ignores the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub distribution: Distribution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Destination {
    /// Address a group distribution.
    pub fn to(distribution: Distribution) -> Self {
        Self {
            distribution,
            target: None,
        }
    }

    /// Address one player.
    pub fn whisper(target: impl Into<String>) -> Self {
        Self::with_target(Distribution::Whisper, target)
    }

    /// Address a named chat channel.
    pub fn channel(name: impl Into<String>) -> Self {
        Self::with_target(Distribution::Channel, name)
    }

    pub fn with_target(distribution: Distribution, target: impl Into<String>) -> Self {
        Self {
            distribution,
            target: Some(target.into()),
        }
    }

    /// Parse a distribution name (any case) and attach `target`.
    pub fn parse(distribution: &str, target: Option<&str>) -> Result<Self> {
        let distribution: Distribution = distribution.parse()?;
        let destination = Self {
            distribution,
            target: target.map(str::to_string),
        };
        destination.validate()?;
        Ok(destination)
    }

    /// Reject directed distributions without a usable target.
    pub fn validate(&self) -> Result<()> {
        if !self.distribution.requires_target() {
            return Ok(());
        }
        match self.target.as_deref().map(str::trim) {
            Some(target) if !target.is_empty() => Ok(()),
            _ => Err(DispatchError::MissingTarget(self.distribution)),
        }
    }

    /// Target handed to the channel. Group distributions never carry one.
    pub fn channel_target(&self) -> Option<&str> {
        if self.distribution.requires_target() {
            self.target.as_deref()
        } else {
            None
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel_target() {
            Some(target) => write!(f, "{}:{target}", self.distribution),
            None => write!(f, "{}", self.distribution),
        }
    }
}

impl From<Distribution> for Destination {
    fn from(distribution: Distribution) -> Self {
        Self::to(distribution)
    }
}
