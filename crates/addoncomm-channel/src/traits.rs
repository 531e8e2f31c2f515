use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Logical destination class for a frame.
///
/// Group distributions reach every member of the group; `Whisper` and
/// `Channel` address one named recipient and need a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Distribution {
    Party,
    Raid,
    Guild,
    Officer,
    Battleground,
    InstanceChat,
    Whisper,
    Channel,
}

impl Distribution {
    /// All distributions, in wire-name order.
    pub const ALL: [Distribution; 8] = [
        Distribution::Party,
        Distribution::Raid,
        Distribution::Guild,
        Distribution::Officer,
        Distribution::Battleground,
        Distribution::InstanceChat,
        Distribution::Whisper,
        Distribution::Channel,
    ];

    /// Canonical upper-case name used by the host channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Distribution::Party => "PARTY",
            Distribution::Raid => "RAID",
            Distribution::Guild => "GUILD",
            Distribution::Officer => "OFFICER",
            Distribution::Battleground => "BATTLEGROUND",
            Distribution::InstanceChat => "INSTANCE_CHAT",
            Distribution::Whisper => "WHISPER",
            Distribution::Channel => "CHANNEL",
        }
    }

    /// Returns true if sends on this distribution must name a recipient.
    pub fn requires_target(self) -> bool {
        matches!(self, Distribution::Whisper | Distribution::Channel)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a distribution name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown distribution '{0}'")]
pub struct UnknownDistribution(pub String);

impl FromStr for Distribution {
    type Err = UnknownDistribution;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Distribution::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownDistribution(s.to_string()))
    }
}

/// A frame delivered by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Prefix the frame was addressed to.
    pub prefix: String,
    /// Raw frame bytes, control byte included.
    pub payload: Bytes,
    /// Distribution the frame arrived on.
    pub distribution: Distribution,
    /// Name of the sending peer.
    pub sender: String,
}

impl InboundFrame {
    /// Create a new inbound frame.
    pub fn new(
        prefix: impl Into<String>,
        payload: impl Into<Bytes>,
        distribution: Distribution,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            payload: payload.into(),
            distribution,
            sender: sender.into(),
        }
    }
}

/// Outbound side of the host channel.
///
/// Implementations send exactly one bounded-size frame per call and either
/// succeed or fail synchronously. Retrying is the caller's job.
pub trait ChannelTransport {
    /// Place one encoded frame on the channel.
    fn transmit_frame(
        &mut self,
        prefix: &str,
        frame: &[u8],
        distribution: Distribution,
        target: Option<&str>,
    ) -> Result<()>;
}

impl<T: ChannelTransport + ?Sized> ChannelTransport for &mut T {
    fn transmit_frame(
        &mut self,
        prefix: &str,
        frame: &[u8],
        distribution: Distribution,
        target: Option<&str>,
    ) -> Result<()> {
        (**self).transmit_frame(prefix, frame, distribution, target)
    }
}

impl<T: ChannelTransport + ?Sized> ChannelTransport for Box<T> {
    fn transmit_frame(
        &mut self,
        prefix: &str,
        frame: &[u8],
        distribution: Distribution,
        target: Option<&str>,
    ) -> Result<()> {
        (**self).transmit_frame(prefix, frame, distribution, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("guild".parse::<Distribution>().unwrap(), Distribution::Guild);
        assert_eq!(
            "Instance_Chat".parse::<Distribution>().unwrap(),
            Distribution::InstanceChat
        );
        assert_eq!(
            " WHISPER ".parse::<Distribution>().unwrap(),
            Distribution::Whisper
        );
    }

    #[test]
    fn rejects_unknown_name() {
        let err = "SHOUT".parse::<Distribution>().unwrap_err();
        assert_eq!(err, UnknownDistribution("SHOUT".to_string()));
    }

    #[test]
    fn display_matches_wire_name() {
        for distribution in Distribution::ALL {
            assert_eq!(distribution.to_string(), distribution.as_str());
            assert_eq!(
                distribution.as_str().parse::<Distribution>().unwrap(),
                distribution
            );
        }
    }

    #[test]
    fn only_directed_distributions_need_target() {
        let directed: Vec<_> = Distribution::ALL
            .into_iter()
            .filter(|d| d.requires_target())
            .collect();
        assert_eq!(directed, vec![Distribution::Whisper, Distribution::Channel]);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Distribution::InstanceChat).unwrap();
        assert_eq!(json, "\"INSTANCE_CHAT\"");
        let back: Distribution = serde_json::from_str("\"RAID\"").unwrap();
        assert_eq!(back, Distribution::Raid);
    }
}
