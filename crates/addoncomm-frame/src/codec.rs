use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Default maximum encoded frame size, the host channel's hard limit.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 255;

/// Default cap on a reassembled message: 1 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// `Single` header: control byte only.
pub const SINGLE_HEADER_SIZE: usize = 1;

/// Multi-part header: control byte + 4 hex digits of message id.
pub const MULTIPART_HEADER_SIZE: usize = 5;

/// Smallest usable frame size: a multi-part header plus one content byte.
pub const MIN_FRAME_SIZE: usize = MULTIPART_HEADER_SIZE + 1;

/// Control byte sentinels.
pub mod control {
    pub const FIRST: u8 = 0x01;
    pub const MIDDLE: u8 = 0x02;
    pub const LAST: u8 = 0x03;
    pub const SINGLE: u8 = 0x04;
}

/// Identifier shared by every part of one multi-part message.
pub type MessageId = u16;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// What a frame carries, identified by its control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// A complete message in one frame.
    Single,
    /// First part of a multi-part message.
    First,
    /// Any part between the first and the last.
    Middle,
    /// Final part; completes the message.
    Last,
}

impl ControlKind {
    /// Wire sentinel for this kind.
    pub fn control_byte(self) -> u8 {
        match self {
            ControlKind::Single => control::SINGLE,
            ControlKind::First => control::FIRST,
            ControlKind::Middle => control::MIDDLE,
            ControlKind::Last => control::LAST,
        }
    }

    /// Map a wire sentinel back to its kind.
    pub fn from_control_byte(byte: u8) -> Option<Self> {
        match byte {
            control::SINGLE => Some(ControlKind::Single),
            control::FIRST => Some(ControlKind::First),
            control::MIDDLE => Some(ControlKind::Middle),
            control::LAST => Some(ControlKind::Last),
            _ => None,
        }
    }

    /// Encoded header length for this kind.
    pub fn header_size(self) -> usize {
        if self.is_multipart() {
            MULTIPART_HEADER_SIZE
        } else {
            SINGLE_HEADER_SIZE
        }
    }

    /// Returns true for `First`, `Middle` and `Last`.
    pub fn is_multipart(self) -> bool {
        !matches!(self, ControlKind::Single)
    }

    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlKind::Single => "SINGLE",
            ControlKind::First => "FIRST",
            ControlKind::Middle => "MIDDLE",
            ControlKind::Last => "LAST",
        }
    }
}

/// One unit placed on the channel.
///
/// `Single` frames never carry a message id; multi-part frames always do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    kind: ControlKind,
    message_id: Option<MessageId>,
    chunk: Bytes,
}

impl WireFrame {
    /// A complete message in one frame.
    pub fn single(chunk: impl Into<Bytes>) -> Self {
        Self {
            kind: ControlKind::Single,
            message_id: None,
            chunk: chunk.into(),
        }
    }

    /// First part of message `id`.
    pub fn first(id: MessageId, chunk: impl Into<Bytes>) -> Self {
        Self::part(ControlKind::First, id, chunk.into())
    }

    /// Intermediate part of message `id`.
    pub fn middle(id: MessageId, chunk: impl Into<Bytes>) -> Self {
        Self::part(ControlKind::Middle, id, chunk.into())
    }

    /// Final part of message `id`.
    pub fn last(id: MessageId, chunk: impl Into<Bytes>) -> Self {
        Self::part(ControlKind::Last, id, chunk.into())
    }

    fn part(kind: ControlKind, id: MessageId, chunk: Bytes) -> Self {
        debug_assert!(kind.is_multipart());
        Self {
            kind,
            message_id: Some(id),
            chunk,
        }
    }

    /// Frame kind.
    #[inline]
    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    /// Message id, `None` for `Single`.
    #[inline]
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    /// Content carried after the header.
    #[inline]
    pub fn chunk(&self) -> &Bytes {
        &self.chunk
    }

    /// Split into kind, id and content.
    pub fn into_parts(self) -> (ControlKind, Option<MessageId>, Bytes) {
        (self.kind, self.message_id, self.chunk)
    }

    /// Total encoded size (header + content).
    pub fn encoded_len(&self) -> usize {
        self.kind.header_size() + self.chunk.len()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut dst);
        dst.freeze()
    }

    /// Append the encoded frame to `dst`.
    ///
    /// Wire format:
    /// ```text
    /// Single:      ┌──────┬────────────────────┐
    ///              │ 0x04 │ payload            │
    ///              └──────┴────────────────────┘
    /// First/Middle/Last:
    ///              ┌──────┬──────────────┬─────────────┐
    ///              │ 0x01 │ id: 4 hex    │ chunk       │
    ///              │ 0x02 │ ASCII digits │             │
    ///              │ 0x03 │ e.g. "00A7"  │             │
    ///              └──────┴──────────────┴─────────────┘
    /// ```
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u8(self.kind.control_byte());
        if let Some(id) = self.message_id {
            dst.put_slice(&encode_message_id(id));
        }
        dst.put_slice(&self.chunk);
    }
}

/// Render a message id as 4 upper-case hex digits.
pub fn encode_message_id(id: MessageId) -> [u8; 4] {
    [
        HEX_DIGITS[usize::from(id >> 12)],
        HEX_DIGITS[usize::from((id >> 8) & 0xF)],
        HEX_DIGITS[usize::from((id >> 4) & 0xF)],
        HEX_DIGITS[usize::from(id & 0xF)],
    ]
}

fn decode_message_id(digits: &[u8]) -> Option<MessageId> {
    digits.iter().try_fold(0u16, |acc, &digit| {
        let value = char::from(digit).to_digit(16)?;
        Some((acc << 4) | value as u16)
    })
}

/// Parse one inbound frame.
///
/// The content is a zero-copy slice of `raw`.
pub fn parse_frame(raw: Bytes) -> Result<WireFrame> {
    let Some(&control_byte) = raw.first() else {
        return Err(FrameError::MalformedFrame {
            reason: "empty frame",
            len: 0,
        });
    };

    let kind = ControlKind::from_control_byte(control_byte).ok_or(FrameError::MalformedFrame {
        reason: "unknown control byte",
        len: raw.len(),
    })?;

    if raw.len() < kind.header_size() {
        return Err(FrameError::MalformedFrame {
            reason: "shorter than header",
            len: raw.len(),
        });
    }

    if !kind.is_multipart() {
        return Ok(WireFrame::single(raw.slice(SINGLE_HEADER_SIZE..)));
    }

    let id = decode_message_id(&raw[1..MULTIPART_HEADER_SIZE]).ok_or(
        FrameError::MalformedFrame {
            reason: "message id is not hex",
            len: raw.len(),
        },
    )?;

    Ok(WireFrame::part(
        kind,
        id,
        raw.slice(MULTIPART_HEADER_SIZE..),
    ))
}

/// Configuration for splitting and reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum encoded frame size in bytes. Default: 255.
    pub max_frame_size: usize,
    /// Maximum reassembled message size in bytes. Default: 1 MiB.
    pub max_message_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
