use bytes::Bytes;
use tracing::trace;

use crate::codec::{
    MessageId, WireFrame, MIN_FRAME_SIZE, MULTIPART_HEADER_SIZE, SINGLE_HEADER_SIZE,
};
use crate::error::{FrameError, Result};

/// Content bytes carried by each multi-part frame at `max_frame_size`.
pub fn chunk_size(max_frame_size: usize) -> usize {
    max_frame_size.saturating_sub(MULTIPART_HEADER_SIZE)
}

/// Split `payload` using an explicit message id.
///
/// A payload that fits after the single-frame header becomes one `Single`
/// frame (and `id` is unused). Anything larger becomes `First`, zero or more
/// `Middle`, and `Last`, each at most `max_frame_size` bytes encoded.
pub fn split_with_id(
    payload: impl Into<Bytes>,
    max_frame_size: usize,
    id: MessageId,
) -> Result<Vec<WireFrame>> {
    validate_max_frame_size(max_frame_size)?;
    Ok(split_unchecked(payload.into(), max_frame_size, id))
}

fn validate_max_frame_size(max_frame_size: usize) -> Result<()> {
    if max_frame_size < MIN_FRAME_SIZE {
        return Err(FrameError::InvalidFrameSize {
            size: max_frame_size,
            min: MIN_FRAME_SIZE,
        });
    }
    Ok(())
}

fn split_unchecked(payload: Bytes, max_frame_size: usize, id: MessageId) -> Vec<WireFrame> {
    if payload.len() + SINGLE_HEADER_SIZE <= max_frame_size {
        return vec![WireFrame::single(payload)];
    }

    let chunk = chunk_size(max_frame_size);
    let count = payload.len().div_ceil(chunk);
    let mut frames = Vec::with_capacity(count);

    for index in 0..count {
        let start = index * chunk;
        let end = (start + chunk).min(payload.len());
        let part = payload.slice(start..end);
        let frame = match index {
            0 => WireFrame::first(id, part),
            i if i + 1 == count => WireFrame::last(id, part),
            _ => WireFrame::middle(id, part),
        };
        frames.push(frame);
    }

    frames
}

/// Splits outbound payloads and hands out message ids.
///
/// Ids cycle through `1..=65535`; zero is never issued.
#[derive(Debug, Clone)]
pub struct Splitter {
    max_frame_size: usize,
    next_id: MessageId,
}

impl Splitter {
    /// Create a splitter for frames of at most `max_frame_size` encoded bytes.
    pub fn new(max_frame_size: usize) -> Result<Self> {
        Self::with_first_id(max_frame_size, 1)
    }

    /// Create a splitter whose first multi-part message uses `first_id`.
    ///
    /// A `first_id` of zero is moved to one.
    pub fn with_first_id(max_frame_size: usize, first_id: MessageId) -> Result<Self> {
        validate_max_frame_size(max_frame_size)?;
        Ok(Self {
            max_frame_size,
            next_id: first_id.max(1),
        })
    }

    /// Split a payload into frames, taking a fresh id only when more than one
    /// frame is needed.
    pub fn split(&mut self, payload: impl Into<Bytes>) -> Vec<WireFrame> {
        let payload = payload.into();
        if payload.len() + SINGLE_HEADER_SIZE <= self.max_frame_size {
            return vec![WireFrame::single(payload)];
        }

        let id = self.next_message_id();
        let frames = split_unchecked(payload, self.max_frame_size, id);
        trace!(id, frames = frames.len(), "split multi-part message");
        frames
    }

    /// Reserve the next message id.
    pub fn next_message_id(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id = match id {
            MessageId::MAX => 1,
            n => n + 1,
        };
        id
    }

    /// Configured maximum encoded frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Content bytes per multi-part frame.
    pub fn chunk_size(&self) -> usize {
        chunk_size(self.max_frame_size)
    }
}
