use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::{Result, TransmitError};
use crate::traits::{ChannelTransport, Distribution, InboundFrame};

/// A frame captured by [`LoopbackChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmittedFrame {
    pub prefix: String,
    pub payload: Bytes,
    pub distribution: Distribution,
    pub target: Option<String>,
}

impl TransmittedFrame {
    /// Turn the captured frame into the event a receiving peer would see.
    pub fn into_inbound(self, sender: impl Into<String>) -> InboundFrame {
        InboundFrame {
            prefix: self.prefix,
            payload: self.payload,
            distribution: self.distribution,
            sender: sender.into(),
        }
    }
}

#[derive(Debug)]
struct LoopbackState {
    frames: VecDeque<TransmittedFrame>,
    max_frame_size: usize,
    fail_remaining: usize,
    attempts: usize,
}

/// In-memory channel that records every transmitted frame.
///
/// Clones share the same buffer: hand one clone to the sender and keep
/// another to drain what was "put on the wire".
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    state: Rc<RefCell<LoopbackState>>,
}

impl LoopbackChannel {
    /// Frame size limit enforced by default (the host channel's hard limit).
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 255;

    /// Create a channel enforcing [`Self::DEFAULT_MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_frame_size(Self::DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a channel enforcing an explicit frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopbackState {
                frames: VecDeque::new(),
                max_frame_size,
                fail_remaining: 0,
                attempts: 0,
            })),
        }
    }

    /// Make the next `count` transmissions fail with [`TransmitError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.state.borrow_mut().fail_remaining = count;
    }

    /// Remove and return every captured frame, oldest first.
    pub fn take_frames(&self) -> Vec<TransmittedFrame> {
        self.state.borrow_mut().frames.drain(..).collect()
    }

    /// Copy of the captured frames, oldest first.
    pub fn frames(&self) -> Vec<TransmittedFrame> {
        self.state.borrow().frames.iter().cloned().collect()
    }

    /// Number of captured frames not yet taken.
    pub fn len(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Returns true if no frames are waiting.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().frames.is_empty()
    }

    /// Total transmit calls observed, failed ones included.
    pub fn attempts(&self) -> usize {
        self.state.borrow().attempts
    }

    /// Frame size limit currently enforced.
    pub fn max_frame_size(&self) -> usize {
        self.state.borrow().max_frame_size
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport for LoopbackChannel {
    fn transmit_frame(
        &mut self,
        prefix: &str,
        frame: &[u8],
        distribution: Distribution,
        target: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.attempts += 1;

        if state.fail_remaining > 0 {
            state.fail_remaining -= 1;
            debug!(prefix, remaining = state.fail_remaining, "loopback injected failure");
            return Err(TransmitError::Unavailable);
        }

        if frame.len() > state.max_frame_size {
            return Err(TransmitError::FrameTooLarge {
                size: frame.len(),
                max: state.max_frame_size,
            });
        }

        trace!(prefix, len = frame.len(), %distribution, "loopback transmit");
        state.frames.push_back(TransmittedFrame {
            prefix: prefix.to_string(),
            payload: Bytes::copy_from_slice(frame),
            distribution,
            target: target.map(str::to_string),
        });
        Ok(())
    }
}
