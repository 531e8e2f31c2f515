//! Multi-part message reassembly.
//!
//! One pending entry exists per `(sender, prefix)`. The channel neither
//! orders nor guarantees frames, so a part that does not continue the open
//! message is not an error: the entry is reset and the part discarded.

use std::collections::HashMap;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::{ControlKind, FrameConfig, MessageId, WireFrame};

/// Outcome of feeding one frame to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// A whole message is available.
    Complete(Bytes),
    /// The frame was buffered; more parts are expected.
    Pending,
    /// The frame could not be used.
    Discarded(DiscardReason),
}

/// Why a frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A `Middle`/`Last` part with no matching open message.
    Orphaned,
    /// The message grew past the configured maximum size.
    TooLarge,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReassemblyKey {
    sender: String,
    prefix: String,
}

#[derive(Debug)]
struct PendingReassembly {
    expected_id: MessageId,
    chunks: Vec<Bytes>,
    buffered: usize,
    open: bool,
    last_touched: Duration,
}

impl PendingReassembly {
    fn open(id: MessageId, chunk: Bytes, now: Duration) -> Self {
        Self {
            expected_id: id,
            buffered: chunk.len(),
            chunks: vec![chunk],
            open: true,
            last_touched: now,
        }
    }

    fn closed(id: MessageId, now: Duration) -> Self {
        Self {
            expected_id: id,
            chunks: Vec::new(),
            buffered: 0,
            open: false,
            last_touched: now,
        }
    }

    fn continues(&self, id: MessageId) -> bool {
        self.open && self.expected_id == id
    }

    fn concat(self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.buffered);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }
}

/// Per-(sender, prefix) reassembly state.
#[derive(Debug)]
pub struct ReassemblyTable {
    pending: HashMap<ReassemblyKey, PendingReassembly>,
    max_message_size: usize,
}

impl ReassemblyTable {
    /// Create a table with the default message size cap.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a table using `config.max_message_size` as the size cap.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            pending: HashMap::new(),
            max_message_size: config.max_message_size,
        }
    }

    /// Feed one parsed frame received from `sender` on `prefix` at time `now`.
    pub fn accept(
        &mut self,
        sender: &str,
        prefix: &str,
        frame: WireFrame,
        now: Duration,
    ) -> Assembly {
        let (kind, id, chunk) = frame.into_parts();
        let id = match (kind, id) {
            (ControlKind::Single, _) | (_, None) => return Assembly::Complete(chunk),
            (_, Some(id)) => id,
        };

        let key = ReassemblyKey {
            sender: sender.to_string(),
            prefix: prefix.to_string(),
        };

        if kind == ControlKind::First {
            if chunk.len() > self.max_message_size {
                self.pending.remove(&key);
                return Assembly::Discarded(DiscardReason::TooLarge);
            }
            if let Some(previous) = self.pending.get(&key).filter(|p| p.open) {
                debug!(
                    sender,
                    prefix,
                    dropped = previous.expected_id,
                    replaced_by = id,
                    "incomplete message replaced"
                );
            }
            self.pending.insert(key, PendingReassembly::open(id, chunk, now));
            return Assembly::Pending;
        }

        let mut entry = match self.pending.remove(&key) {
            Some(entry) if entry.continues(id) => entry,
            _ => {
                trace!(sender, prefix, id, kind = kind.as_str(), "orphaned part");
                self.pending.insert(key, PendingReassembly::closed(id, now));
                return Assembly::Discarded(DiscardReason::Orphaned);
            }
        };

        if entry.buffered + chunk.len() > self.max_message_size {
            debug!(
                sender,
                prefix,
                id,
                limit = self.max_message_size,
                "message exceeds size limit"
            );
            return Assembly::Discarded(DiscardReason::TooLarge);
        }

        entry.buffered += chunk.len();
        entry.chunks.push(chunk);
        entry.last_touched = now;

        if kind == ControlKind::Last {
            trace!(sender, prefix, id, len = entry.buffered, "message complete");
            return Assembly::Complete(entry.concat());
        }

        self.pending.insert(key, entry);
        Assembly::Pending
    }

    /// Drop all pending state.
    pub fn clear_all(&mut self) {
        self.pending.clear();
    }

    /// Drop entries untouched for longer than `max_age`. Returns the number evicted.
    pub fn clear_stale(&mut self, max_age: Duration, now: Duration) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, entry| now.saturating_sub(entry.last_touched) <= max_age);
        let evicted = before - self.pending.len();
        if evicted > 0 {
            debug!(evicted, "evicted stale reassembly entries");
        }
        evicted
    }

    /// Returns true if `sender` has a message in progress on `prefix`.
    pub fn is_open(&self, sender: &str, prefix: &str) -> bool {
        let key = ReassemblyKey {
            sender: sender.to_string(),
            prefix: prefix.to_string(),
        };
        self.pending.get(&key).is_some_and(|entry| entry.open)
    }

    /// Number of tracked entries, open or reset.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for ReassemblyTable {
    fn default() -> Self {
        Self::new()
    }
}
