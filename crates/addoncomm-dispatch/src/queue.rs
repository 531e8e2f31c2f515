use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use addoncomm_channel::TransmitError;
use addoncomm_frame::{ControlKind, MessageId, WireFrame};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::destination::Destination;
use crate::throttle::Throttle;

/// Send priority. Drain order is `Alert`, then `Normal`, then `Bulk`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Alert,
    #[default]
    Normal,
    Bulk,
}

impl Priority {
    /// All priorities in drain order.
    pub const ALL: [Priority; 3] = [Priority::Alert, Priority::Normal, Priority::Bulk];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Alert => "alert",
            Priority::Normal => "normal",
            Priority::Bulk => "bulk",
        }
    }

    fn index(self) -> usize {
        match self {
            Priority::Alert => 0,
            Priority::Normal => 1,
            Priority::Bulk => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a priority name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority '{0}' (expected alert, normal or bulk)")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

/// Progress reported after each frame of a message leaves the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryProgress {
    pub prefix: Rc<str>,
    /// Zero-based index of the frame just sent.
    pub frame_index: usize,
    pub frame_count: usize,
    /// Payload bytes sent so far, headers excluded.
    pub bytes_through: usize,
    pub total_bytes: usize,
}

impl DeliveryProgress {
    /// Whether this was the last frame of the message.
    pub fn is_complete(&self) -> bool {
        self.frame_index + 1 == self.frame_count
    }
}

/// Callback invoked once per transmitted frame of a message.
///
/// Cloning shares the callback, so every frame of a message reports to the
/// same closure.
#[derive(Clone)]
pub struct DeliveryHook(Rc<RefCell<dyn FnMut(&DeliveryProgress)>>);

impl DeliveryHook {
    pub fn new(callback: impl FnMut(&DeliveryProgress) + 'static) -> Self {
        Self(Rc::new(RefCell::new(callback)))
    }

    /// Run the callback. A panic inside it is logged and swallowed, and a
    /// reentrant call is skipped.
    pub(crate) fn notify(&self, progress: &DeliveryProgress) {
        let Ok(mut callback) = self.0.try_borrow_mut() else {
            warn!(prefix = %progress.prefix, "delivery callback is already running, skipped");
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| (*callback)(progress))).is_err() {
            warn!(
                prefix = %progress.prefix,
                frame = progress.frame_index,
                "delivery callback panicked"
            );
        }
    }
}

impl fmt::Debug for DeliveryHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeliveryHook(..)")
    }
}

/// One encoded frame waiting for budget.
#[derive(Debug, Clone)]
pub struct OutboundItem {
    destination: Destination,
    priority: Priority,
    wire: Bytes,
    kind: ControlKind,
    message_id: Option<MessageId>,
    progress: DeliveryProgress,
    on_delivered: Option<DeliveryHook>,
}

impl OutboundItem {
    /// Encode `frame` for sending. Progress describes a one-frame message
    /// until [`with_progress`](Self::with_progress) says otherwise.
    pub fn new(
        prefix: impl Into<Rc<str>>,
        destination: Destination,
        priority: Priority,
        frame: &WireFrame,
    ) -> Self {
        let chunk_len = frame.chunk().len();
        Self {
            destination,
            priority,
            wire: frame.encode(),
            kind: frame.kind(),
            message_id: frame.message_id(),
            progress: DeliveryProgress {
                prefix: prefix.into(),
                frame_index: 0,
                frame_count: 1,
                bytes_through: chunk_len,
                total_bytes: chunk_len,
            },
            on_delivered: None,
        }
    }

    /// Position of this frame within its message.
    pub fn with_progress(
        mut self,
        frame_index: usize,
        frame_count: usize,
        bytes_through: usize,
        total_bytes: usize,
    ) -> Self {
        self.progress.frame_index = frame_index;
        self.progress.frame_count = frame_count;
        self.progress.bytes_through = bytes_through;
        self.progress.total_bytes = total_bytes;
        self
    }

    pub fn on_delivered(mut self, hook: DeliveryHook) -> Self {
        self.on_delivered = Some(hook);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.progress.prefix
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    fn is_stream(&self, prefix: &str, destination: &Destination) -> bool {
        self.prefix() == prefix && self.destination == *destination
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Encoded frame, header included.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Encoded length; this is what the throttle charges for.
    pub fn len(&self) -> usize {
        self.wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    pub fn progress(&self) -> &DeliveryProgress {
        &self.progress
    }

    fn delivered(&self) {
        if let Some(hook) = &self.on_delivered {
            hook.notify(&self.progress);
        }
    }
}

/// Outcome of one [`SendQueue::drain_tick`] call.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Frames handed to the channel.
    pub sent: usize,
    /// Encoded bytes handed to the channel.
    pub bytes_sent: usize,
    /// Frames still queued afterwards.
    pub remaining: usize,
    /// Frames the channel refused this tick. They stay queued.
    pub failures: usize,
    /// The first refusal of the tick.
    pub error: Option<TransmitError>,
}

/// Pending outbound frames, one FIFO per priority.
#[derive(Debug, Default)]
pub struct SendQueue {
    buckets: [VecDeque<OutboundItem>; 3],
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item behind everything already queued at its priority.
    pub fn enqueue(&mut self, item: OutboundItem) {
        self.buckets[item.priority.index()].push_back(item);
    }

    /// Send as much as the budget allows.
    ///
    /// Items go out in priority order, FIFO within a priority. The first item
    /// that costs more than the remaining budget ends the tick, unless it
    /// would be the first item sent this tick: that one is always attempted,
    /// so an item larger than the whole bucket still gets out.
    ///
    /// A transmit failure leaves the failed item in place without charging
    /// for it and blocks its `(prefix, destination)` stream for the rest of
    /// the tick, so later frames of that stream cannot overtake it. Every
    /// other stream keeps draining.
    pub fn drain_tick<F>(
        &mut self,
        throttle: &mut Throttle,
        now: Duration,
        mut transmit: F,
    ) -> TickReport
    where
        F: FnMut(&OutboundItem) -> Result<(), TransmitError>,
    {
        let mut report = TickReport::default();
        let mut blocked: Vec<(Rc<str>, Destination)> = Vec::new();

        'drain: for priority in Priority::ALL {
            let bucket = &mut self.buckets[priority.index()];
            let mut index = 0;
            while let Some(item) = bucket.get(index) {
                if blocked
                    .iter()
                    .any(|(prefix, destination)| item.is_stream(prefix, destination))
                {
                    index += 1;
                    continue;
                }

                let cost = throttle.cost(priority, item.len());
                let available = throttle.available(now);
                if report.sent > 0 && cost > available {
                    trace!(cost, available, %priority, "budget exhausted");
                    break 'drain;
                }

                if let Err(err) = transmit(item) {
                    warn!(
                        prefix = item.prefix(),
                        destination = %item.destination,
                        error = %err,
                        "transmit failed, frame kept for retry"
                    );
                    blocked.push((Rc::clone(&item.progress.prefix), item.destination.clone()));
                    report.failures += 1;
                    report.error.get_or_insert(err);
                    index += 1;
                    continue;
                }

                throttle.consume(cost);
                report.sent += 1;
                report.bytes_sent += item.len();
                if let Some(item) = bucket.remove(index) {
                    item.delivered();
                }
            }
        }

        report.remaining = self.len();
        report
    }

    /// Drop everything queued. Returns the number of items dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        dropped
    }

    /// Drop every queued item for `prefix`. Returns the number dropped.
    pub fn clear_for_prefix(&mut self, prefix: &str) -> usize {
        let before = self.len();
        for bucket in &mut self.buckets {
            bucket.retain(|item| item.prefix() != prefix);
        }
        before - self.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Items queued at one priority.
    pub fn len_for(&self, priority: Priority) -> usize {
        self.buckets[priority.index()].len()
    }
}
