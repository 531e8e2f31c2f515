use std::rc::Rc;
use std::time::Duration;

use addoncomm_channel::{ChannelTransport, Clock, Distribution, InboundFrame, MonotonicClock};
use addoncomm_frame::{parse_frame, Assembly, DiscardReason, ReassemblyTable, Splitter};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::config::TransportConfig;
use crate::destination::Destination;
use crate::error::Result;
use crate::queue::{
    DeliveryHook, DeliveryProgress, OutboundItem, Priority, SendQueue, TickReport,
};
use crate::registry::{
    invoke, validate_prefix, HandlerRef, HandlerResult, InboundMessage, PrefixRegistry,
};
use crate::throttle::Throttle;

/// An outbound message with its routing and delivery options.
#[derive(Debug, Clone)]
pub struct SendRequest {
    prefix: String,
    payload: Bytes,
    destination: Destination,
    priority: Priority,
    on_delivered: Option<DeliveryHook>,
}

impl SendRequest {
    /// A `Normal` priority message with no delivery callback.
    pub fn new(
        prefix: impl Into<String>,
        payload: impl Into<Bytes>,
        destination: impl Into<Destination>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            payload: payload.into(),
            destination: destination.into(),
            priority: Priority::Normal,
            on_delivered: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Call `callback` after each frame of the message is transmitted.
    pub fn on_delivered(mut self, callback: impl FnMut(&DeliveryProgress) + 'static) -> Self {
        self.on_delivered = Some(DeliveryHook::new(callback));
        self
    }
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A complete message reached its handler.
    Delivered,
    /// A part was buffered; the message is not complete yet.
    Buffered,
    /// The frame was well formed but its message was dropped.
    Discarded(DiscardReason),
    /// The frame could not be parsed.
    Malformed,
    /// A complete message reached a handler that failed or panicked.
    HandlerFailed,
    /// No handler is registered for the prefix.
    Ignored,
}

/// Running counters for one dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub messages_queued: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub transmit_failures: u64,
    pub frames_received: u64,
    pub messages_delivered: u64,
    pub frames_discarded: u64,
    pub frames_malformed: u64,
    pub frames_ignored: u64,
    pub handler_failures: u64,
    pub reassemblies_evicted: u64,
}

/// Ties the send and receive paths together over one channel.
///
/// Outbound messages are split into frames and queued by priority; each
/// [`tick`](Self::tick) releases as many as the throttle allows. Inbound
/// frames are reassembled per sender and prefix and complete messages go to
/// the handler registered for their prefix.
///
/// Everything runs on the caller's thread: handlers and delivery callbacks
/// are called synchronously from `handle_inbound` and `tick`.
pub struct Dispatcher<T: ChannelTransport, C: Clock = MonotonicClock> {
    transport: T,
    clock: C,
    config: TransportConfig,
    splitter: Splitter,
    throttle: Throttle,
    queue: SendQueue,
    registry: PrefixRegistry,
    reassembly: ReassemblyTable,
    stats: DispatchStats,
}

impl<T: ChannelTransport> Dispatcher<T, MonotonicClock> {
    /// Dispatcher with default settings and the process clock.
    pub fn with_defaults(transport: T) -> Result<Self> {
        Self::new(transport, MonotonicClock::new(), TransportConfig::default())
    }
}

impl<T: ChannelTransport, C: Clock> Dispatcher<T, C> {
    pub fn new(transport: T, clock: C, config: TransportConfig) -> Result<Self> {
        config.validate()?;
        let splitter = Splitter::new(config.max_frame_size)?;
        let throttle = Throttle::from_config(&config, clock.now());
        let reassembly = ReassemblyTable::with_config(&config.frame_config());
        Ok(Self {
            transport,
            clock,
            config,
            splitter,
            throttle,
            queue: SendQueue::new(),
            registry: PrefixRegistry::new(),
            reassembly,
            stats: DispatchStats::default(),
        })
    }

    /// Route complete messages for `prefix` to `handler`.
    pub fn register_prefix(&mut self, prefix: &str, handler: HandlerRef) -> Result<()> {
        self.registry.register(prefix, handler)
    }

    /// Register a closure-backed handler.
    pub fn register_fn<F>(&mut self, prefix: &str, handler: F) -> Result<()>
    where
        F: Fn(&InboundMessage) -> HandlerResult + 'static,
    {
        self.registry.register(prefix, Rc::new(handler))
    }

    /// Stop routing `prefix`. Returns whether it was registered.
    ///
    /// Queued outbound frames and partial inbound messages for the prefix
    /// are left alone.
    pub fn unregister_prefix(&mut self, prefix: &str) -> bool {
        self.registry.unregister(prefix)
    }

    pub fn is_registered(&self, prefix: &str) -> bool {
        self.registry.contains(prefix)
    }

    /// Queue `payload` at `Normal` priority.
    pub fn send(
        &mut self,
        prefix: &str,
        payload: impl Into<Bytes>,
        destination: impl Into<Destination>,
    ) -> Result<()> {
        self.send_with(SendRequest::new(prefix, payload, destination))
    }

    /// Split a message into frames and queue them.
    ///
    /// Nothing is transmitted here; frames leave on later ticks. The prefix
    /// does not have to be registered locally.
    pub fn send_with(&mut self, request: SendRequest) -> Result<()> {
        let SendRequest {
            prefix,
            payload,
            destination,
            priority,
            on_delivered,
        } = request;
        validate_prefix(&prefix)?;
        destination.validate()?;

        let total_bytes = payload.len();
        let frames = self.splitter.split(payload);
        let frame_count = frames.len();
        let shared_prefix: Rc<str> = Rc::from(prefix.as_str());

        let mut bytes_through = 0;
        for (index, frame) in frames.iter().enumerate() {
            bytes_through += frame.chunk().len();
            let mut item =
                OutboundItem::new(Rc::clone(&shared_prefix), destination.clone(), priority, frame)
                    .with_progress(index, frame_count, bytes_through, total_bytes);
            if let Some(hook) = &on_delivered {
                item = item.on_delivered(hook.clone());
            }
            self.queue.enqueue(item);
        }

        self.stats.messages_queued += 1;
        debug!(
            prefix = %prefix,
            %destination,
            %priority,
            bytes = total_bytes,
            frames = frame_count,
            "message queued"
        );
        Ok(())
    }

    /// Release queued frames within the current budget, then drop stale
    /// partial messages if a reassembly timeout is configured.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let transport = &mut self.transport;
        let report = self.queue.drain_tick(&mut self.throttle, now, |item| {
            let destination = item.destination();
            transport.transmit_frame(
                item.prefix(),
                item.wire(),
                destination.distribution,
                destination.channel_target(),
            )
        });

        self.stats.frames_sent += report.sent as u64;
        self.stats.bytes_sent += report.bytes_sent as u64;
        self.stats.transmit_failures += report.failures as u64;
        if report.sent > 0 {
            trace!(
                sent = report.sent,
                bytes = report.bytes_sent,
                remaining = report.remaining,
                "tick"
            );
        }

        if let Some(timeout) = self.config.reassembly_timeout() {
            let evicted = self.reassembly.clear_stale(timeout, now);
            if evicted > 0 {
                debug!(evicted, "stale reassemblies dropped");
                self.stats.reassemblies_evicted += evicted as u64;
            }
        }

        report
    }

    /// Feed one frame received from the channel.
    pub fn handle_inbound(&mut self, frame: InboundFrame) -> InboundOutcome {
        let InboundFrame {
            prefix,
            payload,
            distribution,
            sender,
        } = frame;
        self.stats.frames_received += 1;

        let Some(handler) = self.registry.get(&prefix) else {
            trace!(prefix = %prefix, "no handler for prefix");
            self.stats.frames_ignored += 1;
            return InboundOutcome::Ignored;
        };

        let raw_len = payload.len();
        let wire = match parse_frame(payload) {
            Ok(wire) => wire,
            Err(err) => {
                warn!(
                    prefix = %prefix,
                    sender = %sender,
                    len = raw_len,
                    error = %err,
                    "malformed frame"
                );
                self.stats.frames_malformed += 1;
                return InboundOutcome::Malformed;
            }
        };

        let payload = match self
            .reassembly
            .accept(&sender, &prefix, wire, self.clock.now())
        {
            Assembly::Complete(payload) => payload,
            Assembly::Pending => return InboundOutcome::Buffered,
            Assembly::Discarded(reason) => {
                debug!(prefix = %prefix, sender = %sender, ?reason, "frame discarded");
                self.stats.frames_discarded += 1;
                return InboundOutcome::Discarded(reason);
            }
        };

        let message = InboundMessage {
            prefix,
            payload,
            distribution,
            sender,
        };
        match invoke(handler.as_ref(), &message) {
            Ok(()) => {
                self.stats.messages_delivered += 1;
                InboundOutcome::Delivered
            }
            Err(failure) => {
                error!(
                    prefix = %message.prefix,
                    sender = %message.sender,
                    error = %failure,
                    "prefix handler failed"
                );
                self.stats.handler_failures += 1;
                InboundOutcome::HandlerFailed
            }
        }
    }

    /// Convenience form of [`handle_inbound`](Self::handle_inbound) for hosts
    /// that deliver the event fields separately.
    pub fn on_inbound_frame(
        &mut self,
        prefix: &str,
        raw: impl Into<Bytes>,
        distribution: Distribution,
        sender: &str,
    ) -> InboundOutcome {
        self.handle_inbound(InboundFrame::new(prefix, raw, distribution, sender))
    }

    /// Drop every queued outbound frame.
    pub fn clear_queue(&mut self) -> usize {
        self.queue.clear()
    }

    /// Drop queued outbound frames for one prefix.
    pub fn clear_queue_for_prefix(&mut self, prefix: &str) -> usize {
        self.queue.clear_for_prefix(prefix)
    }

    /// Drop every partial inbound message.
    pub fn clear_reassembly(&mut self) {
        self.reassembly.clear_all();
    }

    /// Drop partial inbound messages idle for longer than `max_age`.
    pub fn clear_stale_reassembly(&mut self, max_age: Duration) -> usize {
        let evicted = self.reassembly.clear_stale(max_age, self.clock.now());
        self.stats.reassemblies_evicted += evicted as u64;
        evicted
    }

    /// Frames waiting for budget.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_len_for(&self, priority: Priority) -> usize {
        self.queue.len_for(priority)
    }

    /// Partial inbound messages being assembled.
    pub fn pending_reassemblies(&self) -> usize {
        self.reassembly.len()
    }

    /// Current throttle balance, refilled to now.
    pub fn available_budget(&mut self) -> f64 {
        self.throttle.available(self.clock.now())
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<T: ChannelTransport, C: Clock> std::fmt::Debug for Dispatcher<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("queued", &self.queue.len())
            .field("registry", &self.registry)
            .field("pending_reassemblies", &self.reassembly.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use addoncomm_channel::{LoopbackChannel, ManualClock, TransmitError};
    use addoncomm_frame::control;

    use super::*;
    use crate::error::DispatchError;
    use crate::registry::handler;

    type TestDispatcher = Dispatcher<LoopbackChannel, ManualClock>;

    fn setup(config: TransportConfig) -> (TestDispatcher, LoopbackChannel, ManualClock) {
        let wire = LoopbackChannel::new();
        let clock = ManualClock::new();
        let dispatcher = Dispatcher::new(wire.clone(), clock.clone(), config).unwrap();
        (dispatcher, wire, clock)
    }

    fn recording(
        dispatcher: &mut TestDispatcher,
        prefix: &str,
    ) -> Rc<RefCell<Vec<InboundMessage>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        dispatcher
            .register_prefix(
                prefix,
                handler(move |msg| {
                    sink.borrow_mut().push(msg.clone());
                    Ok(())
                }),
            )
            .unwrap();
        received
    }

    fn party() -> Destination {
        Destination::to(Distribution::Party)
    }

    #[test]
    fn send_rejects_bad_prefix_and_missing_target() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());

        let err = dispatcher.send("", "x", party()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPrefix { .. }));

        let err = dispatcher
            .send("LONGER_THAN_16_BYTES", "x", party())
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPrefix { .. }));

        let err = dispatcher
            .send("P", "x", Destination::to(Distribution::Whisper))
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingTarget(_)));

        assert_eq!(dispatcher.queued_len(), 0);
    }

    #[test]
    fn send_only_queues() {
        let (mut dispatcher, wire, _) = setup(TransportConfig::default());
        dispatcher.send("P", "hello", party()).unwrap();
        assert_eq!(dispatcher.queued_len(), 1);
        assert!(wire.is_empty());

        let report = dispatcher.tick();
        assert_eq!(report.sent, 1);
        let frames = wire.take_frames();
        assert_eq!(frames[0].payload.as_ref(), b"\x04hello");
        assert_eq!(frames[0].prefix, "P");
    }

    #[test]
    fn six_hundred_bytes_end_to_end() {
        let (mut sender, wire, _) = setup(TransportConfig::default());
        let (mut receiver, _, _) = setup(TransportConfig::default());
        let received = recording(&mut receiver, "TEST");

        let payload: Vec<u8> = (0..600u32).map(|i| (i % 256) as u8).collect();
        sender
            .send("TEST", payload.clone(), Destination::to(Distribution::Guild))
            .unwrap();
        sender.tick();

        let frames = wire.take_frames();
        assert_eq!(frames.len(), 3);
        let controls: Vec<u8> = frames.iter().map(|f| f.payload[0]).collect();
        assert_eq!(controls, vec![control::FIRST, control::MIDDLE, control::LAST]);
        let ids: Vec<&[u8]> = frames.iter().map(|f| &f.payload[1..5]).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert!(ids[0]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b)));
        assert!(frames.iter().all(|f| f.payload.len() <= 255));

        let outcomes: Vec<InboundOutcome> = frames
            .into_iter()
            .map(|f| receiver.handle_inbound(f.into_inbound("Thrall")))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                InboundOutcome::Buffered,
                InboundOutcome::Buffered,
                InboundOutcome::Delivered
            ]
        );

        let received = received.borrow();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].payload.as_ref(), payload.as_slice());
        assert_eq!(received[0].sender, "Thrall");
        assert_eq!(received[0].distribution, Distribution::Guild);
    }

    #[test]
    fn priorities_drain_in_order_across_ticks() {
        let config = TransportConfig {
            burst_capacity: 1000.0,
            ..TransportConfig::default()
        };
        let (mut dispatcher, wire, _) = setup(config);

        // A and N encode to 50 and 100 bytes; B splits into 255 + 47.
        let bulk = SendRequest::new("B", vec![0u8; 292], party()).priority(Priority::Bulk);
        let alert = SendRequest::new("A", vec![0u8; 49], party()).priority(Priority::Alert);
        let normal = SendRequest::new("N", vec![0u8; 99], party());
        dispatcher.send_with(bulk).unwrap();
        dispatcher.send_with(alert).unwrap();
        dispatcher.send_with(normal).unwrap();

        dispatcher.tick();
        let first: Vec<String> = wire.take_frames().into_iter().map(|f| f.prefix).collect();
        assert_eq!(first, vec!["A", "N"]);
        assert_eq!(dispatcher.available_budget(), 850.0);

        dispatcher.tick();
        let second: Vec<String> = wire.take_frames().into_iter().map(|f| f.prefix).collect();
        assert_eq!(second, vec!["B"]);
        assert_eq!(dispatcher.queued_len_for(Priority::Bulk), 1);
    }

    #[test]
    fn large_message_drains_over_time() {
        let (mut dispatcher, wire, clock) = setup(TransportConfig::default());
        let payload = vec![9u8; 20_000];
        dispatcher.send("BIG", payload.clone(), party()).unwrap();

        let mut ticks = 0;
        while dispatcher.queued_len() > 0 {
            let report = dispatcher.tick();
            assert!(report.sent > 0);
            clock.advance(Duration::from_secs(1));
            ticks += 1;
            assert!(ticks < 30, "queue never drained");
        }
        assert!(ticks > 1, "throttle should spread the message over ticks");

        let (mut receiver, _, _) = setup(TransportConfig::default());
        let received = recording(&mut receiver, "BIG");
        for frame in wire.take_frames() {
            receiver.handle_inbound(frame.into_inbound("Jaina"));
        }
        assert_eq!(received.borrow()[0].payload.len(), payload.len());
    }

    #[test]
    fn transmit_failure_is_retried_next_tick() {
        let (mut dispatcher, wire, _) = setup(TransportConfig::default());
        dispatcher.send("P", "retry me", party()).unwrap();
        wire.fail_next(1);

        let report = dispatcher.tick();
        assert_eq!(report.sent, 0);
        assert!(matches!(report.error, Some(TransmitError::Unavailable)));
        assert_eq!(dispatcher.queued_len(), 1);
        assert_eq!(dispatcher.stats().transmit_failures, 1);
        assert_eq!(dispatcher.available_budget(), 4000.0);

        let report = dispatcher.tick();
        assert_eq!(report.sent, 1);
        assert_eq!(wire.take_frames()[0].payload.as_ref(), b"\x04retry me");
    }

    #[test]
    fn whisper_target_reaches_channel() {
        let (mut dispatcher, wire, _) = setup(TransportConfig::default());
        dispatcher
            .send("P", "psst", Destination::whisper("Thrall"))
            .unwrap();
        dispatcher
            .send("P", "all", Destination::with_target(Distribution::Raid, "ignored"))
            .unwrap();
        dispatcher.tick();

        let frames = wire.take_frames();
        assert_eq!(frames[0].distribution, Distribution::Whisper);
        assert_eq!(frames[0].target.as_deref(), Some("Thrall"));
        assert_eq!(frames[1].distribution, Distribution::Raid);
        assert_eq!(frames[1].target, None);
    }

    #[test]
    fn delivery_progress_reported_per_frame() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        let progress = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&progress);
        let request = SendRequest::new("P", vec![1u8; 600], party()).on_delivered(move |p| {
            sink.borrow_mut()
                .push((p.frame_index, p.frame_count, p.bytes_through, p.total_bytes));
        });
        dispatcher.send_with(request).unwrap();
        dispatcher.tick();

        assert_eq!(
            *progress.borrow(),
            vec![(0, 3, 250, 600), (1, 3, 500, 600), (2, 3, 600, 600)]
        );
    }

    #[test]
    fn unregistered_prefix_is_ignored() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        let outcome = dispatcher.on_inbound_frame("NOPE", "\x04hi", Distribution::Party, "X");
        assert_eq!(outcome, InboundOutcome::Ignored);
        assert_eq!(dispatcher.stats().frames_ignored, 1);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        let received = recording(&mut dispatcher, "P");

        for raw in [&b""[..], &b"\x09abc"[..], &b"\x0112"[..], &b"\x01zzzzab"[..]] {
            let raw = Bytes::copy_from_slice(raw);
            let outcome = dispatcher.on_inbound_frame("P", raw.clone(), Distribution::Party, "X");
            assert_eq!(outcome, InboundOutcome::Malformed, "{raw:?}");
        }
        assert_eq!(dispatcher.stats().frames_malformed, 4);
        assert!(received.borrow().is_empty());
    }

    #[test]
    fn orphaned_parts_are_discarded() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        let received = recording(&mut dispatcher, "P");

        let outcome = dispatcher.on_inbound_frame("P", "\x03000Atail", Distribution::Party, "X");
        assert_eq!(outcome, InboundOutcome::Discarded(DiscardReason::Orphaned));
        assert!(received.borrow().is_empty());
    }

    #[test]
    fn senders_are_reassembled_independently() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        let received = recording(&mut dispatcher, "P");

        dispatcher.on_inbound_frame("P", "\x010001ab", Distribution::Raid, "Alice");
        dispatcher.on_inbound_frame("P", "\x010001xy", Distribution::Raid, "Bob");
        dispatcher.on_inbound_frame("P", "\x030001cd", Distribution::Raid, "Alice");
        dispatcher.on_inbound_frame("P", "\x030001z", Distribution::Raid, "Bob");

        let received = received.borrow();
        let got: Vec<(&str, &[u8])> = received
            .iter()
            .map(|m| (m.sender.as_str(), m.payload.as_ref()))
            .collect();
        assert_eq!(got, vec![("Alice", &b"abcd"[..]), ("Bob", &b"xyz"[..])]);
    }

    #[test]
    fn failing_handlers_are_contained() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        dispatcher
            .register_fn("ERR", |_| Err("rejected".into()))
            .unwrap();
        dispatcher
            .register_fn("PANIC", |_| panic!("handler bug"))
            .unwrap();
        let received = recording(&mut dispatcher, "OK");

        let outcome = dispatcher.on_inbound_frame("ERR", "\x04a", Distribution::Party, "X");
        assert_eq!(outcome, InboundOutcome::HandlerFailed);
        let outcome = dispatcher.on_inbound_frame("PANIC", "\x04a", Distribution::Party, "X");
        assert_eq!(outcome, InboundOutcome::HandlerFailed);
        let outcome = dispatcher.on_inbound_frame("OK", "\x04a", Distribution::Party, "X");
        assert_eq!(outcome, InboundOutcome::Delivered);

        assert_eq!(dispatcher.stats().handler_failures, 2);
        assert_eq!(received.borrow().len(), 1);
    }

    #[test]
    fn tick_evicts_stale_reassembly() {
        let config = TransportConfig {
            reassembly_timeout_secs: Some(5.0),
            ..TransportConfig::default()
        };
        let (mut dispatcher, _, clock) = setup(config);
        let received = recording(&mut dispatcher, "P");

        dispatcher.on_inbound_frame("P", "\x010001ab", Distribution::Party, "X");
        assert_eq!(dispatcher.pending_reassemblies(), 1);

        clock.advance(Duration::from_secs(5));
        dispatcher.tick();
        assert_eq!(dispatcher.pending_reassemblies(), 1);

        clock.advance(Duration::from_secs(1));
        dispatcher.tick();
        assert_eq!(dispatcher.pending_reassemblies(), 0);
        assert_eq!(dispatcher.stats().reassemblies_evicted, 1);

        let outcome = dispatcher.on_inbound_frame("P", "\x030001cd", Distribution::Party, "X");
        assert_eq!(outcome, InboundOutcome::Discarded(DiscardReason::Orphaned));
        assert!(received.borrow().is_empty());
    }

    #[test]
    fn manual_reassembly_clearing() {
        let (mut dispatcher, _, clock) = setup(TransportConfig::default());
        recording(&mut dispatcher, "P");

        dispatcher.on_inbound_frame("P", "\x010001ab", Distribution::Party, "X");
        clock.advance(Duration::from_secs(10));
        dispatcher.on_inbound_frame("P", "\x010002ab", Distribution::Party, "Y");

        assert_eq!(dispatcher.clear_stale_reassembly(Duration::from_secs(5)), 1);
        assert_eq!(dispatcher.pending_reassemblies(), 1);
        dispatcher.clear_reassembly();
        assert_eq!(dispatcher.pending_reassemblies(), 0);
    }

    #[test]
    fn clearing_the_queue() {
        let (mut dispatcher, wire, _) = setup(TransportConfig::default());
        dispatcher.send("A", "1", party()).unwrap();
        dispatcher.send("B", vec![0u8; 600], party()).unwrap();
        dispatcher.send("A", "2", party()).unwrap();

        assert_eq!(dispatcher.clear_queue_for_prefix("B"), 3);
        assert_eq!(dispatcher.queued_len(), 2);
        assert_eq!(dispatcher.clear_queue(), 2);
        dispatcher.tick();
        assert!(wire.is_empty());
    }

    #[test]
    fn registration_rules_apply() {
        let (mut dispatcher, _, _) = setup(TransportConfig::default());
        dispatcher.register_fn("P", |_| Ok(())).unwrap();
        assert!(dispatcher.is_registered("P"));

        let err = dispatcher.register_fn("P", |_| Ok(())).unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRegistered(_)));

        assert!(dispatcher.unregister_prefix("P"));
        assert!(!dispatcher.is_registered("P"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TransportConfig {
            max_frame_size: 4,
            ..TransportConfig::default()
        };
        let err = Dispatcher::new(LoopbackChannel::new(), ManualClock::new(), config).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfig(_)));
    }
}
