//! Tokio driver that ticks a [`Dispatcher`] on a fixed period and feeds it
//! inbound frames from a channel.
//!
//! The dispatcher holds non-`Send` handler references, so the driver future
//! must run on the thread that owns the dispatcher (a current-thread runtime
//! or a `LocalSet`).

use std::time::Duration;

use addoncomm_channel::{ChannelTransport, Clock, InboundFrame};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Result};

/// Totals reported when [`run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverSummary {
    pub ticks: u64,
    pub frames_sent: u64,
    pub inbound_frames: u64,
}

/// Drive `dispatcher` until `shutdown` is cancelled.
///
/// Ticks every `tick_period` and hands each frame from `inbound` to
/// [`Dispatcher::handle_inbound`] as it arrives. When the inbound sender is
/// dropped the driver keeps ticking so queued output still drains.
pub async fn run<T, C>(
    dispatcher: &mut Dispatcher<T, C>,
    mut inbound: mpsc::Receiver<InboundFrame>,
    tick_period: Duration,
    shutdown: CancellationToken,
) -> Result<DriverSummary>
where
    T: ChannelTransport,
    C: Clock,
{
    if tick_period.is_zero() {
        return Err(DispatchError::InvalidConfig(
            "tick period must be non-zero".to_string(),
        ));
    }

    let mut ticker = time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut summary = DriverSummary::default();
    let mut inbound_open = true;

    debug!(?tick_period, "dispatch driver started");
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = ticker.tick() => {
                let report = dispatcher.tick();
                summary.ticks += 1;
                summary.frames_sent += report.sent as u64;
            }

            frame = inbound.recv(), if inbound_open => match frame {
                Some(frame) => {
                    dispatcher.handle_inbound(frame);
                    summary.inbound_frames += 1;
                }
                None => {
                    debug!("inbound channel closed");
                    inbound_open = false;
                }
            },
        }
    }

    info!(
        ticks = summary.ticks,
        frames_sent = summary.frames_sent,
        inbound_frames = summary.inbound_frames,
        queued = dispatcher.queued_len(),
        "dispatch driver stopped"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use addoncomm_channel::{Distribution, LoopbackChannel};

    use super::*;
    use crate::config::TransportConfig;
    use crate::destination::Destination;
    use crate::registry::handler;

    #[tokio::test]
    async fn drains_queue_and_delivers_inbound() {
        let wire = LoopbackChannel::new();
        let mut sender = Dispatcher::with_defaults(wire.clone()).unwrap();
        sender
            .send("DRV", vec![7u8; 600], Destination::to(Distribution::Party))
            .unwrap();

        let mut receiver = Dispatcher::with_defaults(LoopbackChannel::new()).unwrap();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        receiver
            .register_prefix(
                "DRV",
                handler(move |msg| {
                    sink.borrow_mut().push(msg.payload.len());
                    Ok(())
                }),
            )
            .unwrap();

        // Sender side: tick until the three frames are out.
        let token = CancellationToken::new();
        let (_tx, rx) = mpsc::channel(8);
        let stopper = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            stopper.cancel();
        });
        let summary = run(&mut sender, rx, Duration::from_millis(5), token)
            .await
            .unwrap();
        assert!(summary.ticks >= 1);
        assert_eq!(summary.frames_sent, 3);
        assert_eq!(sender.queued_len(), 0);

        // Receiver side: feed the frames through the inbound channel.
        let (tx, rx) = mpsc::channel(8);
        for frame in wire.take_frames() {
            tx.send(frame.into_inbound("Jaina")).await.unwrap();
        }
        drop(tx);

        let token = CancellationToken::new();
        let stopper = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            stopper.cancel();
        });
        let summary = run(&mut receiver, rx, Duration::from_millis(5), token)
            .await
            .unwrap();
        assert_eq!(summary.inbound_frames, 3);
        assert_eq!(*received.borrow(), vec![600]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_immediately() {
        let mut dispatcher = Dispatcher::with_defaults(LoopbackChannel::new()).unwrap();
        let (_tx, rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        token.cancel();

        let summary = run(&mut dispatcher, rx, Duration::from_millis(5), token)
            .await
            .unwrap();
        assert_eq!(summary, DriverSummary::default());
    }

    #[tokio::test]
    async fn zero_tick_period_is_rejected() {
        let mut dispatcher = Dispatcher::new(
            LoopbackChannel::new(),
            addoncomm_channel::MonotonicClock::new(),
            TransportConfig::default(),
        )
        .unwrap();
        let (_tx, rx) = mpsc::channel(1);
        let err = run(&mut dispatcher, rx, Duration::ZERO, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfig(_)));
    }
}
