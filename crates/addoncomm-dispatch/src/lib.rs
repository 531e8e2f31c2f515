//! Prefix dispatch and throttled delivery for addon messaging.
//!
//! This is the layer addons talk to. Register a handler per prefix, queue
//! messages with a priority, and call [`Dispatcher::tick`] periodically; the
//! dispatcher splits, throttles, transmits, reassembles and routes.
//!
//! With the `async` feature, [`driver::run`] ticks a dispatcher from a tokio
//! interval and feeds it inbound frames from an mpsc channel.

pub mod config;
pub mod destination;
pub mod dispatcher;
#[cfg(feature = "async")]
pub mod driver;
pub mod error;
pub mod queue;
pub mod registry;
pub mod throttle;

pub use config::{
    TransportConfig, DEFAULT_BULK_MULTIPLIER, DEFAULT_BURST_CAPACITY, DEFAULT_RATE,
};
pub use destination::Destination;
pub use dispatcher::{DispatchStats, Dispatcher, InboundOutcome, SendRequest};
pub use error::{DispatchError, Result};
pub use queue::{
    DeliveryHook, DeliveryProgress, OutboundItem, Priority, SendQueue, TickReport,
    UnknownPriority,
};
pub use registry::{
    handler, invoke, validate_prefix, HandlerError, HandlerFailure, HandlerRef, HandlerResult,
    InboundMessage, PrefixHandler, PrefixRegistry, MAX_PREFIX_LEN,
};
pub use throttle::Throttle;
