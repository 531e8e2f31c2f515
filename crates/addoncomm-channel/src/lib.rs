//! Host channel abstraction for addon messaging.
//!
//! The channel is the lowest layer of addoncomm: it accepts one small frame at
//! a time addressed by a prefix and a distribution, and delivers inbound frames
//! as discrete [`InboundFrame`] events. A monotonic [`Clock`] is provided here
//! as well since every layer above measures time through it.
//!
//! [`LoopbackChannel`] is an in-memory implementation for tests and tooling.

pub mod clock;
pub mod error;
pub mod loopback;
pub mod traits;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{Result, TransmitError};
pub use loopback::{LoopbackChannel, TransmittedFrame};
pub use traits::{ChannelTransport, Distribution, InboundFrame, UnknownDistribution};
