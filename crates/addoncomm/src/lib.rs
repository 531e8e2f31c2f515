//! Framed, throttled, prefix-routed messaging between game addons.
//!
//! The host chat channel carries small frames addressed by a short prefix.
//! addoncomm splits larger messages into frames, paces them with a byte
//! budget so the host does not disconnect the client, and reassembles them
//! on the receiving side before routing to the handler registered for the
//! prefix.
//!
//! # Crate Structure
//!
//! - [`channel`]: host channel trait, distributions, clocks, loopback channel
//! - [`frame`]: control-byte framing, splitting and reassembly
//! - [`dispatch`]: throttle, priority queue, prefix registry and dispatcher
//!   (behind the `dispatch` feature, on by default)
//!
//! # Example
//!
//! ```
//! use addoncomm::channel::{Distribution, LoopbackChannel};
//! use addoncomm::dispatch::{handler, Destination, Dispatcher};
//!
//! let wire = LoopbackChannel::new();
//! let mut sender = Dispatcher::with_defaults(wire.clone()).unwrap();
//! sender.send("MyAddon", "hello", Destination::to(Distribution::Guild)).unwrap();
//! sender.tick();
//!
//! let mut receiver = Dispatcher::with_defaults(LoopbackChannel::new()).unwrap();
//! receiver
//!     .register_prefix("MyAddon", handler(|msg| {
//!         assert_eq!(msg.payload.as_ref(), b"hello");
//!         Ok(())
//!     }))
//!     .unwrap();
//! for frame in wire.take_frames() {
//!     receiver.handle_inbound(frame.into_inbound("Thrall"));
//! }
//! assert_eq!(receiver.stats().messages_delivered, 1);
//! ```

/// Re-export channel types.
pub mod channel {
    pub use addoncomm_channel::*;
}

/// Re-export frame types.
pub mod frame {
    pub use addoncomm_frame::*;
}

/// Re-export dispatch types (requires `dispatch` feature).
#[cfg(feature = "dispatch")]
pub mod dispatch {
    pub use addoncomm_dispatch::*;
}
