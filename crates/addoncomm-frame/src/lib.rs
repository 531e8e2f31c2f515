//! Control-byte framing for a small-frame, unordered channel.
//!
//! Every frame starts with a control byte:
//! - `Single` frames carry a whole message
//! - `First`/`Middle`/`Last` frames carry one part of a larger message,
//!   tagged with a 4-hex-digit message id
//!
//! [`Splitter`] turns payloads into frames that never exceed the channel's
//! limit; [`ReassemblyTable`] turns inbound parts back into payloads.

pub mod codec;
pub mod error;
pub mod reassembly;
pub mod split;

pub use codec::{
    control, encode_message_id, parse_frame, ControlKind, FrameConfig, MessageId, WireFrame,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE, MIN_FRAME_SIZE, MULTIPART_HEADER_SIZE,
    SINGLE_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reassembly::{Assembly, DiscardReason, ReassemblyTable};
pub use split::{chunk_size, split_with_id, Splitter};
