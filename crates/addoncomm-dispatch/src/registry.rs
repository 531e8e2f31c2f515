use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use addoncomm_channel::Distribution;
use bytes::Bytes;
use tracing::debug;

use crate::error::{DispatchError, Result};

/// Longest prefix the host channel accepts, in bytes.
pub const MAX_PREFIX_LEN: usize = 16;

/// A fully reassembled message handed to a prefix handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub prefix: String,
    pub payload: Bytes,
    pub distribution: Distribution,
    pub sender: String,
}

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error>;

/// Return type of [`PrefixHandler::on_message`].
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Receives every complete message for one prefix.
pub trait PrefixHandler {
    fn on_message(&self, message: &InboundMessage) -> HandlerResult;
}

impl<F> PrefixHandler for F
where
    F: Fn(&InboundMessage) -> HandlerResult,
{
    fn on_message(&self, message: &InboundMessage) -> HandlerResult {
        self(message)
    }
}

/// Shared handle to a registered handler.
pub type HandlerRef = Rc<dyn PrefixHandler>;

/// Wrap a closure as a [`HandlerRef`].
pub fn handler<F>(f: F) -> HandlerRef
where
    F: Fn(&InboundMessage) -> HandlerResult + 'static,
{
    Rc::new(f)
}

/// Why a handler call did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerFailure {
    Error(String),
    Panic(String),
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerFailure::Error(message) => write!(f, "handler returned error: {message}"),
            HandlerFailure::Panic(message) => write!(f, "handler panicked: {message}"),
        }
    }
}

/// Call `handler`, turning both returned errors and panics into
/// [`HandlerFailure`].
pub fn invoke(
    handler: &dyn PrefixHandler,
    message: &InboundMessage,
) -> std::result::Result<(), HandlerFailure> {
    match catch_unwind(AssertUnwindSafe(|| handler.on_message(message))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(HandlerFailure::Error(err.to_string())),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(HandlerFailure::Panic(message))
        }
    }
}

/// Check that `prefix` is 1 to [`MAX_PREFIX_LEN`] bytes long.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let reason = if prefix.is_empty() {
        "prefix is empty"
    } else if prefix.len() > MAX_PREFIX_LEN {
        "prefix is longer than 16 bytes"
    } else {
        return Ok(());
    };
    Err(DispatchError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason,
    })
}

/// Maps prefixes to the handler that owns them.
#[derive(Default)]
pub struct PrefixRegistry {
    handlers: HashMap<String, HandlerRef>,
}

impl PrefixRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `prefix`.
    ///
    /// Registering the same handler again is a no-op. A different handler for
    /// an owned prefix is rejected.
    pub fn register(&mut self, prefix: &str, handler: HandlerRef) -> Result<()> {
        validate_prefix(prefix)?;
        match self.handlers.get(prefix) {
            Some(existing) if Rc::ptr_eq(existing, &handler) => Ok(()),
            Some(_) => Err(DispatchError::AlreadyRegistered(prefix.to_string())),
            None => {
                debug!(prefix, "prefix registered");
                self.handlers.insert(prefix.to_string(), handler);
                Ok(())
            }
        }
    }

    /// Remove the handler for `prefix`. Returns whether one was registered.
    pub fn unregister(&mut self, prefix: &str) -> bool {
        let removed = self.handlers.remove(prefix).is_some();
        if removed {
            debug!(prefix, "prefix unregistered");
        }
        removed
    }

    pub fn get(&self, prefix: &str) -> Option<HandlerRef> {
        self.handlers.get(prefix).cloned()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.handlers.contains_key(prefix)
    }

    /// Registered prefixes, sorted.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for PrefixRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixRegistry")
            .field("prefixes", &self.prefixes())
            .finish()
    }
}
