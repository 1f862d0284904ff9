//! Transport failure classification.
//!
//! # Responsibilities
//! - Turn client, connector and IO errors into a small set of kinds
//! - Decide which kinds are transient (eligible for retry)
//!
//! # Design Decisions
//! - Classification walks the `source()` chain; the first recognised cause wins
//! - Upstream HTTP responses are never transport errors, whatever their status

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Kind of transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Nothing listening at the upstream address.
    ConnectionRefused,
    /// Connection dropped or closed before a full response arrived.
    ConnectionReset,
    /// Connect or response deadline exceeded.
    Timeout,
    /// Upstream host could not be resolved.
    Dns,
    /// Anything else (TLS, protocol errors, ...).
    Other,
}

impl TransportErrorKind {
    /// Whether a retry may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            TransportErrorKind::ConnectionRefused
                | TransportErrorKind::ConnectionReset
                | TransportErrorKind::Timeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionRefused => "connection_refused",
            TransportErrorKind::ConnectionReset => "connection_reset",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Deadline exceeded after `after`.
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Classify an error from the pooled HTTP client.
    pub fn from_client_error(err: &hyper_util::client::legacy::Error) -> Self {
        let mut kind = classify_chain(err);
        if kind == TransportErrorKind::Other && err.is_connect() {
            kind = if chain_mentions(err, "dns") {
                TransportErrorKind::Dns
            } else {
                TransportErrorKind::ConnectionRefused
            };
        }
        Self::new(kind, describe_chain(err))
    }

    /// Classify an arbitrary error by its cause chain.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut kind = classify_chain(err);
        if kind == TransportErrorKind::Other && chain_mentions(err, "dns") {
            kind = TransportErrorKind::Dns;
        }
        Self::new(kind, describe_chain(err))
    }
}

fn classify_io(err: &io::Error) -> Option<TransportErrorKind> {
    use io::ErrorKind::*;
    match err.kind() {
        ConnectionRefused => Some(TransportErrorKind::ConnectionRefused),
        ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof | NotConnected => {
            Some(TransportErrorKind::ConnectionReset)
        }
        TimedOut => Some(TransportErrorKind::Timeout),
        _ => None,
    }
}

fn classify_chain(err: &(dyn StdError + 'static)) -> TransportErrorKind {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io(io_err) {
                return kind;
            }
        }
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_timeout() {
                return TransportErrorKind::Timeout;
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() || hyper_err.is_closed() {
                return TransportErrorKind::ConnectionReset;
            }
        }
        current = e.source();
    }
    TransportErrorKind::Other
}

fn chain_mentions(err: &(dyn StdError + 'static), needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if e.to_string().to_lowercase().contains(needle) {
            return true;
        }
        current = e.source();
    }
    false
}

fn describe_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}
