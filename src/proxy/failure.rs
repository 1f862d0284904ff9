//! Why a single dispatch did not produce an upstream response.

use crate::health::passive::HealthSignal;
use crate::resilience::{Retryable, TransportError, TransportErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No connection slot became free in time; nothing was sent.
    #[error("connection pool for {service} exhausted")]
    PoolExhausted { service: String },
}

impl DispatchFailure {
    /// Label used for attempt metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchFailure::Transport(e) => e.kind.as_str(),
            DispatchFailure::PoolExhausted { .. } => "pool_exhausted",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DispatchFailure::Transport(e) if e.kind == TransportErrorKind::Timeout)
    }
}

impl Retryable for DispatchFailure {
    fn is_retryable(&self) -> bool {
        match self {
            DispatchFailure::Transport(e) => e.is_transient(),
            DispatchFailure::PoolExhausted { .. } => false,
        }
    }
}

impl HealthSignal for DispatchFailure {
    fn counts_as_failure(&self) -> bool {
        matches!(self, DispatchFailure::Transport(_))
    }
}
