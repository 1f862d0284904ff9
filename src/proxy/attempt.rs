//! One forwarding attempt.

use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ProxyAttempt {
    /// Fresh for every attempt, sent upstream as `X-Request-ID`.
    pub request_id: Uuid,
    /// 1-based.
    pub attempt_number: u32,
    pub started_at: Instant,
}

impl ProxyAttempt {
    pub fn start(attempt_number: u32) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            attempt_number,
            started_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn request_id_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.request_id.to_string()).ok()
    }
}
