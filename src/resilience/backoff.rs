//! Linear backoff.

use std::time::Duration;

/// Delay before retry number `retry` (1-based): `base_ms * retry`.
pub fn calculate_backoff(retry: u32, base_ms: u64) -> Duration {
    if retry == 0 {
        return Duration::from_millis(0);
    }

    Duration::from_millis(base_ms.saturating_mul(u64::from(retry)))
}
