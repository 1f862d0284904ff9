//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are transport errors of kind `Timeout`, so they share
//!   retry and health accounting with other transport failures
//! - Timed-out requests end as 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::resilience::transport::TransportError;

/// Run `fut` with a deadline, mapping expiry to a timeout transport error.
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::transport::TransportErrorKind;

    #[tokio::test]
    async fn fast_future_passes_through() {
        let result = with_deadline(Duration::from_millis(100), async { Ok::<_, TransportError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out() {
        let result = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TransportError>(())
        })
        .await;
        assert_eq!(result.unwrap_err().kind, TransportErrorKind::Timeout);
    }
}
