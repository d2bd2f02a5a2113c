//! Bounded retry with jittered exponential backoff for remote calls.
//!
//! Only transient HTTP failures (429, 500, 502, 503, 504) are retried;
//! anything else, including failures with no status at all, propagates
//! immediately. The policy has no built-in deadline; callers needing
//! cancellation wrap the whole guarded call externally.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Maximum number of retries after the initial attempt.
pub const MAX_RETRIES: u32 = 3;
/// Base delay for the exponential schedule.
pub const BASE_DELAY_MS: u64 = 1_000;
/// Upper bound on any computed delay.
pub const MAX_DELAY_MS: u64 = 30_000;

/// Classification hooks the retry policy needs from an error type.
pub trait RetryClass {
    /// The HTTP status carried by the failure, if any.
    fn status(&self) -> Option<u16>;

    /// Numeric Retry-After seconds, when the response carried one.
    fn retry_after_secs(&self) -> Option<u64> {
        None
    }
}

fn is_transient(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Delay before retry number `attempt` (0-based), honoring a 429
/// Retry-After override when present.
fn delay_for<E: RetryClass>(err: &E, attempt: u32) -> Duration {
    if err.status() == Some(429) {
        if let Some(secs) = err.retry_after_secs() {
            return Duration::from_millis(secs.saturating_mul(1_000));
        }
    }
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    let jitter = rand::thread_rng().gen_range(0..BASE_DELAY_MS);
    Duration::from_millis(exp.saturating_add(jitter).min(MAX_DELAY_MS))
}

/// Invoke `op`, retrying transient failures up to [`MAX_RETRIES`] times.
/// Exhausting the budget re-raises the last failure.
pub async fn with_retry<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    E: RetryClass,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let transient = err.status().map(is_transient).unwrap_or(false);
                if !transient || attempt >= MAX_RETRIES {
                    return Err(err);
                }
                let delay = delay_for(&err, attempt);
                warn!(
                    status = err.status(),
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "transient remote failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FakeError {
        status: Option<u16>,
        retry_after: Option<u64>,
    }

    impl RetryClass for FakeError {
        fn status(&self) -> Option<u16> {
            self.status
        }

        fn retry_after_secs(&self) -> Option<u64> {
            self.retry_after
        }
    }

    fn err(status: Option<u16>) -> FakeError {
        FakeError {
            status,
            retry_after: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(err(Some(500)))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(err(Some(404))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn statusless_error_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(err(None)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_reraises_the_last_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FakeError> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(err(Some(503))) }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(503));
        // 1 initial attempt + MAX_RETRIES.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn retry_after_overrides_exponential_schedule() {
        let e = FakeError {
            status: Some(429),
            retry_after: Some(7),
        };
        assert_eq!(delay_for(&e, 0), Duration::from_millis(7_000));
    }

    #[test]
    fn huge_retry_after_saturates() {
        let e = FakeError {
            status: Some(429),
            retry_after: Some(u64::MAX),
        };
        assert_eq!(delay_for(&e, 0), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn exponential_delay_is_capped() {
        let e = err(Some(500));
        for attempt in 0..8 {
            let d = delay_for(&e, attempt);
            assert!(d <= Duration::from_millis(MAX_DELAY_MS));
            assert!(d >= Duration::from_millis(BASE_DELAY_MS.min(MAX_DELAY_MS)));
        }
    }
}
