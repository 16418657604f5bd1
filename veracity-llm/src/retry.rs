use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use veracity_common::OracleError;

/// Rate-limit retry schedule applied around a single provider.
///
/// Only `RateLimited` errors are retried. Each wait is the provider's
/// retry-after hint when present, else the current backoff, and never more
/// than `max_delay`. The backoff doubles after every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub async fn run<T, F, Fut>(&self, provider: &str, mut op: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let mut backoff = self.initial_delay;
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_rate_limited() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = e.retry_after().unwrap_or(backoff).min(self.max_delay);
                    tracing::warn!(
                        provider,
                        attempt,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        hinted = e.retry_after().is_some(),
                        "oracle.retrying"
                    );
                    sleep(wait).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn limited(hint: Option<Duration>) -> OracleError {
        OracleError::RateLimited {
            provider: "gemini".into(),
            message: "quota".into(),
            retry_after: hint,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let calls = AtomicU32::new(0);
        let t0 = Instant::now();
        let out = RetryPolicy::default()
            .run("gemini", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(limited(None))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(t0.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn hint_wins_and_is_capped() {
        let calls = AtomicU32::new(0);
        let t0 = Instant::now();
        let _ = RetryPolicy::default()
            .run("gemini", || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(limited(Some(Duration::from_secs(7)))),
                    1 => Err(limited(Some(Duration::from_secs(600)))),
                    _ => Ok(()),
                }
            })
            .await;
        assert_eq!(t0.elapsed(), Duration::from_secs(67));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let err = RetryPolicy::default()
            .run::<(), _, _>("gemini", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(limited(None))
            })
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = RetryPolicy::default()
            .run::<(), _, _>("gemini", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OracleError::MalformedResponse {
                    provider: "gemini".into(),
                    message: "missing field".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(!err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
