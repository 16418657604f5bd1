//! Minimum-interval pacing shared by every request a client sends.
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Enforces a minimum spacing between consecutive request starts.
///
/// The watermark lock is held across the wait, so concurrent callers queue up
/// and are released one interval apart.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until at least `min_interval` has passed since the previous
    /// caller was released.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "http.pacer.wait"
                );
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_secs(2));
        let t0 = Instant::now();
        pacer.wait().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_spaced_by_interval() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_secs(2)));
        let t0 = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let p = pacer.clone();
            handles.push(tokio::spawn(async move {
                p.wait().await;
                Instant::now()
            }));
        }
        let mut starts = Vec::new();
        for h in handles {
            starts.push(h.await.unwrap() - t0);
        }
        starts.sort();

        assert_eq!(
            starts,
            vec![Duration::ZERO, Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_interval_elapsed() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        pacer.wait().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let t = Instant::now();
        pacer.wait().await;
        assert_eq!(t.elapsed(), Duration::ZERO);
    }
}
