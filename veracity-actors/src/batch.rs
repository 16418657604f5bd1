//! Fixed-size concurrent chunks over a list that is known up front.
use std::future::Future;
use std::time::Duration;
use veracity_common::ItemFailurePolicy;

/// Observer called with `(completed, total)` after each chunk.
pub type Progress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Pause between chunks; none after the last one.
    pub chunk_delay: Duration,
    pub comment_limit: u32,
    pub include_comments: bool,
    pub on_item_failure: ItemFailurePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            chunk_delay: Duration::from_secs(1),
            comment_limit: 20,
            include_comments: true,
            on_item_failure: ItemFailurePolicy::Drop,
        }
    }
}

/// Run `work` over `items` at most `chunk_size` at a time. Chunk `n + 1`
/// starts only after every future of chunk `n` has completed. Output order
/// matches input order.
pub async fn run_chunked<T, R, F, Fut>(
    items: Vec<T>,
    chunk_size: usize,
    chunk_delay: Duration,
    progress: Option<Progress<'_>>,
    mut work: F,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let total = items.len();
    let size = chunk_size.max(1);
    let mut out = Vec::with_capacity(total);
    let mut pending = items.into_iter().peekable();

    while pending.peek().is_some() {
        let chunk: Vec<Fut> = pending.by_ref().take(size).map(&mut work).collect();
        out.extend(futures::future::join_all(chunk).await);
        tracing::debug!(completed = out.len(), total, "batch.chunk.done");
        if let Some(report) = progress {
            report(out.len(), total);
        }
        if pending.peek().is_some() && !chunk_delay.is_zero() {
            tokio::time::sleep(chunk_delay).await;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn chunks_report_progress_and_pause_between() {
        let seen = Mutex::new(Vec::new());
        let report = |done: usize, total: usize| seen.lock().unwrap().push((done, total));
        let began = Instant::now();

        let out = run_chunked(
            (0..12).collect(),
            5,
            Duration::from_secs(1),
            Some(&report),
            |n: u32| async move { n * 2 },
        )
        .await;

        assert_eq!(out, (0..12).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(*seen.lock().unwrap(), vec![(5, 12), (10, 12), (12, 12)]);
        let elapsed = began.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn next_chunk_waits_for_slowest_item() {
        let starts = Mutex::new(Vec::new());
        let began = Instant::now();
        run_chunked(vec![300u64, 10, 10], 2, Duration::ZERO, None, |ms| {
            starts.lock().unwrap().push(began.elapsed());
            async move { tokio::time::sleep(Duration::from_millis(ms)).await }
        })
        .await;

        let starts = starts.lock().unwrap();
        assert_eq!(starts[0], Duration::ZERO);
        assert!(starts[2] >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn empty_input_never_reports() {
        let out: Vec<()> = run_chunked(
            Vec::<()>::new(),
            5,
            Duration::ZERO,
            Some(&|_: usize, _: usize| panic!("no chunks")),
            |_| async {},
        )
        .await;
        assert!(out.is_empty());
    }
}
