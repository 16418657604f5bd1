//! Debounced batch dispatcher for free-text analysis.
//!
//! Submissions that miss the cache are queued. The first one arms a debounce
//! timer; when it fires, up to `batch_size` requests are sent to the oracle
//! concurrently and each caller is answered as soon as its own call settles.
//! The next chunk is only scheduled after every call of the current chunk has
//! settled, so the dispatcher never has more than `batch_size` oracle calls in
//! flight. Identical submissions (same fingerprint) that arrive while one is
//! already pending share its result.
use crate::actor::{spawn_actor, Actor, Addr, Context};
use crate::cache::{fingerprint, ResultCache};
use anyhow::Result;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use veracity_common::{AnalysisRecord, OracleError, VeracityError};
use veracity_llm::AnalysisOracle;

type Reply = oneshot::Sender<Result<AnalysisRecord, VeracityError>>;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub debounce: Duration,
    pub fingerprint_len: usize,
    pub mailbox: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            debounce: Duration::from_millis(200),
            fingerprint_len: 500,
            mailbox: 256,
        }
    }
}

struct Queued {
    key: String,
    text: String,
}

pub enum DispatchMsg {
    Submit {
        text: String,
        reply: Reply,
    },
    /// Debounce timer fired.
    Tick,
    /// One oracle call of the current chunk finished.
    Completed {
        key: String,
        outcome: Result<AnalysisRecord, OracleError>,
    },
    /// Every call of the current chunk finished.
    ChunkSettled,
}

pub struct BatchDispatcher {
    oracle: Arc<dyn AnalysisOracle>,
    cache: Arc<ResultCache<AnalysisRecord>>,
    settings: DispatchSettings,
    queue: VecDeque<Queued>,
    waiters: HashMap<String, Vec<Reply>>,
    timer_pending: bool,
    in_flight: bool,
}

impl BatchDispatcher {
    pub fn new(
        oracle: Arc<dyn AnalysisOracle>,
        cache: Arc<ResultCache<AnalysisRecord>>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            oracle,
            cache,
            settings,
            queue: VecDeque::new(),
            waiters: HashMap::new(),
            timer_pending: false,
            in_flight: false,
        }
    }

    fn arm_timer(&mut self, ctx: &Context<Self>) {
        if self.timer_pending || self.in_flight || self.queue.is_empty() {
            return;
        }
        let Some(addr) = ctx.addr() else {
            self.abandon_queue("dispatcher is shutting down");
            return;
        };
        self.timer_pending = true;
        let delay = self.settings.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = addr.send(DispatchMsg::Tick).await;
        });
    }

    fn dispatch_chunk(&mut self, ctx: &Context<Self>) {
        let take = self.settings.batch_size.max(1).min(self.queue.len());
        if take == 0 {
            return;
        }
        let Some(addr) = ctx.addr() else {
            self.abandon_queue("dispatcher is shutting down");
            return;
        };
        let chunk: Vec<Queued> = self.queue.drain(..take).collect();
        self.in_flight = true;
        tracing::debug!(
            size = chunk.len(),
            remaining = self.queue.len(),
            "dispatch.chunk.start"
        );

        let oracle = Arc::clone(&self.oracle);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let calls = chunk.into_iter().map(|req| {
                let oracle = Arc::clone(&oracle);
                let cache = Arc::clone(&cache);
                let addr = addr.clone();
                async move {
                    let outcome = oracle.analyze(&req.text).await;
                    if let Ok(record) = &outcome {
                        cache.put(req.key.clone(), record.clone());
                    }
                    let _ = addr
                        .send(DispatchMsg::Completed {
                            key: req.key,
                            outcome,
                        })
                        .await;
                }
            });
            futures::future::join_all(calls).await;
            let _ = addr.send(DispatchMsg::ChunkSettled).await;
        });
    }

    fn resolve(&mut self, key: &str, outcome: Result<AnalysisRecord, OracleError>) {
        let Some(replies) = self.waiters.remove(key) else {
            return;
        };
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, kind = ?e.kind(), waiters = replies.len(), "dispatch.item_failed");
        }
        for reply in replies {
            let _ = reply.send(outcome.clone().map_err(VeracityError::from));
        }
    }

    fn abandon_queue(&mut self, reason: &str) {
        for req in self.queue.drain(..) {
            for reply in self.waiters.remove(&req.key).unwrap_or_default() {
                let _ = reply.send(Err(VeracityError::Dispatcher(reason.to_string())));
            }
        }
    }
}

#[async_trait::async_trait]
impl Actor for BatchDispatcher {
    type Msg = DispatchMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            DispatchMsg::Submit { text, reply } => {
                let key = fingerprint(&text, self.settings.fingerprint_len);
                if let Some(hit) = self.cache.get(&key) {
                    let _ = reply.send(Ok(hit));
                    return Ok(());
                }
                if let Some(pending) = self.waiters.get_mut(&key) {
                    pending.push(reply);
                    tracing::trace!("dispatch.coalesced");
                    return Ok(());
                }
                self.waiters.insert(key.clone(), vec![reply]);
                self.queue.push_back(Queued { key, text });
                self.arm_timer(ctx);
            }
            DispatchMsg::Tick => {
                self.timer_pending = false;
                if !self.in_flight {
                    self.dispatch_chunk(ctx);
                }
            }
            DispatchMsg::Completed { key, outcome } => self.resolve(&key, outcome),
            DispatchMsg::ChunkSettled => {
                self.in_flight = false;
                tracing::debug!(remaining = self.queue.len(), "dispatch.chunk.settled");
                self.arm_timer(ctx);
            }
        }
        Ok(())
    }
}

/// Cloneable entry point to a running [`BatchDispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    addr: Addr<BatchDispatcher>,
    cache: Arc<ResultCache<AnalysisRecord>>,
    fingerprint_len: usize,
}

impl DispatcherHandle {
    /// Analyze `text`, answering from the cache when possible.
    pub async fn submit(&self, text: &str) -> Result<AnalysisRecord, VeracityError> {
        if text.trim().is_empty() {
            return Err(VeracityError::EmptyInput);
        }
        if let Some(hit) = self.cache.get(&fingerprint(text, self.fingerprint_len)) {
            tracing::debug!("dispatch.cache_hit");
            return Ok(hit);
        }
        let (reply, rx) = oneshot::channel();
        self.addr
            .send(DispatchMsg::Submit {
                text: text.to_string(),
                reply,
            })
            .await
            .map_err(|_| VeracityError::Dispatcher("mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| VeracityError::Dispatcher("reply dropped".to_string()))?
    }

    pub fn cache(&self) -> &ResultCache<AnalysisRecord> {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Start a dispatcher actor. It stops once every handle is dropped and its
/// queue has drained.
pub fn spawn_dispatcher(
    oracle: Arc<dyn AnalysisOracle>,
    cache: Arc<ResultCache<AnalysisRecord>>,
    settings: DispatchSettings,
) -> (DispatcherHandle, JoinHandle<Result<()>>) {
    let fingerprint_len = settings.fingerprint_len;
    let mailbox = settings.mailbox.max(1);
    let actor = BatchDispatcher::new(oracle, Arc::clone(&cache), settings);
    let handle = spawn_actor(actor, mailbox);
    (
        DispatcherHandle {
            addr: handle.addr,
            cache,
            fingerprint_len,
        },
        handle.task,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;
    use veracity_common::HighlightSegment;

    /// Oracle that takes 100 ms per call and records when each call started.
    struct SlowOracle {
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
        starts: Mutex<Vec<Instant>>,
    }

    impl SlowOracle {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                starts: Mutex::new(Vec::new()),
            })
        }

        /// Number of calls per distinct start instant, in time order.
        fn chunk_sizes(&self) -> Vec<usize> {
            let mut starts = self.starts.lock().unwrap().clone();
            starts.sort();
            let mut sizes: Vec<(Instant, usize)> = Vec::new();
            for at in starts {
                match sizes.last_mut() {
                    Some((t, n)) if *t == at => *n += 1,
                    _ => sizes.push((at, 1)),
                }
            }
            sizes.into_iter().map(|(_, n)| n).collect()
        }
    }

    #[async_trait::async_trait]
    impl AnalysisOracle for SlowOracle {
        async fn analyze(&self, text: &str) -> Result<AnalysisRecord, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.starts.lock().unwrap().push(Instant::now());
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if text.contains("bad") {
                return Err(OracleError::MalformedResponse {
                    provider: "fake".into(),
                    message: "not json".into(),
                });
            }
            let mut record = AnalysisRecord::inert();
            record.highlighted_text = vec![HighlightSegment {
                text: text.to_string(),
                kind: veracity_common::HighlightKind::Neutral,
                tooltip: None,
            }];
            Ok(record)
        }
    }

    fn start(oracle: Arc<SlowOracle>) -> DispatcherHandle {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(300), 100));
        let (handle, _task) = spawn_dispatcher(oracle, cache, DispatchSettings::default());
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn second_submission_is_served_from_cache() {
        let oracle = SlowOracle::new();
        let handle = start(oracle.clone());

        let first = handle.submit("The moon is made of cheese").await.unwrap();
        let second = handle.submit("  the MOON is made of cheese ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_duplicates_share_one_call() {
        let oracle = SlowOracle::new();
        let handle = start(oracle.clone());

        let (a, b) = tokio::join!(handle.submit("same claim"), handle.submit("same claim"));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_split_into_bounded_chunks() {
        let oracle = SlowOracle::new();
        let handle = start(oracle.clone());

        let texts: Vec<String> = (0..12).map(|i| format!("claim number {i}")).collect();
        let results =
            futures::future::join_all(texts.iter().map(|t| handle.submit(t))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 12);
        assert_eq!(oracle.chunk_sizes(), vec![5, 5, 2]);
        assert!(oracle.peak.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_collects_near_simultaneous_submissions() {
        let oracle = SlowOracle::new();
        let handle = start(oracle.clone());
        let began = Instant::now();

        let results = futures::future::join_all(
            ["one", "two", "three"].into_iter().map(|t| handle.submit(t)),
        )
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(oracle.chunk_sizes(), vec![3]);
        let first_start = oracle.starts.lock().unwrap()[0];
        let waited = first_start - began;
        assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_affect_siblings() {
        let oracle = SlowOracle::new();
        let handle = start(oracle.clone());

        let (ok1, bad, ok2) = tokio::join!(
            handle.submit("fine text"),
            handle.submit("bad text"),
            handle.submit("more fine text"),
        );
        assert!(ok1.is_ok());
        assert!(ok2.is_ok());
        match bad {
            Err(VeracityError::Oracle(e)) => {
                assert_eq!(e.kind(), veracity_common::OracleErrorKind::MalformedResponse)
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
        assert!(handle.cache().get(&fingerprint("bad text", 500)).is_none());
    }

    #[tokio::test]
    async fn whitespace_is_rejected_before_queueing() {
        let oracle = SlowOracle::new();
        let handle = start(oracle.clone());
        assert!(matches!(
            handle.submit("  \n\t").await,
            Err(VeracityError::EmptyInput)
        ));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }
}
