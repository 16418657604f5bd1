//! Wires configuration into clients, the dispatcher and the platform monitors.
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use veracity_actors::{
    BatchOptions, DispatchSettings, DispatcherHandle, RedditMonitor, ResultCache, YouTubeMonitor,
    spawn_dispatcher,
};
use veracity_config::VeracityConfig;
use veracity_llm::{AnalysisOracle, RetryPolicy, build_adapter};
use veracity_social::FetchOptions;
use veracity_social::reddit::RedditApi;
use veracity_social::youtube::YouTubeApi;

const DISPATCH_MAILBOX: usize = 1024;

pub struct Services {
    pub config: VeracityConfig,
    oracle: Arc<dyn AnalysisOracle>,
    dispatcher: DispatcherHandle,
}

impl Services {
    pub fn build(config: VeracityConfig) -> Result<Self> {
        let retry = RetryPolicy {
            max_retries: config.oracle.retry.max_retries,
            initial_delay: config.oracle.retry.initial_delay(),
            max_delay: config.oracle.retry.max_delay(),
        };
        let adapter = build_adapter(
            &config.oracle.primary,
            config.oracle.secondary.as_ref(),
            retry,
        )
        .context("failed to build oracle adapter")?;
        let oracle: Arc<dyn AnalysisOracle> = Arc::new(adapter);

        let cache = Arc::new(ResultCache::new(config.cache.ttl(), config.cache.capacity));
        let settings = DispatchSettings {
            batch_size: config.batch.size,
            debounce: config.batch.debounce(),
            fingerprint_len: config.cache.fingerprint_len,
            mailbox: DISPATCH_MAILBOX,
        };
        let (dispatcher, _task) = spawn_dispatcher(Arc::clone(&oracle), cache, settings);

        Ok(Self {
            config,
            oracle,
            dispatcher,
        })
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    pub fn reddit_monitor(&self) -> Result<RedditMonitor> {
        let s = &self.config.reddit;
        let fetch = FetchOptions {
            base_url: s.base_url.clone(),
            min_interval: Duration::from_millis(s.min_interval_ms),
            max_retries: s.max_retries,
            retry_delay: Duration::from_millis(s.retry_delay_ms),
            ..FetchOptions::default()
        };
        let api = RedditApi::new(&s.user_agent, &fetch).context("failed to build Reddit client")?;
        let cache = ResultCache::new(Duration::from_secs(s.cache_ttl_secs), s.cache_capacity);
        Ok(
            RedditMonitor::new(api, Arc::clone(&self.oracle), cache)
                .with_options(BatchOptions {
                    batch_size: s.batch_size,
                    chunk_delay: Duration::from_millis(s.chunk_delay_ms),
                    comment_limit: s.comment_limit,
                    include_comments: true,
                    on_item_failure: s.on_item_failure,
                })
                .with_clustering(s.clustering.clone()),
        )
    }

    pub fn youtube_monitor(&self) -> Result<YouTubeMonitor> {
        let s = &self.config.youtube;
        let fetch = FetchOptions {
            base_url: s.base_url.clone(),
            min_interval: Duration::from_millis(s.min_interval_ms),
            max_retries: s.max_retries,
            retry_delay: Duration::from_millis(s.retry_delay_ms),
            ..FetchOptions::default()
        };
        let api = YouTubeApi::new(&s.api_key, &fetch).context("failed to build YouTube client")?;
        let cache = ResultCache::new(Duration::from_secs(s.cache_ttl_secs), s.cache_capacity);
        Ok(
            YouTubeMonitor::new(api, Arc::clone(&self.oracle), cache)
                .with_options(BatchOptions {
                    batch_size: s.batch_size,
                    chunk_delay: Duration::from_millis(s.chunk_delay_ms),
                    comment_limit: s.comment_limit,
                    include_comments: true,
                    on_item_failure: s.on_item_failure,
                })
                .with_clustering(s.clustering.clone()),
        )
    }
}
