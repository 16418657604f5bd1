//! Fetch-and-analyze pipeline for Reddit posts.
use crate::batch::{run_chunked, BatchOptions, Progress};
use crate::cache::ResultCache;
use crate::narrative::detect_clusters;
use crate::{NarrativeCluster, RedditAnalysisResult};
use std::sync::Arc;
use veracity_common::{AnalysisRecord, ClusterPolicy, ItemFailurePolicy, VeracityError};
use veracity_llm::AnalysisOracle;
use veracity_social::reddit::extract::analysis_text;
use veracity_social::reddit::{RedditApi, RedditPost};

pub struct RedditMonitor {
    api: RedditApi,
    oracle: Arc<dyn AnalysisOracle>,
    cache: ResultCache<RedditAnalysisResult>,
    options: BatchOptions,
    clustering: ClusterPolicy,
}

impl RedditMonitor {
    pub fn new(
        api: RedditApi,
        oracle: Arc<dyn AnalysisOracle>,
        cache: ResultCache<RedditAnalysisResult>,
    ) -> Self {
        Self {
            api,
            oracle,
            cache,
            options: BatchOptions::default(),
            clustering: ClusterPolicy::by_container(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_clustering(mut self, policy: ClusterPolicy) -> Self {
        self.clustering = policy;
        self
    }

    pub fn api(&self) -> &RedditApi {
        &self.api
    }

    pub fn cache(&self) -> &ResultCache<RedditAnalysisResult> {
        &self.cache
    }

    /// Analyze one post together with its top comments. Cached per post id.
    pub async fn analyze_post(&self, post: &RedditPost) -> Result<RedditAnalysisResult, VeracityError> {
        let key = format!("reddit_{}", post.id);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(post_id = %post.id, "reddit.analysis.cache_hit");
            return Ok(hit);
        }

        let comments = if self.options.include_comments && post.num_comments > 0 {
            self.api
                .fetch_post_comments(&post.subreddit, &post.id, self.options.comment_limit)
                .await
        } else {
            Vec::new()
        };
        let text = analysis_text(post, &comments);
        let analysis = self.oracle.analyze(&text).await?;

        let result = RedditAnalysisResult::new(post, comments, analysis);
        self.cache.put(key, result.clone());
        Ok(result)
    }

    /// Analyze `posts` in chunks of `batch_size`, reporting progress after each
    /// chunk. Failed items follow `on_item_failure`.
    pub async fn analyze_posts(
        &self,
        posts: Vec<RedditPost>,
        progress: Option<Progress<'_>>,
    ) -> Vec<RedditAnalysisResult> {
        let outcomes = run_chunked(
            posts,
            self.options.batch_size,
            self.options.chunk_delay,
            progress,
            |post| async move {
                let outcome = self.analyze_post(&post).await;
                (post, outcome)
            },
        )
        .await;

        outcomes
            .into_iter()
            .filter_map(|(post, outcome)| match outcome {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!(post_id = %post.id, error = %e, "reddit.analysis.failed");
                    match self.options.on_item_failure {
                        ItemFailurePolicy::Drop => None,
                        ItemFailurePolicy::SubstituteDefault => Some(RedditAnalysisResult::new(
                            &post,
                            Vec::new(),
                            AnalysisRecord::inert(),
                        )),
                    }
                }
            })
            .collect()
    }

    pub fn detect_clusters(&self, results: &mut [RedditAnalysisResult]) -> Vec<NarrativeCluster> {
        detect_clusters(results, &self.clustering)
    }
}
