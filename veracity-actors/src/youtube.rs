//! Fetch-and-analyze pipeline for YouTube videos.
use crate::batch::{run_chunked, BatchOptions, Progress};
use crate::cache::ResultCache;
use crate::narrative::{detect_clusters, trending_topics, TrendingTopic};
use crate::{NarrativeCluster, YouTubeAnalysisResult};
use std::sync::Arc;
use veracity_common::{AnalysisRecord, ClusterPolicy, ItemFailurePolicy, VeracityError};
use veracity_llm::AnalysisOracle;
use veracity_social::youtube::extract::analysis_text;
use veracity_social::youtube::{YouTubeApi, YouTubeComment, YouTubeVideo};

pub const TRENDING_MIN_FAKE_RISK: f64 = 50.0;
pub const TRENDING_LIMIT: usize = 5;

pub struct YouTubeMonitor {
    api: YouTubeApi,
    oracle: Arc<dyn AnalysisOracle>,
    cache: ResultCache<YouTubeAnalysisResult>,
    options: BatchOptions,
    clustering: ClusterPolicy,
}

impl YouTubeMonitor {
    pub fn new(
        api: YouTubeApi,
        oracle: Arc<dyn AnalysisOracle>,
        cache: ResultCache<YouTubeAnalysisResult>,
    ) -> Self {
        Self {
            api,
            oracle,
            cache,
            options: BatchOptions {
                comment_limit: 30,
                on_item_failure: ItemFailurePolicy::SubstituteDefault,
                ..BatchOptions::default()
            },
            clustering: ClusterPolicy::by_risk_signature(),
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

    pub fn api(&self) -> &YouTubeApi {
        &self.api
    }

    pub fn cache(&self) -> &ResultCache<YouTubeAnalysisResult> {
        &self.cache
    }

    /// Analyze one video with already fetched comments. Cached per video id.
    pub async fn analyze_video(
        &self,
        video: &YouTubeVideo,
        comments: Vec<YouTubeComment>,
    ) -> Result<YouTubeAnalysisResult, VeracityError> {
        let key = format!("youtube_{}", video.id);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(video_id = %video.id, "youtube.analysis.cache_hit");
            return Ok(hit);
        }
        let text = analysis_text(video, &comments);
        let analysis = self.oracle.analyze(&text).await?;

        let result = YouTubeAnalysisResult::new(video, comments, analysis);
        self.cache.put(key, result.clone());
        Ok(result)
    }

    async fn fetch_and_analyze(&self, video: &YouTubeVideo) -> Result<YouTubeAnalysisResult, VeracityError> {
        let comments = if self.options.include_comments {
            self.api
                .fetch_video_comments(&video.id, self.options.comment_limit)
                .await?
        } else {
            Vec::new()
        };
        self.analyze_video(video, comments).await
    }

    /// Fetch comments and analyze each video in chunks of `batch_size`.
    /// Failed items follow `on_item_failure`.
    pub async fn analyze_videos(
        &self,
        videos: Vec<YouTubeVideo>,
        progress: Option<Progress<'_>>,
    ) -> Vec<YouTubeAnalysisResult> {
        let outcomes = run_chunked(
            videos,
            self.options.batch_size,
            self.options.chunk_delay,
            progress,
            |video| async move {
                let outcome = self.fetch_and_analyze(&video).await;
                (video, outcome)
            },
        )
        .await;

        outcomes
            .into_iter()
            .filter_map(|(video, outcome)| match outcome {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!(video_id = %video.id, error = %e, "youtube.analysis.failed");
                    match self.options.on_item_failure {
                        ItemFailurePolicy::Drop => None,
                        ItemFailurePolicy::SubstituteDefault => Some(YouTubeAnalysisResult::new(
                            &video,
                            Vec::new(),
                            AnalysisRecord::inert(),
                        )),
                    }
                }
            })
            .collect()
    }

    pub fn detect_clusters(&self, results: &mut [YouTubeAnalysisResult]) -> Vec<NarrativeCluster> {
        detect_clusters(results, &self.clustering)
    }

    pub fn trending_topics(&self, results: &[YouTubeAnalysisResult]) -> Vec<TrendingTopic> {
        trending_topics(results, TRENDING_MIN_FAKE_RISK, TRENDING_LIMIT)
    }
}
