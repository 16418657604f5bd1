//! Analysis pipeline built on a small actor runtime.
//!
//! - [`dispatch`]: debounced, bounded-concurrency dispatcher for free text
//! - [`cache`]: TTL + capacity bounded result store
//! - [`reddit`] / [`youtube`]: fetch-and-analyze monitors per platform
//! - [`narrative`]: clustering of analyzed items into candidate campaigns
pub mod actor;
pub mod batch;
pub mod cache;
pub mod dispatch;
pub mod narrative;
pub mod reddit;
pub mod youtube;

pub use batch::{BatchOptions, Progress};
pub use cache::{fingerprint, ResultCache};
pub use dispatch::{spawn_dispatcher, DispatchSettings, DispatcherHandle};
pub use narrative::{detect_clusters, trending_topics, ClusterCandidate, TrendingTopic};
pub use reddit::RedditMonitor;
pub use youtube::YouTubeMonitor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use veracity_common::{AnalysisRecord, GroupingKey, ThreatLevel};
use veracity_social::reddit::{RedditComment, RedditPost};
use veracity_social::youtube::extract::watch_url;
use veracity_social::youtube::{YouTubeComment, YouTubeVideo};

/// Number of comments kept on a stored YouTube result.
pub const STORED_VIDEO_COMMENTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditAnalysisResult {
    pub post_id: String,
    pub subreddit: String,
    pub title: String,
    pub post_text: String,
    pub top_comments: Vec<RedditComment>,
    pub post_url: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_cluster_id: Option<String>,
    #[serde(flatten)]
    pub analysis: AnalysisRecord,
}

impl RedditAnalysisResult {
    pub fn new(post: &RedditPost, top_comments: Vec<RedditComment>, analysis: AnalysisRecord) -> Self {
        Self {
            post_id: post.id.clone(),
            subreddit: post.subreddit.clone(),
            title: post.title.clone(),
            post_text: post.selftext.clone(),
            top_comments,
            post_url: post.permalink.clone(),
            analyzed_at: Utc::now(),
            narrative_cluster_id: None,
            analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouTubeAnalysisResult {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: String,
    pub view_count: u64,
    pub comment_count: u64,
    pub thumbnail_url: String,
    pub top_comments: Vec<YouTubeComment>,
    pub video_url: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_cluster_id: Option<String>,
    #[serde(flatten)]
    pub analysis: AnalysisRecord,
}

impl YouTubeAnalysisResult {
    pub fn new(video: &YouTubeVideo, mut comments: Vec<YouTubeComment>, analysis: AnalysisRecord) -> Self {
        comments.truncate(STORED_VIDEO_COMMENTS);
        Self {
            video_id: video.id.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            channel_title: video.channel_title.clone(),
            published_at: video.published_at.clone(),
            view_count: video.view_count,
            comment_count: video.comment_count,
            thumbnail_url: video.thumbnail_url.clone(),
            top_comments: comments,
            video_url: watch_url(&video.id),
            analyzed_at: Utc::now(),
            narrative_cluster_id: None,
            analysis,
        }
    }
}

/// A group of analyzed items sharing a community or a risk pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeCluster {
    pub id: String,
    pub grouping: GroupingKey,
    /// Container name or risk signature.
    pub key: String,
    pub theme: String,
    pub member_ids: Vec<String>,
    pub average_fake_risk: f64,
    pub average_threat_level: ThreatLevel,
    pub detected_at: DateTime<Utc>,
}
