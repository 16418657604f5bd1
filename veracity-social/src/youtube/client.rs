//! YouTube Data API v3 client keyed by a `key=` query parameter.
use crate::youtube::extract::{comment_from_thread, video_from_item};
use crate::youtube::types::{
    ApiErrorEnvelope, CommentThreadsResponse, SearchResponse, VideosResponse, YouTubeComment,
    YouTubeOrder, YouTubeVideo,
};
use crate::{FetchOptions, source_error};
use std::borrow::Cow;
use veracity_common::{Platform, SourceError, VeracityError};
use veracity_http::{Auth, HttpClient, HttpError, RequestOpts};

const YOUTUBE_BASE: &str = "https://www.googleapis.com/youtube/v3/";
const MAX_SEARCH_RESULTS: u32 = 50;
const MAX_COMMENT_RESULTS: u32 = 100;

#[derive(Clone)]
pub struct YouTubeApi {
    http: HttpClient,
    api_key: String,
}

/// `errors[0].reason` from a Google error body, if present.
fn error_reason(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()?
        .error
        .errors
        .into_iter()
        .next()
        .map(|e| e.reason)
        .filter(|r| !r.is_empty())
}

/// YouTube reports quota exhaustion as a 403; treat it as rate limiting.
fn youtube_error(err: HttpError) -> SourceError {
    if let HttpError::Api {
        status,
        message,
        body,
        ..
    } = &err
    {
        if status.as_u16() == 403 {
            let reason = error_reason(body);
            if reason.as_deref() == Some("quotaExceeded") {
                return SourceError::RateLimited {
                    platform: Platform::YouTube,
                    message: message.clone(),
                };
            }
            return SourceError::Forbidden {
                platform: Platform::YouTube,
                message: message.clone(),
                reason,
            };
        }
    }
    source_error(Platform::YouTube, err)
}

impl YouTubeApi {
    /// Fails with a configuration error when `api_key` is empty.
    pub fn new(api_key: &str, options: &FetchOptions) -> Result<Self, VeracityError> {
        if api_key.trim().is_empty() {
            return Err(VeracityError::Config(
                "YouTube API key is not configured".to_string(),
            ));
        }
        let http = options.http_client(Platform::YouTube, YOUTUBE_BASE)?;
        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
        })
    }

    fn opts<'a>(&'a self, query: Vec<(&'a str, Cow<'a, str>)>) -> RequestOpts<'a> {
        RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(&self.api_key),
            }),
            query: Some(query),
            ..Default::default()
        }
    }

    /// Keyword search followed by one details lookup for the hits.
    pub async fn search_videos(
        &self,
        query: &str,
        max_results: u32,
        order: YouTubeOrder,
    ) -> Result<Vec<YouTubeVideo>, SourceError> {
        let max = max_results.clamp(1, MAX_SEARCH_RESULTS).to_string();
        let params = vec![
            ("part", Cow::from("snippet")),
            ("q", query.into()),
            ("type", "video".into()),
            ("maxResults", max.into()),
            ("order", order.as_str().into()),
        ];
        let search: SearchResponse = self
            .http
            .get_json("search", self.opts(params))
            .await
            .map_err(youtube_error)?;

        let ids: Vec<String> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect();
        if ids.is_empty() {
            tracing::debug!(query, "youtube.search.empty");
            return Ok(Vec::new());
        }

        let params = vec![
            ("part", Cow::from("snippet,statistics,contentDetails")),
            ("id", ids.join(",").into()),
        ];
        let details: VideosResponse = self
            .http
            .get_json("videos", self.opts(params))
            .await
            .map_err(youtube_error)?;

        let videos: Vec<YouTubeVideo> = details.items.into_iter().map(video_from_item).collect();
        tracing::debug!(query, %order, count = videos.len(), "youtube.search.fetched");
        Ok(videos)
    }

    /// Top-level comment threads ordered by relevance. Disabled comments
    /// yield an empty list.
    pub async fn fetch_video_comments(
        &self,
        video_id: &str,
        max_results: u32,
    ) -> Result<Vec<YouTubeComment>, SourceError> {
        let max = max_results.clamp(1, MAX_COMMENT_RESULTS).to_string();
        let params = vec![
            ("part", Cow::from("snippet")),
            ("videoId", video_id.into()),
            ("maxResults", max.into()),
            ("order", "relevance".into()),
            ("textFormat", "plainText".into()),
        ];
        let resp: Result<CommentThreadsResponse, _> =
            self.http.get_json("commentThreads", self.opts(params)).await;
        match resp {
            Ok(threads) => Ok(threads.items.into_iter().map(comment_from_thread).collect()),
            Err(err) => match youtube_error(err) {
                SourceError::Forbidden { reason, .. }
                    if reason.as_deref() == Some("commentsDisabled") =>
                {
                    tracing::debug!(video_id, "youtube.comments.disabled");
                    Ok(Vec::new())
                }
                other => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_is_read_from_first_error() {
        let body = r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"quotaExceeded","domain":"youtube.quota"}]}}"#;
        assert_eq!(error_reason(body).as_deref(), Some("quotaExceeded"));
        assert_eq!(error_reason("not json"), None);
    }

    #[test]
    fn empty_key_is_config_error() {
        let err = YouTubeApi::new(" ", &FetchOptions::default()).err().unwrap();
        assert!(matches!(err, VeracityError::Config(_)));
    }
}
