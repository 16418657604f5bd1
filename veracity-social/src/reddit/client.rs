//! Thin wrapper around Reddit's public `.json` listing endpoints.
use crate::reddit::extract::{comments_from_listing, posts_from_listing};
use crate::reddit::types::{Listing, RedditComment, RedditPost, RedditSort};
use crate::{FetchOptions, source_error};
use std::borrow::Cow;
use veracity_common::{Platform, SourceError};
use veracity_http::header::{HeaderMap, HeaderValue, USER_AGENT};
use veracity_http::{HttpClient, RequestOpts};

const REDDIT_BASE: &str = "https://www.reddit.com/";
const MAX_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct RedditApi {
    http: HttpClient,
    headers: HeaderMap,
}

impl RedditApi {
    pub fn new(user_agent: &str, options: &FetchOptions) -> Result<Self, SourceError> {
        let http = options.http_client(Platform::Reddit, REDDIT_BASE)?;
        let mut headers = HeaderMap::new();
        let ua = HeaderValue::from_str(user_agent).map_err(|e| SourceError::Transport {
            platform: Platform::Reddit,
            message: format!("invalid user agent: {e}"),
        })?;
        headers.insert(USER_AGENT, ua);
        Ok(Self { http, headers })
    }

    fn opts<'a>(&self, query: Vec<(&'a str, Cow<'a, str>)>) -> RequestOpts<'a> {
        RequestOpts {
            headers: Some(self.headers.clone()),
            query: Some(query),
            ..Default::default()
        }
    }

    /// `GET r/{subreddit}/{sort}.json?limit=`
    pub async fn fetch_subreddit_posts(
        &self,
        subreddit: &str,
        sort: RedditSort,
        limit: u32,
    ) -> Result<Vec<RedditPost>, SourceError> {
        let subreddit = normalize_subreddit(subreddit);
        let path = format!("r/{subreddit}/{sort}.json");
        let limit = limit.clamp(1, MAX_LIMIT).to_string();
        let listing: Listing = self
            .http
            .get_json(&path, self.opts(vec![("limit", limit.into())]))
            .await
            .map_err(|e| source_error(Platform::Reddit, e))?;
        let posts = posts_from_listing(listing);
        tracing::debug!(subreddit, %sort, count = posts.len(), "reddit.posts.fetched");
        Ok(posts)
    }

    /// Keyword search, site-wide or restricted to one subreddit.
    pub async fn search_posts(
        &self,
        query: &str,
        subreddit: Option<&str>,
        limit: u32,
    ) -> Result<Vec<RedditPost>, SourceError> {
        let limit = limit.clamp(1, MAX_LIMIT).to_string();
        let mut params: Vec<(&str, Cow<'_, str>)> = vec![("q", query.into())];
        let path = match subreddit.map(normalize_subreddit) {
            Some(sub) => {
                params.push(("restrict_sr", "on".into()));
                format!("r/{sub}/search.json")
            }
            None => "search.json".to_string(),
        };
        params.push(("limit", limit.into()));
        params.push(("sort", "relevance".into()));

        let listing: Listing = self
            .http
            .get_json(&path, self.opts(params))
            .await
            .map_err(|e| source_error(Platform::Reddit, e))?;
        let posts = posts_from_listing(listing);
        tracing::debug!(query, ?subreddit, count = posts.len(), "reddit.search.fetched");
        Ok(posts)
    }

    /// Top-level comments of one post. Failures are logged and yield an
    /// empty list so a post can still be analyzed on its own.
    pub async fn fetch_post_comments(
        &self,
        subreddit: &str,
        post_id: &str,
        limit: u32,
    ) -> Vec<RedditComment> {
        let subreddit = normalize_subreddit(subreddit);
        let path = format!("r/{subreddit}/comments/{post_id}.json");
        let limit_s = limit.clamp(1, MAX_LIMIT).to_string();
        let params = vec![
            ("limit", Cow::from(limit_s)),
            ("depth", "1".into()),
            ("sort", "top".into()),
        ];
        let listings: Result<Vec<Listing>, _> =
            self.http.get_json(&path, self.opts(params)).await;
        match listings {
            Ok(mut listings) if listings.len() >= 2 => {
                comments_from_listing(listings.swap_remove(1), limit as usize)
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(post_id, error = %e, "reddit.comments.failed");
                Vec::new()
            }
        }
    }
}

/// Accept `news`, `r/news` or `/r/news/`.
fn normalize_subreddit(raw: &str) -> &str {
    let s = raw.trim().trim_matches('/');
    s.strip_prefix("r/").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subreddit_prefixes_are_stripped() {
        assert_eq!(normalize_subreddit("r/news"), "news");
        assert_eq!(normalize_subreddit("/r/worldnews/"), "worldnews");
        assert_eq!(normalize_subreddit("science"), "science");
    }
}
