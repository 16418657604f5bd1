//! Content source clients used by the Veracity monitors.
//!
//! Reddit (public JSON listings) and YouTube (Data API v3) are supported. Both
//! clients share the same transport policy: a per-source [`RequestPacer`]
//! holding the last-request watermark, linear retry on transport errors and
//! 429/5xx, and an immediate return on any other 4xx.
pub mod preprocess;
pub mod reddit;
pub mod youtube;

use std::sync::Arc;
use std::time::Duration;
use veracity_common::{Platform, SourceError};
use veracity_http::{Backoff, HttpClient, HttpError, RequestPacer};

/// Transport settings for one content source.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Overrides the platform's public endpoint (tests, proxies).
    pub base_url: Option<String>,
    pub min_interval: Duration,
    pub max_retries: usize,
    /// Retry `n` waits `retry_delay * n`.
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            min_interval: Duration::from_secs(2),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(15),
        }
    }
}

impl FetchOptions {
    pub(crate) fn http_client(
        &self,
        platform: Platform,
        default_base: &str,
    ) -> Result<HttpClient, SourceError> {
        let base = self.base_url.as_deref().unwrap_or(default_base);
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let client = HttpClient::new(&base)
            .map_err(|e| source_error(platform, e))?
            .with_timeout(self.timeout)
            .with_retries(self.max_retries)
            .with_backoff(Backoff::Linear {
                step: self.retry_delay,
            })
            .with_pacer(Arc::new(RequestPacer::new(self.min_interval)));
        Ok(client)
    }
}

/// Classify a transport failure the same way for every source.
pub(crate) fn source_error(platform: Platform, err: HttpError) -> SourceError {
    match err {
        HttpError::Api {
            status, message, ..
        } => match status.as_u16() {
            401 | 403 => SourceError::Forbidden {
                platform,
                message,
                reason: None,
            },
            404 => SourceError::NotFound { platform, message },
            429 => SourceError::RateLimited { platform, message },
            _ => SourceError::Transport {
                platform,
                message: format!("{status}: {message}"),
            },
        },
        other => SourceError::Transport {
            platform,
            message: other.to_string(),
        },
    }
}
