//! Minimal HTTP client with safe logging, retries, pacing, and bearer or query auth.
//!
//! - Client-wide timeout, retries and backoff; per-request headers, `Auth` and query params
//! - Redacts sensitive query params and never logs secret values
//! - Retries network errors, 429 and 5xx with a pluggable [`Backoff`] and
//!   `Retry-After` support; other 4xx statuses are returned immediately
//! - Optional [`RequestPacer`] spacing every attempt by a minimum interval
//! - Optional *raw* request/response logging via `VERACITY_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), veracity_http::HttpError> {
//! let client = veracity_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", veracity_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! headers, body snippets (truncated), retries and final errors. Raw
//! request/response lines go to target `http.raw` when `VERACITY_HTTP_RAW=1`.

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

mod pacer;

pub use pacer::RequestPacer;
pub use reqwest::StatusCode;
pub use reqwest::header;

const RAW_ENV: &str = "VERACITY_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_key(k: &str) -> bool {
    SECRET_QUERY_KEYS.contains(&k.to_ascii_lowercase().as_str())
}

/// Copy of `url` with secret query values masked, for logs only.
fn redacted_url(url: &Url) -> Url {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret_key(&k) {
                "<redacted>".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    shown
}

/// Lossy UTF-8 view of at most `RAW_MAX_BODY` bytes.
fn raw_body(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    let truncated = bytes.len() > RAW_MAX_BODY;
    (
        String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]),
        truncated,
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
        /// Parsed `Retry-After` header, when the server sent one.
        retry_after: Option<Duration>,
        /// Full response body, for callers that classify provider errors.
        body: String,
    },
}

// ==============================
// Auth, backoff & request options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use veracity_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Auth via query param (e.g. YouTube `key=`)
    Query {
        name: &'a str,
        value: Cow<'a, str>,
    },
}

/// Delay schedule between retry attempts. `attempt` is 1-based.
///
/// ```
/// use std::time::Duration;
/// use veracity_http::Backoff;
///
/// let linear = Backoff::Linear { step: Duration::from_secs(2) };
/// assert_eq!(linear.delay(3, false), Duration::from_secs(6));
///
/// let exp = Backoff::default();
/// assert_eq!(exp.delay(2, false), Duration::from_millis(400));
/// assert_eq!(exp.delay(1, true), Duration::from_millis(1100));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^(attempt-1)`, floored at `floor_429` for rate-limit responses.
    Exponential { base: Duration, floor_429: Duration },
    /// `step * attempt`.
    Linear { step: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base: Duration::from_millis(200),
            floor_429: Duration::from_millis(1100),
        }
    }
}

impl Backoff {
    pub fn delay(&self, attempt: usize, rate_limited: bool) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Backoff::Exponential { base, floor_429 } => {
                let shift = (attempt - 1).min(16) as u32;
                let exp = base.saturating_mul(1u32 << shift);
                if rate_limited { exp.max(floor_429) } else { exp }
            }
            Backoff::Linear { step } => step.saturating_mul(attempt as u32),
        }
    }
}

/// Per-request auth, extra headers and query parameters.
///
/// ```
/// use veracity_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
///
/// let opts = RequestOpts {
///     query: Some(vec![("part", Cow::Borrowed("snippet"))]),
///     auth: Some(Auth::Query {
///         name: "key",
///         value: Cow::Borrowed("demo"),
///     }),
///     ..Default::default()
/// };
///
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
    pub backoff: Backoff,
    pacer: Option<Arc<RequestPacer>>,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use veracity_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
            backoff: Backoff::default(),
            pacer: None,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use veracity_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?.with_retries(5);
    /// assert_eq!(client.max_retries, 5);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Space every attempt (retries included) through `pacer`.
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json_internal::<(), T>(Method::GET, path, None, opts)
            .await
    }

    /// POST JSON with per-request options.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json_internal(Method::POST, path, Some(body), opts)
            .await
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    async fn request_json_internal<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut url = self.resolve(path)?;

        // Query params (auth-by-query included) are baked into the URL once.
        {
            let mut pairs = opts.query.clone().unwrap_or_default();
            if let Some(Auth::Query { name, value }) = &opts.auth {
                pairs.push((*name, value.clone()));
            }
            if !pairs.is_empty() {
                let mut qp = url.query_pairs_mut();
                for (k, v) in &pairs {
                    qp.append_pair(k, v);
                }
            }
        }

        let request_body_bytes: Option<Vec<u8>> = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?),
            None => None,
        };

        let bearer = match &opts.auth {
            Some(Auth::Bearer(tok)) => Some(clean_bearer(tok)?),
            _ => None,
        };

        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            Some(Auth::Query { .. }) => "query",
            None => "none",
        };
        let shown_url = redacted_url(&url);
        let redacted_q: Vec<(Cow<'_, str>, Cow<'_, str>)> = shown_url.query_pairs().collect();

        let max_retries = self.max_retries;
        let backoff = self.backoff;
        let timeout = self.default_timeout;
        let req_id = uuid::Uuid::new_v4().simple().to_string();
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if let Some(bytes) = &request_body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }

            if let Some(pacer) = &self.pacer {
                pacer.wait().await;
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                auth_kind,
                has_body=%body.is_some(),
                "http.request.start"
            );

            if raw_enabled() {
                let (text, truncated) = raw_body(request_body_bytes.as_deref().unwrap_or_default());
                let extra: Vec<&str> = opts
                    .headers
                    .iter()
                    .flat_map(|h| h.keys().map(|k| k.as_str()))
                    .collect();
                tracing::debug!(
                    target: "http.raw",
                    %req_id,
                    %method,
                    url=%shown_url,
                    extra_headers=?extra,
                    body=%text,
                    truncated,
                    "request"
                );
            }

            let t0 = std::time::Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes().await.map(|b| (status, headers, b))
                }
                Err(err) => Err(err),
            };
            let (status, headers, bytes) = match sent {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff.delay(attempt, false);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        message=%message,
                        "http.network_error"
                    );
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let req_hdr_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let remain = headers
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok());

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%req_hdr_id,
                rate_limit.remaining=?remain,
                "http.response.headers"
            );

            if raw_enabled() {
                let (text, truncated) = raw_body(&bytes);
                let names: Vec<&str> = headers.keys().map(|k| k.as_str()).collect();
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    duration_ms=dur_ms,
                    headers=?names,
                    body=%text,
                    truncated,
                    "response"
                );
            }

            let snippet = snip_body(&bytes);
            tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id=%req_id,
                        serde_line=%e.line(),
                        serde_col=%e.column(),
                        serde_err=%e.to_string(),
                        body_snippet=%snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message_multi(&bytes);
            let retry_after = retry_after_delay(&headers);
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            let is_5xx = status.is_server_error();

            if (is_429 || is_5xx) && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after {
                    Some(d) if is_429 => d,
                    _ => backoff.delay(attempt, is_429),
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_ms=?retry_after.map(|d| d.as_millis() as u64),
                    message=%message,
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%req_hdr_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: req_hdr_id,
                retry_after,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

/// Pull a human-readable message out of the common error envelopes.
///
/// Handles `{"error":{"message":..}}` (OpenAI/Groq, Google APIs),
/// `{"message":..}`/`{"error":".."}` (Reddit), falling back to a body snippet.
pub fn extract_error_message_multi(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct NestedEnv {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: serde_json::Value,
    }

    if let Ok(env) = serde_json::from_slice::<NestedEnv>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.detail.is_empty() {
            return m.detail;
        }
        match m.error {
            serde_json::Value::String(s) if !s.is_empty() => return s,
            serde_json::Value::Number(n) => return format!("error {n}"),
            _ => {}
        }
    }
    snip_body(body)
}

fn retry_after_delay(h: &HeaderMap) -> Option<Duration> {
    let secs: f64 = h
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        snip.truncate(floor_char_boundary(&snip, 500));
        snip.push_str("...");
    }
    snip
}

/// Normalize a configured token: drop surrounding quotes and any whitespace
/// pasted in with it, then make sure it still forms a valid header.
fn clean_bearer(raw: &str) -> Result<String, HttpError> {
    let token: String = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if !token.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(HttpError::Build(
            "API key must be printable ASCII".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(token)
}
