use crate::model::Platform;
use std::time::Duration;

/// Classification of an [`OracleError`], useful for metrics and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    RateLimited,
    ProviderError,
    MalformedResponse,
}

/// Failure from an LLM provider call.
#[derive(thiserror::Error, Debug, Clone)]
pub enum OracleError {
    /// Quota or request-rate exhaustion. Transient.
    #[error("{provider} rate limited: {message}")]
    RateLimited {
        provider: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Any other provider failure (auth, network, safety block, 5xx).
    #[error("{provider} provider error: {message}")]
    Provider { provider: String, message: String },

    /// Output did not conform to the analysis schema. Never retried.
    #[error("{provider} returned a malformed analysis: {message}")]
    MalformedResponse { provider: String, message: String },
}

impl OracleError {
    pub fn kind(&self) -> OracleErrorKind {
        match self {
            OracleError::RateLimited { .. } => OracleErrorKind::RateLimited,
            OracleError::Provider { .. } => OracleErrorKind::ProviderError,
            OracleError::MalformedResponse { .. } => OracleErrorKind::MalformedResponse,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, OracleError::RateLimited { .. })
    }

    /// Only rate limiting is worth retrying; the rest will not change on retry.
    pub fn is_transient(&self) -> bool {
        self.is_rate_limited()
    }

    /// Provider-supplied wait hint, if the error carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            OracleError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            OracleError::RateLimited { provider, .. }
            | OracleError::Provider { provider, .. }
            | OracleError::MalformedResponse { provider, .. } => provider,
        }
    }
}

/// Failure from a content-source fetcher (Reddit, YouTube).
#[derive(thiserror::Error, Debug, Clone)]
pub enum SourceError {
    #[error("{platform} resource not found: {message}")]
    NotFound { platform: Platform, message: String },

    #[error("{platform} access forbidden: {message}")]
    Forbidden {
        platform: Platform,
        message: String,
        reason: Option<String>,
    },

    #[error("{platform} rate limited: {message}")]
    RateLimited { platform: Platform, message: String },

    #[error("{platform} transport error: {message}")]
    Transport { platform: Platform, message: String },
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. } | SourceError::Transport { .. }
        )
    }
}

/// Error types used across the Veracity workspace.
#[derive(thiserror::Error, Debug)]
pub enum VeracityError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Source(#[from] SourceError),

    /// Configuration was incomplete or invalid (e.g. a missing credential).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller submitted text that is empty after trimming.
    #[error("cannot analyze empty text")]
    EmptyInput,

    /// The batch dispatcher is gone or dropped the reply.
    #[error("dispatcher unavailable: {0}")]
    Dispatcher(String),
}

impl VeracityError {
    /// `true` for "try again later" failures, `false` for "this will not succeed".
    ///
    /// ```
    /// use veracity_common::{OracleError, VeracityError};
    ///
    /// let limited = VeracityError::from(OracleError::RateLimited {
    ///     provider: "gemini".into(),
    ///     message: "quota".into(),
    ///     retry_after: None,
    /// });
    /// assert!(limited.is_retryable());
    /// assert!(!VeracityError::Config("missing key".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            VeracityError::Oracle(e) => e.is_rate_limited(),
            VeracityError::Source(e) => e.is_transient(),
            VeracityError::Dispatcher(_) => true,
            VeracityError::Config(_) | VeracityError::EmptyInput => false,
        }
    }
}

/// Convenient alias for results that use [`VeracityError`].
pub type Result<T> = std::result::Result<T, VeracityError>;
