//! Oracle adapter: provider clients and the failover/retry layer above them.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, concrete
//! provider implementations for Gemini (primary) and Groq (secondary), and
//! [`OracleAdapter`], which turns a piece of text into a validated
//! [`veracity_common::AnalysisRecord`].
//!
//! # Examples
//! ```no_run
//! use veracity_common::{LlmConfig, Result};
//! use veracity_llm::{build_adapter, AnalysisOracle, RetryPolicy};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let primary = LlmConfig::Gemini {
//!     api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
//!     model: veracity_common::DEFAULT_GEMINI_MODEL.into(),
//!     base_url: None,
//! };
//! let oracle = build_adapter(&primary, None, RetryPolicy::default())?;
//! let record = oracle.analyze("Scientists confirm the moon is hollow").await?;
//! println!("{}", record.threat_level);
//! # Ok(())
//! # }
//! ```
pub mod adapter;
pub mod gemini;
pub mod groq;
pub mod prompt;
pub mod retry;
pub mod schema;
pub mod traits;

pub use adapter::OracleAdapter;
pub use retry::RetryPolicy;
pub use traits::{AnalysisOracle, AnalysisPrompt, LlmClient, LlmResponse};

use gemini::GeminiClient;
use groq::GroqClient;
use std::sync::Arc;
use veracity_common::{LlmConfig, VeracityError};

/// Construct a provider client, rejecting missing credentials up front.
pub fn build_client(config: &LlmConfig) -> veracity_common::Result<Arc<dyn LlmClient>> {
    if config.api_key().trim().is_empty() {
        return Err(VeracityError::Config(format!(
            "{} API key is missing",
            config.provider_name()
        )));
    }
    match config {
        LlmConfig::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let mut client = GeminiClient::new(api_key.clone(), model.clone())?;
            if let Some(url) = base_url {
                client = client.with_base_url(url.as_str());
            }
            Ok(Arc::new(client))
        }
        LlmConfig::Groq {
            api_key,
            model,
            base_url,
        } => {
            let client = match base_url {
                Some(url) => GroqClient::with_base_url(api_key.clone(), model.clone(), url)?,
                None => GroqClient::new(api_key.clone(), model.clone())?,
            };
            Ok(Arc::new(client))
        }
    }
}

/// Wire a primary and optional secondary provider into an [`OracleAdapter`].
pub fn build_adapter(
    primary: &LlmConfig,
    secondary: Option<&LlmConfig>,
    retry: RetryPolicy,
) -> veracity_common::Result<OracleAdapter> {
    let mut adapter = OracleAdapter::new(build_client(primary)?).with_retry(retry);
    if let Some(cfg) = secondary {
        adapter = adapter.with_secondary(build_client(cfg)?);
    }
    tracing::info!(
        primary = primary.provider_name(),
        secondary = secondary.map(|c| c.provider_name()),
        max_retries = retry.max_retries,
        "oracle.ready"
    );
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secondary_key_is_a_config_error() {
        let primary = LlmConfig::Gemini {
            api_key: "k".into(),
            model: "m".into(),
            base_url: None,
        };
        let secondary = LlmConfig::Groq {
            api_key: String::new(),
            model: "m".into(),
            base_url: None,
        };
        let err = build_adapter(&primary, Some(&secondary), RetryPolicy::default())
            .err()
            .unwrap();
        assert!(matches!(err, VeracityError::Config(msg) if msg.contains("groq")));
    }

    #[test]
    fn default_config_has_no_key() {
        assert!(build_client(&LlmConfig::default()).is_err());
    }
}
