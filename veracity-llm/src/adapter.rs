use crate::retry::RetryPolicy;
use crate::schema::parse_analysis;
use crate::traits::{AnalysisOracle, AnalysisPrompt, LlmClient};
use async_trait::async_trait;
use std::sync::Arc;
use veracity_common::{AnalysisRecord, OracleError};

/// Primary/secondary oracle with per-provider retry and rate-limit failover.
///
/// The primary is tried under its own retry budget. Only a rate-limit
/// failure that survives that budget hands the request to the secondary,
/// which gets a fresh budget of its own. Any other error surfaces as-is.
pub struct OracleAdapter {
    primary: Arc<dyn LlmClient>,
    secondary: Option<Arc<dyn LlmClient>>,
    retry: RetryPolicy,
}

impl OracleAdapter {
    pub fn new(primary: Arc<dyn LlmClient>) -> Self {
        Self {
            primary,
            secondary: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn LlmClient>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn call(
        &self,
        client: &dyn LlmClient,
        prompt: &AnalysisPrompt,
    ) -> Result<AnalysisRecord, OracleError> {
        let provider = client.provider_name();
        let response = self
            .retry
            .run(provider, || client.generate(prompt))
            .await?;
        tracing::debug!(
            provider,
            model = response.model.as_deref().unwrap_or(client.model_name()),
            tokens_used = ?response.tokens_used,
            "oracle.response"
        );
        let record = parse_analysis(provider, &response.text)?;
        if !record.reconstructs(&prompt.input) {
            tracing::warn!(
                provider,
                fragments = record.highlighted_text.len(),
                "oracle.highlight_mismatch"
            );
        }
        Ok(record)
    }
}

#[async_trait]
impl AnalysisOracle for OracleAdapter {
    async fn analyze(&self, text: &str) -> Result<AnalysisRecord, OracleError> {
        let prompt = AnalysisPrompt::for_text(text);
        match self.call(self.primary.as_ref(), &prompt).await {
            Ok(record) => Ok(record),
            Err(err) if err.is_rate_limited() => match &self.secondary {
                Some(secondary) => {
                    tracing::info!(
                        from = self.primary.provider_name(),
                        to = secondary.provider_name(),
                        reason = %err,
                        "oracle.failover"
                    );
                    self.call(secondary.as_ref(), &prompt).await
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}
