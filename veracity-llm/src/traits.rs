use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veracity_common::{AnalysisRecord, OracleError};

/// Raw provider output before schema validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// One analysis request as handed to a provider.
///
/// `input` is the untouched text being analyzed; `user` is the provider-ready
/// message wrapping it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
    pub input: String,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Stable provider tag used in errors and logs (`gemini`, `groq`).
    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> &str;

    /// Issue one generation call. Classification of the failure is the
    /// provider's job; parsing the output is not.
    async fn generate(&self, prompt: &AnalysisPrompt) -> Result<LlmResponse, OracleError>;

    /// Check if the LLM service is reachable with the configured credentials.
    async fn health_check(&self) -> Result<bool, OracleError> {
        let ping = AnalysisPrompt {
            system: "Respond with a JSON object {\"ok\": true}.".to_string(),
            user: "ping".to_string(),
            input: "ping".to_string(),
            temperature: 0.0,
        };
        match self.generate(&ping).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(provider = self.provider_name(), error = %e, "oracle.health_check_failed");
                Ok(false)
            }
        }
    }
}

/// Text in, validated analysis out.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalysisRecord, OracleError>;
}
