use crate::prompt::gemini_response_schema;
use crate::traits::{AnalysisPrompt, LlmClient, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use veracity_common::{OracleError, VeracityError};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
    response_schema: JsonValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

/// Google API error envelope: `{"error": {code, message, status, details}}`.
#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<JsonValue>,
}

/// Google Gemini API client.
///
/// Requires a valid API key; the base URL is overridable for tests and
/// regional endpoints.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new client using the provided API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self, VeracityError> {
        if api_key.trim().is_empty() {
            return Err(VeracityError::Config("Gemini API key is missing".to_string()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VeracityError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn provider_error(message: impl Into<String>) -> OracleError {
        OracleError::Provider {
            provider: PROVIDER.to_string(),
            message: message.into(),
        }
    }
}

/// Parse a protobuf duration such as `"7s"` or `"1.5s"`.
fn parse_proto_duration(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().strip_suffix('s')?.parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

fn retry_info_delay(details: &[JsonValue]) -> Option<Duration> {
    details
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(JsonValue::as_str)
                .is_some_and(|t| t.contains("RetryInfo"))
        })
        .find_map(|d| d.get("retryDelay").and_then(JsonValue::as_str))
        .and_then(parse_proto_duration)
}

fn header_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs: f64 = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Map a non-success Gemini response to an [`OracleError`].
fn classify_failure(
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
    body: &str,
) -> OracleError {
    let envelope = serde_json::from_str::<GeminiErrorEnvelope>(body).ok();
    let (message, api_status, details) = match envelope {
        Some(env) => (env.error.message, env.error.status, env.error.details),
        None => (body.chars().take(500).collect(), String::new(), Vec::new()),
    };

    let rate_limited = status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || message.to_ascii_lowercase().contains("quota");

    if rate_limited {
        return OracleError::RateLimited {
            provider: PROVIDER.to_string(),
            message,
            retry_after: retry_info_delay(&details).or_else(|| header_retry_after(headers)),
        };
    }

    let message = match status.as_u16() {
        401 => format!("Invalid API key: {message}"),
        403 => format!("API access forbidden: {message}"),
        _ => format!("Gemini API error ({status}): {message}"),
    };
    GeminiClient::provider_error(message)
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &AnalysisPrompt) -> Result<LlmResponse, OracleError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.user.clone(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: prompt.temperature,
                response_mime_type: "application/json",
                response_schema: gemini_response_schema(),
            },
            system_instruction: Some(GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.system.clone(),
                }],
            }),
        };

        tracing::debug!(model = %self.model, "gemini.request");

        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::provider_error(format!("Gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let error_text = resp.text().await.unwrap_or_default();
            let err = classify_failure(status, &headers, &error_text);
            tracing::warn!(%status, kind = ?err.kind(), "gemini.error");
            return Err(err);
        }

        let gemini_response: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| Self::provider_error(format!("Failed to parse Gemini response: {e}")))?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Self::provider_error("No candidates returned from Gemini"))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(Self::provider_error(
                "Content blocked by Gemini safety filters",
            ));
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Self::provider_error("No content parts in Gemini response"));
        }

        Ok(LlmResponse {
            text,
            model: gemini_response
                .model_version
                .or_else(|| Some(self.model.clone())),
            tokens_used: gemini_response
                .usage_metadata
                .and_then(|u| u.total_token_count),
        })
    }
}
