use crate::traits::{AnalysisPrompt, LlmClient, LlmResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veracity_common::{OracleError, VeracityError};
use veracity_http::{Auth, HttpClient, HttpError, RequestOpts, StatusCode};

const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1/";
const PROVIDER: &str = "groq";

/// Groq chat-completions client (OpenAI-compatible wire format).
pub struct GroqClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<u32>,
}

impl GroqClient {
    /// Create a new client for the given API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self, VeracityError> {
        Self::with_base_url(api_key, model, GROQ_API_BASE)
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: &str,
    ) -> Result<Self, VeracityError> {
        if api_key.trim().is_empty() {
            return Err(VeracityError::Config("Groq API key is missing".to_string()));
        }
        let base = format!("{}/", base_url.trim_end_matches('/'));
        // Rate-limit retries belong to the oracle's retry policy, not the transport.
        let client = HttpClient::new(&base)
            .map_err(|e| VeracityError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(std::time::Duration::from_secs(60))
            .with_retries(0);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &AnalysisPrompt) -> Result<LlmResponse, OracleError> {
        let system = prompt.system_with_shape();
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let opts = RequestOpts {
            auth: Some(Auth::Bearer(&self.api_key)),
            ..Default::default()
        };
        let resp: ChatResponse = self
            .client
            .post_json("chat/completions", &req, opts)
            .await
            .map_err(http_to_oracle)?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| OracleError::Provider {
                provider: PROVIDER.to_string(),
                message: "empty completion".to_string(),
            })?;

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }
}

fn http_to_oracle(e: HttpError) -> OracleError {
    match e {
        HttpError::Api {
            status,
            message,
            retry_after,
            ..
        } if is_rate_limit(status, &message) => OracleError::RateLimited {
            provider: PROVIDER.to_string(),
            message,
            retry_after,
        },
        other => OracleError::Provider {
            provider: PROVIDER.to_string(),
            message: other.to_string(),
        },
    }
}

/// Groq sometimes reports token-per-minute exhaustion on a plain 4xx.
fn is_rate_limit(status: StatusCode, message: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let lower = message.to_ascii_lowercase();
    status.is_client_error() && (lower.contains("rate limit") || lower.contains("quota"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, message: &str) -> HttpError {
        HttpError::Api {
            status: StatusCode::from_u16(status).unwrap(),
            message: message.to_string(),
            request_id: "-".to_string(),
            retry_after: None,
            body: String::new(),
        }
    }

    #[test]
    fn rate_limit_text_on_4xx_is_rate_limited() {
        let err = http_to_oracle(api_error(400, "Rate limit reached for model"));
        assert!(matches!(err, OracleError::RateLimited { .. }));
        let err = http_to_oracle(api_error(413, "Request exceeds your token quota"));
        assert!(matches!(err, OracleError::RateLimited { .. }));
    }

    #[test]
    fn other_failures_are_provider_errors() {
        let err = http_to_oracle(api_error(401, "Invalid API Key"));
        assert!(matches!(err, OracleError::Provider { .. }));
        // Quota wording on a 5xx is a server fault, not throttling.
        let err = http_to_oracle(api_error(503, "quota service unavailable"));
        assert!(matches!(err, OracleError::Provider { .. }));
    }
}
