//! Strict decoding of provider output into [`AnalysisRecord`].
use veracity_common::{AnalysisRecord, OracleError};

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Decode raw model text. Any schema or range violation is a `MalformedResponse`.
pub fn parse_analysis(provider: &str, raw: &str) -> Result<AnalysisRecord, OracleError> {
    let body = strip_code_fences(raw);
    let record = serde_json::from_str::<AnalysisRecord>(body).map_err(|e| {
        tracing::warn!(
            provider,
            serde_err = %e,
            body_len = body.len(),
            "oracle.malformed_response"
        );
        OracleError::MalformedResponse {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    })?;
    record.validate().map_err(|message| {
        tracing::warn!(provider, reason = %message, "oracle.out_of_range");
        OracleError::MalformedResponse {
            provider: provider.to_string(),
            message,
        }
    })?;
    Ok(record)
}
