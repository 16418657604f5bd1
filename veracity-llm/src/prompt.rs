//! The analysis prompt contract shared by every provider.
//!
//! Both providers receive the same instructions and must return the same
//! field set; Gemini enforces it through `responseSchema`, Groq through the
//! literal JSON shape embedded in its system message.
use crate::traits::AnalysisPrompt;
use serde_json::{json, Value};

pub const ANALYSIS_TEMPERATURE: f32 = 0.1;

pub const SYSTEM_PROMPT: &str = r#"You are a professional misinformation intelligence engine.
Analyze the following text for:
1. Multilingual verification (Identify language and cross-reference).
2. Linguistic manipulation (Clickbait, sensationalism, fear, urgency).
3. Claim extraction and verification against known news facts.
4. Emotional tone analysis.
5. Virality and threat estimation.

Ensure the "highlightedText" array reconstructs the original input text fully by splitting it into parts."#;

pub const JSON_SHAPE: &str = r#"Return a JSON object with this exact structure:
{
  "language": "string",
  "credibilityScore": number (0-100),
  "fakeRiskScore": number (0-100),
  "threatLevel": "low" | "medium" | "high" | "critical",
  "linguisticRisks": [{"type": "string", "severity": number, "description": "string", "foundPhrases": ["string"]}],
  "emotionalTone": {"anger": number, "fear": number, "urgency": number, "neutrality": number, "joy": number},
  "viralityRisk": {"score": number, "triggers": ["string"], "potentialImpact": "string"},
  "claims": [{"claim": "string", "verdict": "verified|unverified|refuted", "sourceRelevance": number, "explanation": "string"}],
  "newsRelevance": {"topicMatch": number, "topTrustedSources": ["string"], "summaryOfVerifiedFacts": "string"},
  "highlightedText": [{"text": "string", "type": "suspicious|verified|neutral", "tooltip": "string"}]
}"#;

/// Wrap the input the way both providers expect it.
pub fn user_message(text: &str) -> String {
    format!("Input Text:\n\"\"\"\n{text}\n\"\"\"")
}

impl AnalysisPrompt {
    /// Build the standard analysis prompt for `text`.
    ///
    /// ```
    /// use veracity_llm::AnalysisPrompt;
    ///
    /// let p = AnalysisPrompt::for_text("The moon is cheese");
    /// assert!(p.user.contains("\"\"\"\nThe moon is cheese\n\"\"\""));
    /// assert_eq!(p.input, "The moon is cheese");
    /// ```
    pub fn for_text(text: &str) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user: user_message(text),
            input: text.to_string(),
            temperature: ANALYSIS_TEMPERATURE,
        }
    }

    /// System message with the JSON shape appended, for providers without
    /// native schema enforcement.
    pub fn system_with_shape(&self) -> String {
        format!("{}\n\n{}", self.system, JSON_SHAPE)
    }
}

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn number() -> Value {
    json!({ "type": "NUMBER" })
}

fn strings() -> Value {
    json!({ "type": "ARRAY", "items": string() })
}

fn enumeration(values: &[&str]) -> Value {
    json!({ "type": "STRING", "enum": values })
}

/// Gemini `responseSchema` mirroring `AnalysisRecord`.
pub fn gemini_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "language": string(),
            "credibilityScore": number(),
            "fakeRiskScore": number(),
            "threatLevel": enumeration(&["low", "medium", "high", "critical"]),
            "linguisticRisks": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "type": string(),
                        "severity": number(),
                        "description": string(),
                        "foundPhrases": strings()
                    },
                    "required": ["type", "severity", "description", "foundPhrases"]
                }
            },
            "emotionalTone": {
                "type": "OBJECT",
                "properties": {
                    "anger": number(),
                    "fear": number(),
                    "urgency": number(),
                    "neutrality": number(),
                    "joy": number()
                },
                "required": ["anger", "fear", "urgency", "neutrality", "joy"]
            },
            "viralityRisk": {
                "type": "OBJECT",
                "properties": {
                    "score": number(),
                    "triggers": strings(),
                    "potentialImpact": string()
                },
                "required": ["score", "triggers", "potentialImpact"]
            },
            "claims": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "claim": string(),
                        "verdict": enumeration(&["verified", "unverified", "refuted"]),
                        "sourceRelevance": number(),
                        "explanation": string()
                    },
                    "required": ["claim", "verdict", "sourceRelevance", "explanation"]
                }
            },
            "newsRelevance": {
                "type": "OBJECT",
                "properties": {
                    "topicMatch": number(),
                    "topTrustedSources": strings(),
                    "summaryOfVerifiedFacts": string()
                },
                "required": ["topicMatch", "topTrustedSources", "summaryOfVerifiedFacts"]
            },
            "highlightedText": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": string(),
                        "type": enumeration(&["suspicious", "verified", "neutral"]),
                        "tooltip": string()
                    },
                    "required": ["text", "type"]
                }
            }
        },
        "required": [
            "language", "credibilityScore", "fakeRiskScore", "threatLevel",
            "linguisticRisks", "emotionalTone", "viralityRisk", "claims",
            "newsRelevance", "highlightedText"
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_every_record_field() {
        let schema = gemini_response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required.len(), 10);
        for field in required {
            assert!(schema["properties"].get(field).is_some(), "{field}");
        }
        assert_eq!(
            schema["properties"]["threatLevel"]["enum"],
            json!(["low", "medium", "high", "critical"])
        );
    }

    #[test]
    fn shape_is_appended_to_system() {
        let p = AnalysisPrompt::for_text("x");
        let sys = p.system_with_shape();
        assert!(sys.starts_with(SYSTEM_PROMPT));
        assert!(sys.contains("\"highlightedText\""));
    }
}
