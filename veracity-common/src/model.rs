//! The oracle's structured verdict and its nested types.
//!
//! Field names serialize in camelCase because this is also the wire contract the
//! LLM providers are prompted to produce. Every field is required; enum values
//! outside their declared set fail deserialization. Unknown extra fields are
//! ignored.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal risk classification. Ordering follows severity: `Low < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Ordinal encoding used for averaging: low=1 .. critical=4.
    pub fn ordinal(self) -> u8 {
        match self {
            ThreatLevel::Low => 1,
            ThreatLevel::Medium => 2,
            ThreatLevel::High => 3,
            ThreatLevel::Critical => 4,
        }
    }

    /// Bucket a mean ordinal back into a level.
    ///
    /// ```
    /// use veracity_common::ThreatLevel;
    ///
    /// assert_eq!(ThreatLevel::from_mean_ordinal(3.5), ThreatLevel::Critical);
    /// assert_eq!(ThreatLevel::from_mean_ordinal(3.25), ThreatLevel::High);
    /// assert_eq!(ThreatLevel::from_mean_ordinal(1.49), ThreatLevel::Low);
    /// ```
    pub fn from_mean_ordinal(mean: f64) -> Self {
        if mean >= 3.5 {
            ThreatLevel::Critical
        } else if mean >= 2.5 {
            ThreatLevel::High
        } else if mean >= 1.5 {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Verified,
    Unverified,
    Refuted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Suspicious,
    Verified,
    Neutral,
}

/// One linguistic manipulation signal, e.g. `clickbait` or `fear-mongering`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinguisticRisk {
    /// Category tag. Providers are prompted with a known vocabulary but the
    /// tag is kept open so new categories still cluster.
    #[serde(rename = "type")]
    pub category: String,
    pub severity: f64,
    pub description: String,
    pub found_phrases: Vec<String>,
}

/// Five independent, non-negative axes. They do not have to sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalTone {
    pub anger: f64,
    pub fear: f64,
    pub urgency: f64,
    pub neutrality: f64,
    pub joy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViralityRisk {
    pub score: f64,
    pub triggers: Vec<String>,
    pub potential_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBreakdown {
    pub claim: String,
    pub verdict: Verdict,
    pub source_relevance: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRelevance {
    pub topic_match: f64,
    pub top_trusted_sources: Vec<String>,
    pub summary_of_verified_facts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightSegment {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: HighlightKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

/// Structured verdict for one content unit.
///
/// Produced once by the oracle and never mutated afterwards; platform results
/// wrap it rather than edit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub language: String,
    pub credibility_score: f64,
    pub fake_risk_score: f64,
    pub threat_level: ThreatLevel,
    pub linguistic_risks: Vec<LinguisticRisk>,
    pub emotional_tone: EmotionalTone,
    pub virality_risk: ViralityRisk,
    pub claims: Vec<ClaimBreakdown>,
    pub news_relevance: NewsRelevance,
    pub highlighted_text: Vec<HighlightSegment>,
}

impl AnalysisRecord {
    /// Inert record substituted when a single item in a batch fails to analyze.
    pub fn inert() -> Self {
        Self {
            language: "unknown".to_string(),
            credibility_score: 50.0,
            fake_risk_score: 0.0,
            threat_level: ThreatLevel::Low,
            linguistic_risks: Vec::new(),
            emotional_tone: EmotionalTone {
                anger: 0.0,
                fear: 0.0,
                urgency: 0.0,
                neutrality: 100.0,
                joy: 0.0,
            },
            virality_risk: ViralityRisk {
                score: 0.0,
                triggers: Vec::new(),
                potential_impact: "Unknown".to_string(),
            },
            claims: Vec::new(),
            news_relevance: NewsRelevance {
                topic_match: 0.0,
                top_trusted_sources: Vec::new(),
                summary_of_verified_facts: String::new(),
            },
            highlighted_text: Vec::new(),
        }
    }

    /// Check every score against its declared range.
    ///
    /// Percent-style scores must sit in `[0, 100]`; tone axes only need to be
    /// non-negative. The error names the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        let mut percents = vec![
            ("credibilityScore", self.credibility_score),
            ("fakeRiskScore", self.fake_risk_score),
            ("viralityRisk.score", self.virality_risk.score),
            ("newsRelevance.topicMatch", self.news_relevance.topic_match),
        ];
        percents.extend(
            self.linguistic_risks
                .iter()
                .map(|r| ("linguisticRisks.severity", r.severity)),
        );
        percents.extend(
            self.claims
                .iter()
                .map(|c| ("claims.sourceRelevance", c.source_relevance)),
        );
        if let Some((field, value)) = percents
            .into_iter()
            .find(|(_, v)| !(0.0..=100.0).contains(v))
        {
            return Err(format!("{field} = {value} is outside [0, 100]"));
        }

        let tone = &self.emotional_tone;
        let axes = [
            ("anger", tone.anger),
            ("fear", tone.fear),
            ("urgency", tone.urgency),
            ("neutrality", tone.neutrality),
            ("joy", tone.joy),
        ];
        if let Some((axis, value)) = axes.into_iter().find(|(_, v)| !(v.is_finite() && *v >= 0.0)) {
            return Err(format!("emotionalTone.{axis} = {value} must be non-negative"));
        }
        Ok(())
    }

    /// Concatenation of all highlighted fragments in order.
    pub fn reconstructed_text(&self) -> String {
        self.highlighted_text
            .iter()
            .map(|seg| seg.text.as_str())
            .collect()
    }

    /// Whether the highlighted fragments reproduce `original` verbatim.
    pub fn reconstructs(&self, original: &str) -> bool {
        let mut rest = original;
        for seg in &self.highlighted_text {
            match rest.strip_prefix(seg.text.as_str()) {
                Some(tail) => rest = tail,
                None => return false,
            }
        }
        rest.is_empty()
    }

    /// Sorted, `|`-joined set of linguistic risk categories.
    ///
    /// ```
    /// use veracity_common::{AnalysisRecord, LinguisticRisk};
    ///
    /// let mut record = AnalysisRecord::inert();
    /// for tag in ["sensationalism", "clickbait", "sensationalism"] {
    ///     record.linguistic_risks.push(LinguisticRisk {
    ///         category: tag.into(),
    ///         severity: 50.0,
    ///         description: String::new(),
    ///         found_phrases: vec![],
    ///     });
    /// }
    /// assert_eq!(record.risk_signature(), "clickbait|sensationalism");
    /// ```
    pub fn risk_signature(&self) -> String {
        let mut tags: Vec<&str> = self
            .linguistic_risks
            .iter()
            .map(|r| r.category.as_str())
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags.join("|")
    }
}

/// Third-party content platforms the monitors pull from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    #[serde(rename = "youtube")]
    YouTube,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Reddit => f.write_str("reddit"),
            Platform::YouTube => f.write_str("youtube"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "language": "en",
            "credibilityScore": 22,
            "fakeRiskScore": 81.5,
            "threatLevel": "high",
            "linguisticRisks": [{
                "type": "fear-mongering",
                "severity": 70,
                "description": "Appeals to fear",
                "foundPhrases": ["before it's too late"]
            }],
            "emotionalTone": { "anger": 10, "fear": 80, "urgency": 90, "neutrality": 5, "joy": 0 },
            "viralityRisk": { "score": 75, "triggers": ["share now"], "potentialImpact": "High" },
            "claims": [{
                "claim": "Water cures everything",
                "verdict": "refuted",
                "sourceRelevance": 60,
                "explanation": "No evidence"
            }],
            "newsRelevance": {
                "topicMatch": 30,
                "topTrustedSources": ["WHO"],
                "summaryOfVerifiedFacts": "None"
            },
            "highlightedText": [
                { "text": "Share now ", "type": "suspicious", "tooltip": "urgency" },
                { "text": "before it's too late", "type": "neutral" }
            ]
        })
    }

    #[test]
    fn parses_camel_case_record() {
        let record: AnalysisRecord = serde_json::from_value(sample()).unwrap();
        assert_eq!(record.threat_level, ThreatLevel::High);
        assert_eq!(record.linguistic_risks[0].category, "fear-mongering");
        assert_eq!(record.claims[0].verdict, Verdict::Refuted);
        assert_eq!(record.highlighted_text[1].tooltip, None);
    }

    #[test]
    fn rejects_undeclared_threat_level() {
        let mut v = sample();
        v["threatLevel"] = json!("apocalyptic");
        assert!(serde_json::from_value::<AnalysisRecord>(v).is_err());
    }

    #[test]
    fn rejects_missing_required_block() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("newsRelevance");
        assert!(serde_json::from_value::<AnalysisRecord>(v).is_err());
    }

    #[test]
    fn tolerates_extra_fields() {
        let mut v = sample();
        v["modelVersion"] = json!("x");
        assert!(serde_json::from_value::<AnalysisRecord>(v).is_ok());
    }

    #[test]
    fn highlighted_fragments_reconstruct_input() {
        let record: AnalysisRecord = serde_json::from_value(sample()).unwrap();
        let original = "Share now before it's too late";
        assert_eq!(record.reconstructed_text(), original);
        assert!(record.reconstructs(original));
        assert!(!record.reconstructs("Share now before it is too late"));
        assert!(!record.reconstructs("Share now before it's too late!"));
    }

    #[test]
    fn threat_levels_are_ordered() {
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
        assert_eq!(ThreatLevel::Critical.ordinal(), 4);
    }

    #[test]
    fn inert_record_is_low_risk() {
        let record = AnalysisRecord::inert();
        assert_eq!(record.fake_risk_score, 0.0);
        assert_eq!(record.threat_level, ThreatLevel::Low);
        assert_eq!(record.emotional_tone.neutrality, 100.0);
        assert_eq!(record.risk_signature(), "");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn validate_names_nested_offender() {
        let mut record = AnalysisRecord::inert();
        record.claims.push(ClaimBreakdown {
            claim: "x".into(),
            verdict: Verdict::Unverified,
            source_relevance: 100.5,
            explanation: String::new(),
        });
        let err = record.validate().unwrap_err();
        assert!(err.starts_with("claims.sourceRelevance"), "{err}");

        record.claims.clear();
        record.emotional_tone.fear = f64::NAN;
        assert!(record.validate().unwrap_err().contains("fear"));
    }
}
