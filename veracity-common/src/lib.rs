//! Common types and utilities shared across Veracity crates.
//!
//! This crate defines the analysis data model, the error taxonomy, provider
//! configuration, and observability helpers used throughout the workspace. It
//! is intentionally lightweight so that every crate can depend on it.
//!
//! # Overview
//!
//! - [`AnalysisRecord`]: the oracle's structured verdict for one content unit
//! - [`LlmConfig`]: provider configuration for the primary/secondary oracle
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`policy`]: per-platform batching and clustering strategies
//! - [`VeracityError`], [`OracleError`], [`SourceError`] and [`Result`]
//!
//! # Examples
//!
//! ```rust
//! use veracity_common::{AnalysisRecord, ThreatLevel};
//!
//! let record = AnalysisRecord::inert();
//! assert_eq!(record.threat_level, ThreatLevel::Low);
//! ```
use serde::{Deserialize, Serialize};

pub mod error;
pub mod model;
pub mod observability;
pub mod policy;

pub use error::{OracleError, OracleErrorKind, Result, SourceError, VeracityError};
pub use model::{
    AnalysisRecord, ClaimBreakdown, EmotionalTone, HighlightKind, HighlightSegment,
    LinguisticRisk, NewsRelevance, Platform, ThreatLevel, Verdict, ViralityRisk,
};
pub use policy::{ClusterPolicy, GroupingKey, ItemFailurePolicy, ThreatAggregation};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Configuration for one LLM provider backing the oracle.
///
/// `api_key` defaults to empty so that a missing credential surfaces as a
/// [`VeracityError::Config`] when the client is built, not as a parse error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Gemini {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Groq {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_groq_model")]
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl LlmConfig {
    pub fn provider_name(&self) -> &'static str {
        match self {
            LlmConfig::Gemini { .. } => "gemini",
            LlmConfig::Groq { .. } => "groq",
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            LlmConfig::Gemini { api_key, .. } | LlmConfig::Groq { api_key, .. } => api_key,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::Gemini {
            api_key: String::new(),
            model: default_gemini_model(),
            base_url: None,
        }
    }
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.to_string()
}
