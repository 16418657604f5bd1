//! Loader for workspace configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are attached; `VERACITY__`-prefixed
//! environment variables (with `__` as the section separator, e.g.
//! `VERACITY__BATCH__SIZE=10`) are always applied. After merging, every string
//! value goes through recursive `${VAR}` expansion so secrets can live in the
//! environment while the YAML names them.
//!
//! Every section has defaults, so an empty document is a valid configuration.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use veracity_common::observability::{LogConfig, LogFormat};
use veracity_common::{ClusterPolicy, ItemFailurePolicy, LlmConfig};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "VERACITY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VeracityConfig {
    pub version: Option<String>,
    pub oracle: OracleSettings,
    pub cache: CacheSettings,
    pub batch: BatchSettings,
    pub reddit: RedditSettings,
    pub youtube: YouTubeSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub primary: LlmConfig,
    /// Used only when the primary is rate limited.
    pub secondary: Option<LlmConfig>,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    /// Ceiling for any single wait, including provider-supplied hints.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub capacity: usize,
    /// Characters of normalized text kept in a fingerprint.
    pub fingerprint_len: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 100,
            fingerprint_len: 500,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub size: usize,
    pub debounce_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 5,
            debounce_ms: 200,
        }
    }
}

impl BatchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub base_url: Option<String>,
    pub user_agent: String,
    pub min_interval_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub comment_limit: u32,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub batch_size: usize,
    pub chunk_delay_ms: u64,
    pub on_item_failure: ItemFailurePolicy,
    pub clustering: ClusterPolicy,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: "veracity/0.1".to_string(),
            min_interval_ms: 2000,
            max_retries: 3,
            retry_delay_ms: 2000,
            comment_limit: 20,
            cache_capacity: 50,
            cache_ttl_secs: 300,
            batch_size: 5,
            chunk_delay_ms: 1000,
            on_item_failure: ItemFailurePolicy::Drop,
            clustering: ClusterPolicy::by_container(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YouTubeSettings {
    pub base_url: Option<String>,
    pub api_key: String,
    pub min_interval_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub comment_limit: u32,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub batch_size: usize,
    pub chunk_delay_ms: u64,
    pub on_item_failure: ItemFailurePolicy,
    pub clustering: ClusterPolicy,
}

impl Default for YouTubeSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: String::new(),
            min_interval_ms: 1000,
            max_retries: 3,
            retry_delay_ms: 2000,
            comment_limit: 30,
            cache_capacity: 50,
            cache_ttl_secs: 300,
            batch_size: 5,
            chunk_delay_ms: 1000,
            on_item_failure: ItemFailurePolicy::SubstituteDefault,
            clustering: ClusterPolicy::by_risk_signature(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub filter: String,
    pub emit_stderr: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
            emit_stderr: true,
            log_dir: None,
        }
    }
}

impl LoggingSettings {
    pub fn to_log_config(&self, app_name: &str) -> LogConfig {
        LogConfig {
            app_name: app_name.to_string(),
            log_dir: self.log_dir.clone(),
            emit_stderr: self.emit_stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

/// A structurally valid document with values the pipeline cannot run with.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl VeracityConfig {
    /// Reject settings that would stall or disable the pipeline.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("batch.size", self.batch.size),
            ("cache.capacity", self.cache.capacity),
            ("cache.fingerprint_len", self.cache.fingerprint_len),
            ("reddit.batch_size", self.reddit.batch_size),
            ("reddit.cache_capacity", self.reddit.cache_capacity),
            ("youtube.batch_size", self.youtube.batch_size),
            ("youtube.cache_capacity", self.youtube.cache_capacity),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ValidationError::Zero(field));
            }
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct VeracityConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_attached: bool,
}

impl Default for VeracityConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl VeracityConfigLoader {
    /// Start with no file sources; environment overrides are applied last.
    ///
    /// ```
    /// use veracity_config::VeracityConfigLoader;
    ///
    /// let config = VeracityConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nbatch:\n  size: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.batch.size, 3);
    /// assert_eq!(config.batch.debounce_ms, 200);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_attached: false,
        }
    }

    /// Attach a required YAML/TOML/JSON file; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent, for environment-only deployments.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use veracity_common::LlmConfig;
    /// use veracity_config::VeracityConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_GEMINI_KEY", "injected-from-env"); }
    ///
    /// let config = VeracityConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// oracle:
    ///   primary:
    ///     provider: gemini
    ///     api_key: "${DOCTEST_GEMINI_KEY}"
    ///   secondary:
    ///     provider: groq
    ///     api_key: "literal"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &config.oracle.primary {
    ///     LlmConfig::Gemini { api_key, model, .. } => {
    ///         assert_eq!(api_key, "injected-from-env");
    ///         assert_eq!(model, veracity_common::DEFAULT_GEMINI_MODEL);
    ///     }
    ///     other => panic!("expected gemini, got {other:?}"),
    /// }
    /// assert_eq!(config.oracle.secondary.unwrap().provider_name(), "groq");
    ///
    /// unsafe { std::env::remove_var("DOCTEST_GEMINI_KEY"); }
    /// ```
    pub fn load(mut self) -> Result<VeracityConfig, ConfigError> {
        if !self.env_attached {
            self.builder = self.builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
            self.env_attached = true;
        }
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: VeracityConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
