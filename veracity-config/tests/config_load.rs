use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use veracity_common::{GroupingKey, ItemFailurePolicy, LlmConfig};
use veracity_config::VeracityConfigLoader;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
version: "0.1"
oracle:
  primary:
    provider: gemini
    api_key: "${TEST_VERACITY_GEMINI_KEY}"
  secondary:
    provider: groq
    api_key: "${TEST_VERACITY_GROQ_KEY}"
    model: "llama-3.1-8b-instant"
  retry:
    max_retries: 2
reddit:
  comment_limit: 15
  clustering:
    min_fake_risk: 70
youtube:
  api_key: "yt-key"
  on_item_failure: drop
logging:
  format: json
  "#;
    let p = write_yaml(&tmp, "veracity.yaml", file_yaml);

    temp_env::with_vars(
        [
            ("TEST_VERACITY_GEMINI_KEY", Some("g-secret")),
            ("TEST_VERACITY_GROQ_KEY", Some("q-secret")),
        ],
        || {
            let config = VeracityConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load veracity config");

            assert_eq!(config.oracle.primary.api_key(), "g-secret");
            match config.oracle.secondary.as_ref().expect("secondary") {
                LlmConfig::Groq { api_key, model, .. } => {
                    assert_eq!(api_key, "q-secret");
                    assert_eq!(model, "llama-3.1-8b-instant");
                }
                other => panic!("expected groq, got {other:?}"),
            }
            assert_eq!(config.oracle.retry.max_retries, 2);
            assert_eq!(config.oracle.retry.initial_delay_ms, 1000);

            assert_eq!(config.reddit.comment_limit, 15);
            assert_eq!(config.reddit.clustering.min_fake_risk, 70.0);
            assert_eq!(config.reddit.clustering.grouping, GroupingKey::Container);
            assert_eq!(config.reddit.min_interval_ms, 2000);

            assert_eq!(config.youtube.api_key, "yt-key");
            assert_eq!(config.youtube.on_item_failure, ItemFailurePolicy::Drop);
            assert_eq!(
                config.youtube.clustering.grouping,
                GroupingKey::RiskSignature
            );
        },
    );
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "veracity.yaml",
        "batch:\n  size: 5\n  debounce_ms: 200\n",
    );

    temp_env::with_vars(
        [
            ("VERACITY__BATCH__SIZE", Some("9")),
            ("VERACITY__CACHE__TTL_SECS", Some("60")),
        ],
        || {
            let config = VeracityConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load with env overrides");
            assert_eq!(config.batch.size, 9);
            assert_eq!(config.batch.debounce_ms, 200);
            assert_eq!(config.cache.ttl_secs, 60);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = VeracityConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults");
    assert_eq!(config.cache.capacity, 100);
    assert_eq!(config.cache.fingerprint_len, 500);
    assert_eq!(config.oracle.primary.provider_name(), "gemini");
    assert!(config.oracle.primary.api_key().is_empty());
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = VeracityConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn zero_capacity_fails_validation() {
    let err = VeracityConfigLoader::new()
        .with_yaml_str("cache:\n  capacity: 0\n")
        .load()
        .expect_err("capacity must be positive");
    assert!(err.to_string().contains("cache.capacity"));
}
