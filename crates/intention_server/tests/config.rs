use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use intention_server::config::{AppConfig, ConfigError, DEFAULT_PORT};
use intention_server::logging::LogDestination;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn defaults_match_the_documented_values() {
    let config = AppConfig::default();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.analysis.model, "gpt-4.1-mini");
    assert!(!config.analysis.allow_web);
    assert_eq!(config.analysis_settings().poll_timeout, Duration::from_secs(45));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(15));
    assert_eq!(config.retention_policy().max_jobs, 256);
}

#[test]
fn partial_ron_file_keeps_other_defaults() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("intention.ron");
    fs::write(
        &path,
        r#"(
    port: 8080,
    log: (destination: Both),
    jobs: (heartbeat_secs: 5),
)"#,
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.log.destination, LogDestination::Both);
    assert_eq!(config.log.level, "info");
    assert_eq!(config.jobs.heartbeat_secs, 5);
    assert_eq!(config.jobs.max_jobs, 256);
}

#[test]
fn environment_overrides_file_values() {
    let mut config = AppConfig::from_ron("(port: 8080, analysis: (model: \"from-file\"))").unwrap();
    config
        .apply_overrides(env(&[
            ("PORT", "9090"),
            ("OPENAI_API_SECRET", "sk-live"),
            ("OPENAI_API_MODEL", "gpt-4.1"),
            ("OPENAI_ALLOW_WEB", "TRUE"),
            ("OPENAI_POLL_TIMEOUT_MS", "1000"),
            ("OPENAI_BASE_URL", "http://localhost:9999"),
            ("INTENTION_LOG", "debug"),
        ]))
        .unwrap();

    assert_eq!(config.port, 9090);
    assert_eq!(config.log.level, "debug");
    let settings = config.analysis_settings();
    assert_eq!(settings.api_key.as_deref(), Some("sk-live"));
    assert_eq!(settings.model, "gpt-4.1");
    assert!(settings.allow_web);
    assert_eq!(settings.poll_timeout, Duration::from_millis(1000));
    assert_eq!(settings.base_url, "http://localhost:9999");
}

#[test]
fn only_true_enables_web_and_blank_values_are_ignored() {
    let mut config = AppConfig::default();
    config
        .apply_overrides(env(&[("OPENAI_ALLOW_WEB", "yes"), ("OPENAI_API_SECRET", "  ")]))
        .unwrap();
    assert!(!config.analysis.allow_web);
    assert_eq!(config.analysis.api_key, None);
}

#[test]
fn malformed_numbers_are_rejected() {
    let mut config = AppConfig::default();
    let err = config
        .apply_overrides(env(&[("PORT", "eighty")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));
}

#[test]
fn unreadable_and_invalid_files_are_reported() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.ron");
    assert!(matches!(
        AppConfig::from_file(&missing),
        Err(ConfigError::Read { .. })
    ));

    let broken = temp.path().join("broken.ron");
    fs::write(&broken, "(port: \"many\")").unwrap();
    assert!(matches!(
        AppConfig::from_file(&broken),
        Err(ConfigError::Parse { .. })
    ));
}
