//! Server configuration: an optional RON file, then environment overrides.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use intention_engine::{AnalysisSettings, RetentionPolicy};
use serde::Deserialize;

use crate::logging::LogDestination;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            destination: LogDestination::Terminal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub allow_web: bool,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let defaults = AnalysisSettings::default();
        Self {
            api_key: None,
            model: defaults.model,
            allow_web: defaults.allow_web,
            base_url: defaults.base_url,
            poll_interval_ms: defaults.poll_interval.as_millis() as u64,
            poll_timeout_ms: defaults.poll_timeout.as_millis() as u64,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub retention_secs: u64,
    pub max_jobs: usize,
    pub sweep_interval_secs: u64,
    /// Comment-only SSE keep-alive period.
    pub heartbeat_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        let policy = RetentionPolicy::default();
        Self {
            retention_secs: policy.retention.as_secs(),
            max_jobs: policy.max_jobs,
            sweep_interval_secs: policy.sweep_interval.as_secs(),
            heartbeat_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub log: LogConfig,
    pub analysis: AnalysisConfig,
    pub jobs: JobsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log: LogConfig::default(),
            analysis: AnalysisConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

impl AppConfig {
    /// File (when given) plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_ron(content: &str) -> Result<Self, String> {
        ron::from_str(content).map_err(|err| err.to_string())
    }

    /// Environment variables win over file values. Blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(value) = var("PORT") {
            self.port = parse_number("PORT", &value)?;
        }
        if let Some(value) = var("OPENAI_API_SECRET") {
            self.analysis.api_key = Some(value);
        }
        if let Some(value) = var("OPENAI_API_MODEL") {
            self.analysis.model = value;
        }
        if let Some(value) = var("OPENAI_ALLOW_WEB") {
            self.analysis.allow_web = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(value) = var("OPENAI_POLL_TIMEOUT_MS") {
            self.analysis.poll_timeout_ms = parse_number("OPENAI_POLL_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("OPENAI_BASE_URL") {
            self.analysis.base_url = value;
        }
        if let Some(value) = var("INTENTION_LOG") {
            self.log.level = value;
        }
        Ok(())
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        let analysis = &self.analysis;
        AnalysisSettings {
            api_key: analysis.api_key.clone(),
            model: analysis.model.clone(),
            allow_web: analysis.allow_web,
            base_url: analysis.base_url.clone(),
            poll_interval: Duration::from_millis(analysis.poll_interval_ms),
            poll_timeout: Duration::from_millis(analysis.poll_timeout_ms),
            request_timeout: Duration::from_secs(analysis.request_timeout_secs),
            ..AnalysisSettings::default()
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention: Duration::from_secs(self.jobs.retention_secs),
            max_jobs: self.jobs.max_jobs,
            sweep_interval: Duration::from_secs(self.jobs.sweep_interval_secs.max(1)),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.jobs.heartbeat_secs.max(1))
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
    })
}
