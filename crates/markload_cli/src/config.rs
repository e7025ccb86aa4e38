use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use markload_core::BackoffPolicy;
use markload_engine::{ClientSettings, EngineConfig};
use markload_logging::{LevelFilter, LogDestination};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "markload.ron";

/// Settings read from the RON config file. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub api_base_url: String,
    pub state_path: PathBuf,
    pub output_dir: PathBuf,
    /// Also log to this file when set.
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_increment_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            api_base_url: engine.client.base_url,
            state_path: PathBuf::from("markload_state.json"),
            output_dir: PathBuf::from("output"),
            log_file: None,
            log_level: "info".to_string(),
            connect_timeout_ms: millis(engine.client.connect_timeout),
            request_timeout_ms: millis(engine.client.request_timeout),
            backoff_initial_ms: millis(engine.backoff.initial),
            backoff_increment_ms: millis(engine.backoff.increment),
            backoff_max_ms: millis(engine.backoff.max),
        }
    }
}

impl CliConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            client: ClientSettings {
                base_url: self.api_base_url.clone(),
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            backoff: BackoffPolicy {
                initial: Duration::from_millis(self.backoff_initial_ms),
                increment: Duration::from_millis(self.backoff_increment_ms),
                max: Duration::from_millis(self.backoff_max_ms),
            },
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("unknown log level '{}'", self.log_level))
    }

    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_engine_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.engine_config(), EngineConfig::default());
        assert_eq!(config.state_path, PathBuf::from("markload_state.json"));
        assert_eq!(config.log_destination(), LogDestination::Terminal);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = CliConfig::parse(
            r#"(
                api_base_url: "http://converter.local:9000",
                log_file: Some("markload.log"),
                backoff_max_ms: 60000,
            )"#,
        )
        .unwrap();

        assert_eq!(config.api_base_url, "http://converter.local:9000");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(
            config.log_destination(),
            LogDestination::Both(PathBuf::from("markload.log"))
        );
        let engine = config.engine_config();
        assert_eq!(engine.backoff.max, Duration::from_secs(60));
        assert_eq!(engine.backoff.initial, Duration::from_millis(3000));
    }

    #[test]
    fn missing_file_is_default_and_bad_file_is_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("markload.ron");
        assert_eq!(CliConfig::load(&path).unwrap(), CliConfig::default());

        fs::write(&path, "(api_base_url: 42)").unwrap();
        let err = CliConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }

    #[test]
    fn log_level_is_validated() {
        let mut config = CliConfig::default();
        config.log_level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), LevelFilter::Debug);
        config.log_level = "chatty".to_string();
        assert!(config.log_level().is_err());
    }
}
