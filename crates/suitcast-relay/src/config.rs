use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use suitcast_core::EngineConfig;
use thiserror::Error;
use tracing::Level;

const INSTANCE_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";
const HISTORY_WINDOW_RANGE: std::ops::RangeInclusive<usize> = 3..=500;

/// Root relay configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayConfig {
    pub instance: String,
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: RelayConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_instance(&self.instance)?;
        self.channels.validate()?;
        validate_engine(&self.engine)?;
        for (label, value) in [
            ("storage.snapshot", &self.storage.snapshot),
            ("outbox.path", &self.outbox.path),
            ("logging.path", &self.logging.path),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(label, "path must not be empty"));
            }
        }
        self.logging.normalize();
        Ok(())
    }

    /// Resolve `{instance}` templates into concrete paths.
    pub fn resolved_paths(&self) -> ResolvedPaths {
        ResolvedPaths {
            snapshot: resolve_template(&self.instance, &self.storage.snapshot),
            outbox: resolve_template(&self.instance, &self.outbox.path),
            log: resolve_template(&self.instance, &self.logging.path),
        }
    }
}

/// Chat identifiers of the messaging platform.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ChannelsConfig {
    pub source: i64,
    pub prediction: i64,
    #[serde(default)]
    pub admin: Option<i64>,
}

impl ChannelsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.source == self.prediction {
            return Err(invalid(
                "channels.prediction",
                "prediction channel must differ from the source channel",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutboxConfig {
    #[serde(default = "default_outbox_path")]
    pub path: String,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            path: default_outbox_path(),
        }
    }
}

/// Logging configuration defaults to plain console output.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
            path: default_log_path(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_snapshot_path() -> String {
    "state/{instance}/engine.json".to_string()
}

fn default_outbox_path() -> String {
    "state/{instance}/outbox.jsonl".to_string()
}

fn default_log_path() -> String {
    "state/{instance}/relay.jsonl".to_string()
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate_instance(instance: &str) -> Result<(), ValidationError> {
    if instance.trim().is_empty() {
        return Err(invalid("instance", "instance must not be empty"));
    }
    if !instance.chars().all(|c| INSTANCE_ALLOWED.contains(c)) {
        return Err(invalid(
            "instance",
            "instance may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ValidationError> {
    if !HISTORY_WINDOW_RANGE.contains(&engine.history_window) {
        return Err(ValidationError::InvalidField {
            field: "engine.history_window".to_string(),
            message: format!(
                "history window must be within {}..={}",
                HISTORY_WINDOW_RANGE.start(),
                HISTORY_WINDOW_RANGE.end()
            ),
        });
    }
    if engine.min_spacing == 0 {
        return Err(invalid("engine.min_spacing", "spacing must be at least 1"));
    }
    if engine.win_window > engine.lookahead {
        return Err(invalid(
            "engine.win_window",
            "win window must not exceed the lookahead",
        ));
    }
    if engine.static_failure_threshold == 0 {
        return Err(invalid(
            "engine.static_failure_threshold",
            "threshold must be at least 1",
        ));
    }
    if engine.learned_per_suit == 0 {
        return Err(invalid(
            "engine.learned_per_suit",
            "at least one learned rule per suit is required",
        ));
    }
    if engine.reset.hour > 23 {
        return Err(invalid("engine.reset.hour", "hour must be within 0..=23"));
    }
    if engine.reset.minute > 59 {
        return Err(invalid("engine.reset.minute", "minute must be within 0..=59"));
    }
    if engine.reset.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(invalid(
            "engine.reset.utc_offset_minutes",
            "offset must be less than a day",
        ));
    }
    Ok(())
}

fn resolve_template(instance: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{instance}", instance))
}

/// Fully resolved file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub snapshot: PathBuf,
    pub outbox: PathBuf,
    pub log: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
instance: "wat-main"
channels:
  source: -1001
  prediction: -1002
  admin: 77
engine:
  history_window: 40
  reset:
    utc_offset_minutes: 60
storage:
  snapshot: "state/{instance}/engine.json"
logging:
  enable_structured: true
  tracing_level: "debug"
"#;

    fn parse(yaml: &str) -> RelayConfig {
        serde_yaml::from_str(yaml).expect("parse yaml")
    }

    #[test]
    fn loads_and_validates_basic_config() {
        let mut cfg = parse(BASIC_YAML);
        cfg.validate().expect("validate");

        assert_eq!(cfg.engine.history_window, 40);
        assert_eq!(cfg.engine.min_spacing, 3);
        assert_eq!(cfg.engine.reset.minute, 59);
        assert_eq!(cfg.channels.admin, Some(77));
        assert_eq!(cfg.logging.level(), Some(Level::DEBUG));

        let paths = cfg.resolved_paths();
        assert_eq!(paths.snapshot, PathBuf::from("state/wat-main/engine.json"));
        assert_eq!(paths.outbox, PathBuf::from("state/wat-main/outbox.jsonl"));
    }

    #[test]
    fn rejects_history_window_out_of_range() {
        let mut cfg = parse(&BASIC_YAML.replace("history_window: 40", "history_window: 2"));
        let err = cfg.validate().expect_err("window too small");
        assert!(err.to_string().starts_with("engine.history_window"));
    }

    #[test]
    fn rejects_shared_channels() {
        let mut cfg = parse(&BASIC_YAML.replace("prediction: -1002", "prediction: -1001"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_instance_names() {
        let mut cfg = parse(&BASIC_YAML.replace("wat-main", "wat main"));
        let err = cfg.validate().expect_err("space in instance");
        assert!(err.to_string().contains("instance"));
    }

    #[test]
    fn empty_level_falls_back_to_info() {
        let mut cfg = parse(&BASIC_YAML.replace("\"debug\"", "\"\""));
        cfg.validate().expect("validate");
        assert_eq!(cfg.logging.tracing_level, "info");
    }
}
