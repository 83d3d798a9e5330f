use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;

use crate::workflow::WorkflowSettings;

const DEFAULT_CONFIG_TOML: &str = include_str!("taskflow.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskFlowConfig {
    pub storage: StorageConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub remote_dir: PathBuf,
    pub blob_dir: PathBuf,
    pub report_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    pub reminder_lead_minutes: i64,
    pub due_soon_hours: i64,
    pub media_content_type: String,
    pub signature_content_type: String,
    pub render_reports: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: String,
}

/// Storage locations with relative paths resolved against a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub db_path: PathBuf,
    pub remote_dir: PathBuf,
    pub blob_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl TaskFlowConfig {
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG_TOML)
    }

    /// Built-in defaults overlaid with the file at `path`, if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::defaults();
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parses `raw` on top of the built-in defaults.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::from_str(DEFAULT_CONFIG_TOML)?;
        let overrides: toml::Table = toml::from_str(raw)?;
        merge_tables(&mut merged, overrides);

        let config: TaskFlowConfig = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.reminder_lead_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "workflow.reminder_lead_minutes must be positive".to_string(),
            ));
        }
        if self.workflow.due_soon_hours <= 0 {
            return Err(ConfigError::Invalid(
                "workflow.due_soon_hours must be positive".to_string(),
            ));
        }
        for (key, value) in [
            ("workflow.media_content_type", &self.workflow.media_content_type),
            (
                "workflow.signature_content_type",
                &self.workflow.signature_content_type,
            ),
            ("logging.filter", &self.logging.filter),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            reminder_lead: Duration::minutes(self.workflow.reminder_lead_minutes),
            media_content_type: self.workflow.media_content_type.clone(),
            signature_content_type: self.workflow.signature_content_type.clone(),
        }
    }

    pub fn due_soon(&self) -> Duration {
        Duration::hours(self.workflow.due_soon_hours)
    }
}

impl StorageConfig {
    pub fn resolve(&self, root: &Path) -> StoragePaths {
        StoragePaths {
            db_path: resolve_path(root, &self.db_path),
            remote_dir: resolve_path(root, &self.remote_dir),
            blob_dir: resolve_path(root, &self.blob_dir),
            report_dir: resolve_path(root, &self.report_dir),
        }
    }
}

fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
