//! Configuration loading and management
//!
//! Handles parsing of `.forge.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the configuration file at the forge root
pub const CONFIG_FILENAME: &str = ".forge.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Tag defaults
    #[serde(default)]
    pub tags: TagsConfig,

    /// Group creation rules
    #[serde(default)]
    pub groups: GroupsConfig,

    /// Issue defaults seeded into new projects
    #[serde(default)]
    pub issues: IssuesConfig,

    /// Notification channels
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Background job queue
    #[serde(default)]
    pub jobs: JobsConfig,

    /// State lock behaviour
    #[serde(default)]
    pub lock: LockConfig,
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// Tag configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Color given to tags created implicitly by `tag add`
    #[serde(default = "default_tag_color")]
    pub default_color: String,
}

fn default_tag_color() -> String {
    "DeepSkyBlue".to_string()
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            default_color: default_tag_color(),
        }
    }
}

/// Group configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    /// Allowed group types
    #[serde(default = "default_group_types")]
    pub types: Vec<String>,

    /// Names nobody may register as a group
    #[serde(default = "default_group_blacklist")]
    pub blacklist: Vec<String>,
}

fn default_group_types() -> Vec<String> {
    vec!["user".to_string(), "admin".to_string()]
}

fn default_group_blacklist() -> Vec<String> {
    vec!["forks".to_string(), "group".to_string()]
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            types: default_group_types(),
            blacklist: default_group_blacklist(),
        }
    }
}

/// Issue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuesConfig {
    /// Close statuses every new project starts with
    #[serde(default = "default_close_statuses")]
    pub close_statuses: Vec<String>,
}

fn default_close_statuses() -> Vec<String> {
    vec![
        "Invalid".to_string(),
        "Insufficient data".to_string(),
        "Fixed".to_string(),
        "Duplicate".to_string(),
    ]
}

impl Default for IssuesConfig {
    fn default() -> Self {
        Self {
            close_statuses: default_close_statuses(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Write notifications to the event log
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Event log file, relative to `.forge/`
    #[serde(default = "default_events_file")]
    pub events_file: String,
}

fn default_true() -> bool {
    true
}

fn default_events_file() -> String {
    "events.jsonl".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            events_file: default_events_file(),
        }
    }
}

/// Job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Queue background jobs in `.forge/jobs.jsonl`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long to wait for the state lock
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.forge.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the forge root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILENAME);
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(path = %config_path.display(), %err, "ignoring invalid config");
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tags.default_color.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "tags.default_color cannot be empty".to_string(),
            ));
        }

        if self.groups.types.is_empty() {
            return Err(Error::InvalidConfig(
                "groups.types cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for group_type in &self.groups.types {
            let trimmed = group_type.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidConfig(
                    "groups.types cannot include empty entries".to_string(),
                ));
            }
            if !seen.insert(trimmed) {
                return Err(Error::InvalidConfig(format!(
                    "groups.types has duplicate entry '{trimmed}'"
                )));
            }
        }

        if self.issues.close_statuses.is_empty() {
            return Err(Error::InvalidConfig(
                "issues.close_statuses cannot be empty".to_string(),
            ));
        }
        if self
            .issues
            .close_statuses
            .iter()
            .any(|status| status.trim().is_empty())
        {
            return Err(Error::InvalidConfig(
                "issues.close_statuses cannot include empty entries".to_string(),
            ));
        }

        if self.notifications.events_file.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "notifications.events_file cannot be empty".to_string(),
            ));
        }

        if self.lock.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "lock.timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
