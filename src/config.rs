use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{InquisitorError, Result};
use crate::types::ActionMode;

/// Environment variable that points at an explicit settings file
pub const CONFIG_ENV: &str = "INQUISITOR_CONFIG";

/// Settings files probed by [`InquisitorConfig::discover`], in order
pub const SEARCH_PATHS: [&str; 2] = ["./settings.toml", "/opt/settings.toml"];

/// Operator settings for the auditing and hijack-detection pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InquisitorConfig {
    /// Deployment name used in logs (default: a3s-inquisitor)
    #[serde(default = "default_name")]
    pub name: String,

    /// Fallback log filter when RUST_LOG is unset (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub auditing: AuditingConfig,

    #[serde(default)]
    pub actions: ActionsConfig,

    #[serde(default)]
    pub hijack: HijackConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Tag-compliance settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditingConfig {
    /// Tag names every audited resource must carry.
    /// Accepts a TOML list or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_tag_list")]
    pub required_tags: Vec<String>,
}

/// Remediation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// `dryrun` or `normal`; required by the tag-audit path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ActionMode>,

    /// strftime format of the timestamp in final snapshot names
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Prefix of final snapshot names
    #[serde(default = "default_snapshot_prefix")]
    pub snapshot_prefix: String,
}

/// Hijack resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HijackConfig {
    /// Maximum traversal rounds (default: 8)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Domain suffix of object-storage endpoints (default: amazonaws.com)
    #[serde(default = "default_storage_domain_suffix")]
    pub storage_domain_suffix: String,
}

/// "Change still pending" polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Hijack notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub sender: String,

    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_name() -> String {
    "a3s-inquisitor".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d-%H-%M-%S".to_string()
}

fn default_snapshot_prefix() -> String {
    "inquisitor-snapshot".to_string()
}

fn default_max_depth() -> usize {
    8
}

fn default_storage_domain_suffix() -> String {
    "amazonaws.com".to_string()
}

fn default_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_subject() -> String {
    "Potential DNS Hijack".to_string()
}

fn deserialize_tag_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagList {
        List(Vec<String>),
        Csv(String),
    }

    let raw = match TagList::deserialize(deserializer)? {
        TagList::List(tags) => tags,
        TagList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            mode: None,
            timestamp_format: default_timestamp_format(),
            snapshot_prefix: default_snapshot_prefix(),
        }
    }
}

impl Default for HijackConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            storage_domain_suffix: default_storage_domain_suffix(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: String::new(),
            recipients: Vec::new(),
            subject: default_subject(),
        }
    }
}

impl Default for InquisitorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            auditing: AuditingConfig::default(),
            actions: ActionsConfig::default(),
            hijack: HijackConfig::default(),
            polling: PollingConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl InquisitorConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            InquisitorError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: InquisitorConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Locate the settings file the way deployments lay it out.
    ///
    /// `INQUISITOR_CONFIG` wins when set (and must exist); otherwise the
    /// first of [`SEARCH_PATHS`] that exists is loaded. Returns defaults
    /// when nothing is found.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(PathBuf::from(path));
        }
        for candidate in SEARCH_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading settings");
                return Self::load(path);
            }
        }
        Ok(Self::default())
    }

    /// Save the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| InquisitorError::Config(format!("Failed to encode config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Required tag list, or a configuration error when empty
    pub fn required_tags(&self) -> Result<&[String]> {
        if self.auditing.required_tags.is_empty() {
            return Err(InquisitorError::Config(
                "auditing.required_tags is empty".to_string(),
            ));
        }
        Ok(&self.auditing.required_tags)
    }

    /// Action mode, or a configuration error when unset
    pub fn action_mode(&self) -> Result<ActionMode> {
        self.actions
            .mode
            .ok_or_else(|| InquisitorError::Config("actions.mode is not set".to_string()))
    }
}
