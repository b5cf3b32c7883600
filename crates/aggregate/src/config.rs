//! Aggregate configuration.
//!
//! # Example
//!
//! ```toml
//! [aggregate]
//! hrn = "plc.princeton"
//! interface = "aggregate"
//! flavour = "fake"
//! caching = true
//! cache_ttl_secs = 300
//! call_timeout_secs = 30
//!
//! [rspec]
//! default_type = "GENI"
//! default_version = "3"
//! enabled = ["GENI 3", "SFA 1"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sfa_rspec::{VersionRegistry, VersionRequest};

use crate::error::ConfigError;

/// Which federation role this process plays. It selects the policy chains
/// run on requests and RSpecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    #[default]
    Aggregate,
    Slicemgr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    pub aggregate: AggregateSettings,
    #[serde(default)]
    pub rspec: RSpecSettings,
}

/// `[aggregate]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSettings {
    /// HRN of this aggregate; it is also the authority of every sliver URN
    /// minted here.
    pub hrn: String,
    #[serde(default)]
    pub interface: InterfaceKind,
    #[serde(default = "default_flavour")]
    pub flavour: String,
    #[serde(default = "default_true")]
    pub caching: bool,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Upper bound on each driver call. No bound when absent.
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
}

/// `[rspec]` section. `enabled` entries are `"<type> <version>"`; an empty
/// list enables every shipped dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RSpecSettings {
    #[serde(default = "default_type")]
    pub default_type: String,
    #[serde(default = "default_version")]
    pub default_version: String,
    #[serde(default)]
    pub enabled: Vec<String>,
}

fn default_flavour() -> String {
    "fake".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_type() -> String {
    "GENI".to_string()
}

fn default_version() -> String {
    "3".to_string()
}

impl Default for RSpecSettings {
    fn default() -> Self {
        RSpecSettings {
            default_type: default_type(),
            default_version: default_version(),
            enabled: Vec::new(),
        }
    }
}

impl AggregateConfig {
    /// A configuration with every default and the given HRN.
    pub fn new(hrn: impl Into<String>) -> Self {
        AggregateConfig {
            aggregate: AggregateSettings {
                hrn: hrn.into(),
                interface: InterfaceKind::default(),
                flavour: default_flavour(),
                caching: true,
                cache_ttl_secs: default_cache_ttl(),
                call_timeout_secs: None,
            },
            rspec: RSpecSettings::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AggregateConfig = toml::from_str(content)?;
        if config.aggregate.hrn.trim().is_empty() {
            return Err(ConfigError::Invalid("aggregate.hrn must not be empty".into()));
        }
        config.enabled_versions()?;
        Ok(config)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.aggregate.call_timeout_secs.map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.aggregate.cache_ttl_secs)
    }

    pub fn default_version(&self) -> VersionRequest {
        VersionRequest::new(&self.rspec.default_type, &self.rspec.default_version)
    }

    /// Parse the `enabled` list.
    pub fn enabled_versions(&self) -> Result<Vec<VersionRequest>, ConfigError> {
        self.rspec
            .enabled
            .iter()
            .map(|entry| {
                let mut parts = entry.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(t), Some(v), None) => Ok(VersionRequest::new(t, v)),
                    _ => Err(ConfigError::Invalid(format!(
                        "rspec.enabled entry '{entry}' is not '<type> <version>'"
                    ))),
                }
            })
            .collect()
    }

    /// The builtin registry narrowed to the enabled dialects, with the
    /// configured default.
    pub fn version_registry(&self) -> Result<VersionRegistry, ConfigError> {
        let mut registry = VersionRegistry::builtin();
        let enabled = self.enabled_versions()?;
        if !enabled.is_empty() {
            registry.retain(&enabled);
        }
        registry
            .set_default(self.default_version())
            .map_err(|e| ConfigError::Invalid(format!("rspec default: {e}")))?;
        Ok(registry)
    }
}
