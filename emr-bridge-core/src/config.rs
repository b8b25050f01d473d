//! Bridge configuration and the token store key layout.
//!
//! The key layout is shared with the side that suspends the workflow and
//! writes the token; both must render exactly the same string:
//!
//! ```text
//! <token_prefix>/<cluster_state|step_state>/<resource_id>
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::{ResourceDomain, ResourceKey};

/// Prefix the suspend side writes tokens under.
pub const DEFAULT_TOKEN_PREFIX: &str = "/emr_launch/control_plane/task_tokens/emr_utilities";

pub const ENV_TOKEN_PREFIX: &str = "EMR_BRIDGE_TOKEN_PREFIX";
pub const ENV_DOMAIN: &str = "EMR_BRIDGE_DOMAIN";
pub const ENV_REGION: &str = "EMR_BRIDGE_REGION";
pub const ENV_LOG_FORMAT: &str = "EMR_BRIDGE_LOG_FORMAT";

// ─── Key layout ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    /// Use `prefix` verbatim (trailing slashes dropped).
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: trimmed.to_string(),
        }
    }

    /// `/<namespace>/task_tokens`.
    pub fn for_namespace(namespace: &str) -> Self {
        let namespace = namespace.trim_matches('/');
        Self::new(format!("/{namespace}/task_tokens"))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key_for(&self, key: &ResourceKey) -> String {
        format!("{}/{}/{}", self.prefix, key.domain.as_str(), key.resource_id)
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_PREFIX)
    }
}

// ─── BridgeConfig ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Root configuration, loadable from YAML or the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub token_prefix: String,
    pub domain: ResourceDomain,
    /// AWS region override; the SDK's default chain applies when unset.
    pub region: Option<String>,
    pub log_format: LogFormat,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            token_prefix: DEFAULT_TOKEN_PREFIX.to_string(),
            domain: ResourceDomain::Step,
            region: None,
            log_format: LogFormat::Text,
        }
    }
}

impl BridgeConfig {
    pub fn key_layout(&self) -> KeyLayout {
        KeyLayout::new(self.token_prefix.clone())
    }

    /// Parse YAML text. Missing fields take their defaults.
    pub fn from_yaml(content: &str) -> Result<Self, BridgeError> {
        serde_yaml::from_str(content)
            .map_err(|e| BridgeError::InvalidConfig(format!("Parsing config: {e}")))
    }

    pub fn load_from_file(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::InvalidConfig(format!("Reading {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Defaults overlaid with `EMR_BRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup` (an env-like source) onto `self`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(prefix) = lookup(ENV_TOKEN_PREFIX) {
            self.token_prefix = prefix;
        }
        if let Some(domain) = lookup(ENV_DOMAIN) {
            self.domain = ResourceDomain::parse(&domain).ok_or_else(|| {
                BridgeError::InvalidConfig(format!("{ENV_DOMAIN}: unknown domain {domain}"))
            })?;
        }
        if let Some(region) = lookup(ENV_REGION) {
            self.region = Some(region);
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.log_format = LogFormat::parse(&format).ok_or_else(|| {
                BridgeError::InvalidConfig(format!("{ENV_LOG_FORMAT}: unknown format {format}"))
            })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_key_matches_suspend_side() {
        let layout = KeyLayout::default();
        let key = ResourceKey::new(ResourceDomain::Step, "s-1");
        assert_eq!(
            layout.key_for(&key),
            "/emr_launch/control_plane/task_tokens/emr_utilities/step_state/s-1"
        );
    }

    #[test]
    fn test_namespace_layout() {
        let layout = KeyLayout::for_namespace("/acme/");
        let key = ResourceKey::new(ResourceDomain::Cluster, "j-1");
        assert_eq!(layout.key_for(&key), "/acme/task_tokens/cluster_state/j-1");
    }

    #[test]
    fn test_trailing_slash_normalised() {
        assert_eq!(KeyLayout::new("/p/").prefix(), "/p");
        assert_eq!(KeyLayout::new("/p//").prefix(), "/p");
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let config = BridgeConfig::from_yaml("domain: cluster\n").unwrap();
        assert_eq!(config.domain, ResourceDomain::Cluster);
        assert_eq!(config.token_prefix, DEFAULT_TOKEN_PREFIX);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token_prefix: /x/task_tokens").unwrap();
        writeln!(file, "region: eu-west-1").unwrap();
        writeln!(file, "log_format: json").unwrap();

        let config = BridgeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.key_layout().prefix(), "/x/task_tokens");
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_load_missing_file() {
        let err = BridgeConfig::load_from_file(Path::new("/nonexistent/bridge.yaml")).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_TOKEN_PREFIX, "/env/task_tokens"),
            (ENV_DOMAIN, "cluster"),
            (ENV_LOG_FORMAT, "JSON"),
        ]
        .into_iter()
        .collect();

        let config = BridgeConfig::default()
            .with_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.token_prefix, "/env/task_tokens");
        assert_eq!(config.domain, ResourceDomain::Cluster);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.region, None);
    }

    #[test]
    fn test_env_rejects_unknown_domain() {
        let result = BridgeConfig::default().with_overrides(|name| {
            (name == ENV_DOMAIN).then(|| "job".to_string())
        });
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
    }
}
