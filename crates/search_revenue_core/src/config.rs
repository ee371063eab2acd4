//! Engine configuration: site hosts, extra search engines and the purchase
//! event code, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERNAL_HOST: &str = "esshopzilla.com";
pub const DEFAULT_PURCHASE_EVENT_CODE: &str = "1";

/// Additional search engine recognized on top of the built-in table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchEngineRule {
    /// Canonical engine domain; the domain itself and all subdomains match.
    pub domain: String,
    /// Query parameter holding the search phrase.
    pub keyword_param: String,
}

impl SearchEngineRule {
    pub fn new(domain: impl Into<String>, keyword_param: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            keyword_param: keyword_param.into(),
        }
    }
}

/// Settings consumed by the attribution engine.
///
/// The engine never reads these from the environment itself; collaborators
/// (CLI, Lambda adapter, tests) build a config and inject it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Hosts of the site itself. Referrers from these hosts or their
    /// subdomains are internal navigation, never search touches.
    pub internal_hosts: Vec<String>,
    /// Engines checked before the built-in table.
    pub extra_engines: Vec<SearchEngineRule>,
    /// Event code marking a purchase hit in `event_list`.
    pub purchase_event_code: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            internal_hosts: vec![DEFAULT_INTERNAL_HOST.to_string()],
            extra_engines: Vec::new(),
            purchase_event_code: DEFAULT_PURCHASE_EVENT_CODE.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_internal_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            internal_hosts: hosts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|error| ConfigError::new(format!("Malformed engine config: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| {
            ConfigError::new(format!(
                "Failed to read engine config {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.internal_hosts.iter().any(|host| host.trim().is_empty()) {
            return Err(ConfigError::new("internal_hosts entries must be non-empty"));
        }

        for rule in &self.extra_engines {
            if rule.domain.trim().is_empty() {
                return Err(ConfigError::new("extra_engines domain must be non-empty"));
            }
            if rule.keyword_param.trim().is_empty() {
                return Err(ConfigError::new(format!(
                    "extra_engines entry '{}' must name a keyword_param",
                    rule.domain
                )));
            }
        }

        if self.purchase_event_code.trim().is_empty() {
            return Err(ConfigError::new("purchase_event_code must be non-empty"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConfigError {}
