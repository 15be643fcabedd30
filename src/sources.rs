// src/sources.rs
//! Source registry: the configured set of remote subscription sources.
//!
//! Definitions persist as a document with a `sources` collection. TOML and
//! JSON are both accepted on load (extension-hinted, with fallback); TOML is
//! written on save. The transient fetch scalars (`last_updated`,
//! `last_config_count`) never persist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INTERVAL_SECS: u64 = 360;

/// How a source's response body must be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Plain,
    Base64,
    Json,
}

/// One remote origin of proxy descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub enabled: bool,
    #[serde(rename = "timeout", default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(rename = "interval", default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Set by the fetch stage only, via [`SourceRegistry::apply_updates`].
    #[serde(skip)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub last_config_count: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            interval_secs: DEFAULT_INTERVAL_SECS,
            last_updated: None,
            last_config_count: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Configuration problems in source or rule definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("definition is missing the `sources` collection")]
    MissingSourcesKey,
    #[error("`sources` must be a list")]
    SourcesNotAList,
    #[error("source {index} is missing required field `{field}`")]
    MissingSourceField { index: usize, field: &'static str },
    #[error("source {index} is malformed: {reason}")]
    MalformedSource { index: usize, reason: String },
    #[error("source `{name}` already exists")]
    DuplicateName { name: String },
    #[error("rules definition must be a list")]
    RulesNotAList,
    #[error("rule {index} is missing required field `{field}`")]
    MissingRuleField { index: usize, field: &'static str },
    #[error("rule {index} is malformed: {reason}")]
    MalformedRule { index: usize, reason: String },
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing definition: {0}")]
    Parse(String),
}

/// Deltas from one successful fetch, applied through the registry only.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUpdate {
    pub name: String,
    pub fetched_at: DateTime<Utc>,
    pub config_count: u64,
}

/// Insertion-ordered set of sources, keyed by unique name.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML or JSON file holding a `sources` collection.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
    }

    /// Parse a definition document. `hint_ext` selects the format tried
    /// first; the other is a fallback so misnamed files still load.
    pub fn parse(content: &str, hint_ext: &str) -> Result<Self, ConfigError> {
        let value = if hint_ext == "json" {
            json_to_value(content).or_else(|_| toml_to_value(content))?
        } else {
            toml_to_value(content).or_else(|_| json_to_value(content))?
        };
        Self::from_value(value)
    }

    fn from_value(doc: serde_json::Value) -> Result<Self, ConfigError> {
        let entries = doc
            .get("sources")
            .ok_or(ConfigError::MissingSourcesKey)?
            .as_array()
            .ok_or(ConfigError::SourcesNotAList)?
            .clone();

        let mut registry = Self::new();
        for (index, entry) in entries.into_iter().enumerate() {
            for field in ["name", "url", "type", "enabled"] {
                if entry.get(field).is_none() {
                    return Err(ConfigError::MissingSourceField { index, field });
                }
            }
            let source: Source =
                serde_json::from_value(entry).map_err(|e| ConfigError::MalformedSource {
                    index,
                    reason: e.to_string(),
                })?;
            registry.add(source)?;
        }
        Ok(registry)
    }

    /// Persist as TOML. Transient fetch scalars are not written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        #[derive(Serialize)]
        struct Doc<'a> {
            sources: &'a [Source],
        }
        let doc = toml::to_string_pretty(&Doc {
            sources: &self.sources,
        })
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, doc).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject duplicates rather than silently overwriting.
    pub fn add(&mut self, source: Source) -> Result<(), ConfigError> {
        if self.get(&source.name).is_some() {
            return Err(ConfigError::DuplicateName {
                name: source.name.clone(),
            });
        }
        tracing::debug!(source = %source.name, "registered source");
        self.sources.push(source);
        Ok(())
    }

    /// Remove by name; returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.name != name);
        before != self.sources.len()
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Enabled sources in insertion order, cloned as an immutable snapshot
    /// for one fetch cycle.
    pub fn enabled_sources(&self) -> Vec<Source> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The single mutation path for fetch results. Updates for names no
    /// longer registered are dropped.
    pub fn apply_updates(&mut self, updates: &[SourceUpdate]) {
        for update in updates {
            if let Some(source) = self.sources.iter_mut().find(|s| s.name == update.name) {
                source.last_updated = Some(update.fetched_at);
                source.last_config_count = update.config_count;
            }
        }
    }
}

fn toml_to_value(content: &str) -> Result<serde_json::Value, ConfigError> {
    let v: toml::Value = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    serde_json::to_value(v).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn json_to_value(content: &str) -> Result<serde_json::Value, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}
