//! Project configuration file (pyproject.toml or standalone TOML)
//!
//! Options live under `[tool.cibuildwheel]` in a pyproject-style document,
//! or at the root of a standalone file. Inside that table:
//! - plain keys form the base layer
//! - `[linux]`, `[windows]`, `[macos]` sub-tables form platform layers
//! - `[[overrides]]` entries form the ordered rule list; each needs `select`

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use super::effective::ConfigSource;
use super::value::{ConfigFragment, ConfigValue};
use crate::context::Platform;
use crate::resolver::OverrideRule;

/// Table name under `[tool]`
pub const TOOL_TABLE: &str = "cibuildwheel";

/// Reserved key holding the override array
pub const OVERRIDES_KEY: &str = "overrides";

/// Reserved key holding an override's selector
pub const SELECT_KEY: &str = "select";

/// Options understood by downstream tooling. Anything else is kept but
/// logged, since a typo silently does nothing.
pub const KNOWN_OPTIONS: &[&str] = &[
    "archs",
    "before-all",
    "before-build",
    "before-test",
    "build",
    "build-frontend",
    "build-verbosity",
    "config-settings",
    "dependency-versions",
    "environment",
    "environment-pass",
    "manylinux-aarch64-image",
    "manylinux-i686-image",
    "manylinux-ppc64le-image",
    "manylinux-s390x-image",
    "manylinux-x86_64-image",
    "repair-wheel-command",
    "skip",
    "test-command",
    "test-extras",
    "test-requires",
    "test-skip",
];

/// Error types for config file operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config at '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// All layers declared by one project file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    pub base: ConfigFragment,

    /// Keyed by platform identifier (`linux`, `windows`, `macos`)
    pub platforms: BTreeMap<String, ConfigFragment>,

    /// In declaration order
    pub rules: Vec<OverrideRule>,

    /// Set when loaded from disk
    pub source: Option<ConfigSource>,
}

impl ProjectConfig {
    /// Load and parse a TOML file, recording its path and digest
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::invalid(path.display().to_string(), format!("invalid UTF-8: {}", e)))?;

        let mut config = Self::from_str(&contents)?;
        config.source = Some(ConfigSource {
            path: path.display().to_string(),
            digest,
        });
        Ok(config)
    }

    fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
        let mut config = ProjectConfig::default();

        for (key, value) in table {
            if let Ok(platform) = key.parse::<Platform>() {
                let fragment = fragment_from(&key, value)?;
                warn_unknown(&key, &fragment);
                config.platforms.insert(platform.as_str().to_string(), fragment);
            } else if key == OVERRIDES_KEY {
                config.rules = parse_overrides(value)?;
            } else {
                check_known(&key);
                let converted = ConfigValue::from_toml(value).map_err(|e| ConfigError::invalid(&key, e))?;
                config.base.insert(key, converted);
            }
        }

        debug!(
            base_keys = config.base.len(),
            platforms = config.platforms.len(),
            rules = config.rules.len(),
            "parsed project config"
        );
        Ok(config)
    }
}

/// Parse config from a TOML string
impl FromStr for ProjectConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut root: toml::Table = toml::from_str(s)?;

        let table = match root.remove("tool") {
            Some(toml::Value::Table(mut tool)) => match tool.remove(TOOL_TABLE) {
                Some(toml::Value::Table(t)) => t,
                Some(_) => {
                    return Err(ConfigError::invalid(
                        format!("tool.{}", TOOL_TABLE),
                        "expected a table",
                    ))
                }
                None => {
                    debug!("no [tool.{}] table, using empty config", TOOL_TABLE);
                    toml::Table::new()
                }
            },
            Some(_) => return Err(ConfigError::invalid("tool", "expected a table")),
            None => root,
        };

        Self::from_table(table)
    }

}

fn fragment_from(key: &str, value: toml::Value) -> Result<ConfigFragment, ConfigError> {
    match value {
        toml::Value::Table(t) => {
            ConfigFragment::from_toml_table(t).map_err(|e| ConfigError::invalid(key, e))
        }
        _ => Err(ConfigError::invalid(key, "expected a table")),
    }
}

fn parse_overrides(value: toml::Value) -> Result<Vec<OverrideRule>, ConfigError> {
    let entries = match value {
        toml::Value::Array(entries) => entries,
        _ => return Err(ConfigError::invalid(OVERRIDES_KEY, "expected an array of tables")),
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let path = format!("{}[{}]", OVERRIDES_KEY, index);
        let mut table = match entry {
            toml::Value::Table(t) => t,
            _ => return Err(ConfigError::invalid(path, "expected a table")),
        };

        let select = match table.remove(SELECT_KEY) {
            Some(toml::Value::String(s)) => s,
            Some(toml::Value::Array(items)) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        toml::Value::String(s) => parts.push(s),
                        _ => {
                            return Err(ConfigError::invalid(
                                format!("{}.{}", path, SELECT_KEY),
                                "selector list items must be strings",
                            ))
                        }
                    }
                }
                parts.join(" ")
            }
            Some(_) => {
                return Err(ConfigError::invalid(
                    format!("{}.{}", path, SELECT_KEY),
                    "expected a string or list of strings",
                ))
            }
            None => return Err(ConfigError::invalid(path, "missing 'select'")),
        };

        if select.split_whitespace().next().is_none() {
            warn!(rule = index, "override has an empty selector and never matches");
        }

        let fragment = fragment_from(&path, toml::Value::Table(table))?;
        if fragment.is_empty() {
            warn!(rule = index, select = %select, "override sets no options");
        }
        warn_unknown(&path, &fragment);
        rules.push(OverrideRule::new(select, fragment));
    }
    Ok(rules)
}

fn check_known(key: &str) {
    if !KNOWN_OPTIONS.contains(&key) {
        warn!(option = key, "unknown option");
    }
}

fn warn_unknown(scope: &str, fragment: &ConfigFragment) {
    for key in fragment.keys() {
        if !KNOWN_OPTIONS.contains(&key) {
            warn!(scope, option = key, "unknown option");
        }
    }
}
