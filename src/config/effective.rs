//! Effective configuration with full provenance
//!
//! The effective config captures the merged fragment for one build
//! identifier plus information about where each value came from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use super::value::{ConfigFragment, ConfigValue};

/// Schema identifier
pub const SCHEMA_ID: &str = "wheel-matrix/effective_config@1";

/// A configuration layer, in precedence order lowest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "lowercase")]
pub enum Layer {
    Defaults,
    Base,
    Platform { name: String },
    /// Override rule by declaration index
    Override { index: usize, select: String },
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Defaults => write!(f, "defaults"),
            Layer::Base => write!(f, "base"),
            Layer::Platform { name } => write!(f, "platform '{}'", name),
            Layer::Override { index, select } => write!(f, "override #{} ('{}')", index, select),
        }
    }
}

/// Project file the layers were read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// File path
    pub path: String,

    /// SHA-256 digest of raw file bytes
    pub digest: String,
}

/// Merged configuration for one build identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// Schema identifier
    pub schema_id: String,

    /// Composite identifier the config was resolved for
    pub identifier: String,

    /// The merged configuration
    pub config: ConfigFragment,

    /// Contributing layers in the order they were applied
    pub layers: Vec<Layer>,

    /// Last layer to set each key
    pub origins: BTreeMap<String, Layer>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ConfigSource>,
}

impl EffectiveConfig {
    pub(crate) fn new(identifier: String, source: Option<ConfigSource>) -> Self {
        Self {
            schema_id: SCHEMA_ID.to_string(),
            identifier,
            config: ConfigFragment::new(),
            layers: Vec::new(),
            origins: BTreeMap::new(),
            source,
        }
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// RFC 8785 canonical JSON bytes
    pub fn canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json_canonicalizer::to_vec(self)
    }

    /// SHA-256 hex digest of the canonical JSON of the merged config only
    ///
    /// Provenance is excluded so two identifiers that end up with the same
    /// options share a digest.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(&self.config)?;
        let mut hasher = Sha256::new();
        hasher.update(&jcs_bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a config value by path (dot-separated for nested tables)
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        let mut parts = path.split('.');
        let mut current = self.config.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Get a config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Which layer set a top-level key
    pub fn origin(&self, key: &str) -> Option<&Layer> {
        self.origins.get(key)
    }
}
