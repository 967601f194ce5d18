//! Per-key merge policies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key whose layers accumulate rather than replace
pub const SKIP_KEY: &str = "skip";

/// How an overlay value combines with an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Overlay wins entirely
    #[default]
    Replace,
    /// Pattern lists are unioned, existing items first
    Append,
    /// Tables merge key by key, recursively
    DeepMerge,
}

/// Policy lookup: explicit per-key entries, falling back to a default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicies {
    fallback: MergePolicy,
    per_key: BTreeMap<String, MergePolicy>,
}

impl Default for MergePolicies {
    /// `skip` appends, everything else replaces
    fn default() -> Self {
        Self::replace_all().with(SKIP_KEY, MergePolicy::Append)
    }
}

impl MergePolicies {
    /// No appendable keys at all
    pub fn replace_all() -> Self {
        Self {
            fallback: MergePolicy::Replace,
            per_key: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, policy: MergePolicy) -> Self {
        self.per_key.insert(key.into(), policy);
        self
    }

    pub fn policy_for(&self, key: &str) -> MergePolicy {
        self.per_key.get(key).copied().unwrap_or(self.fallback)
    }
}
