//! Configuration merge logic
//!
//! Merges one fragment on top of another:
//! - Absent keys: added
//! - Replace keys: overlay wins entirely (lists are NOT concatenated)
//! - Append keys: pattern lists are unioned, existing items first
//! - DeepMerge keys: tables merge by key, recursively
//!
//! Values of different shapes under the same key are a conflict.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::policy::{MergePolicies, MergePolicy};
use super::value::{ConfigFragment, ConfigValue, ValueKind};

/// Two values of incompatible shape under one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindConflict {
    /// Dotted path to the key (nested for deep-merged tables)
    pub key: String,
    pub existing: ValueKind,
    pub incoming: ValueKind,
}

/// Merge `overlay` into `acc` in place.
///
/// On conflict `acc` may be partially updated; callers treat the error as
/// fatal and discard it.
pub fn merge_into(
    acc: &mut ConfigFragment,
    overlay: &ConfigFragment,
    policies: &MergePolicies,
) -> Result<(), KindConflict> {
    for (key, incoming) in overlay {
        match acc.entry(key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(incoming.clone());
            }
            Entry::Occupied(mut slot) => {
                let merged = merge_value(key, slot.get(), incoming, policies.policy_for(key))?;
                slot.insert(merged);
            }
        }
    }
    Ok(())
}

/// Merge layers in order (first is lowest precedence)
pub fn merge_layers<'a, I>(layers: I, policies: &MergePolicies) -> Result<ConfigFragment, KindConflict>
where
    I: IntoIterator<Item = &'a ConfigFragment>,
{
    let mut acc = ConfigFragment::new();
    for layer in layers {
        merge_into(&mut acc, layer, policies)?;
    }
    Ok(acc)
}

/// Merge a single value pair under `policy`
pub fn merge_value(
    key: &str,
    existing: &ConfigValue,
    incoming: &ConfigValue,
    policy: MergePolicy,
) -> Result<ConfigValue, KindConflict> {
    let conflict = || KindConflict {
        key: key.to_string(),
        existing: existing.kind(),
        incoming: incoming.kind(),
    };

    match policy {
        MergePolicy::Append => match (existing, incoming) {
            (ConfigValue::Table(_), _) | (_, ConfigValue::Table(_)) => Err(conflict()),
            (ConfigValue::String(a), ConfigValue::String(b)) => {
                Ok(ConfigValue::String(union_items(pattern_items(a), pattern_items(b)).join(" ")))
            }
            (a, b) => Ok(ConfigValue::List(union_items(value_items(a), value_items(b)))),
        },
        MergePolicy::DeepMerge => match (existing, incoming) {
            (ConfigValue::Table(a), ConfigValue::Table(b)) => {
                Ok(ConfigValue::Table(deep_merge_tables(key, a, b)?))
            }
            _ if existing.kind() == incoming.kind() => Ok(incoming.clone()),
            _ => Err(conflict()),
        },
        MergePolicy::Replace => {
            if existing.kind() == incoming.kind() {
                Ok(incoming.clone())
            } else {
                Err(conflict())
            }
        }
    }
}

fn deep_merge_tables(
    path: &str,
    base: &BTreeMap<String, ConfigValue>,
    overlay: &BTreeMap<String, ConfigValue>,
) -> Result<BTreeMap<String, ConfigValue>, KindConflict> {
    let mut merged = base.clone();
    for (key, incoming) in overlay {
        let value = match merged.get(key) {
            Some(existing) => {
                let nested = format!("{}.{}", path, key);
                merge_value(&nested, existing, incoming, MergePolicy::DeepMerge)?
            }
            None => incoming.clone(),
        };
        merged.insert(key.clone(), value);
    }
    Ok(merged)
}

fn pattern_items(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn value_items(value: &ConfigValue) -> Vec<&str> {
    match value {
        ConfigValue::String(s) => pattern_items(s),
        ConfigValue::List(items) => items.iter().flat_map(|i| i.split_whitespace()).collect(),
        ConfigValue::Table(_) => Vec::new(),
    }
}

/// `a` then the items of `b` not already present; duplicates dropped
fn union_items(a: Vec<&str>, b: Vec<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(a.len() + b.len());
    for item in a.into_iter().chain(b) {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> ConfigValue {
        ConfigValue::Table(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), ConfigValue::from(*v)))
                .collect(),
        )
    }

    #[test]
    fn test_scalar_override() {
        let mut acc = ConfigFragment::new().with("test-command", "pytest");
        let overlay = ConfigFragment::new().with("test-command", "python -m pytest");
        merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap();
        assert_eq!(acc.get("test-command").unwrap().as_str(), Some("python -m pytest"));
    }

    #[test]
    fn test_add_new_key() {
        let mut acc = ConfigFragment::new().with("a", "1");
        let overlay = ConfigFragment::new().with("b", "2");
        merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap();
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_list_replace() {
        let mut acc = ConfigFragment::new().with("test-requires", vec!["pytest", "numpy"]);
        let overlay = ConfigFragment::new().with("test-requires", vec!["hypothesis"]);
        merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap();

        // Replaced, not concatenated
        assert_eq!(
            acc.get("test-requires").unwrap().as_list().unwrap(),
            &["hypothesis".to_string()]
        );
    }

    #[test]
    fn test_skip_appends_strings() {
        let mut acc = ConfigFragment::new().with("skip", "pp*");
        let overlay = ConfigFragment::new().with("skip", "cp36* pp*");
        merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap();
        assert_eq!(acc.get("skip").unwrap().as_str(), Some("pp* cp36*"));
    }

    #[test]
    fn test_skip_appends_mixed_to_list() {
        let mut acc = ConfigFragment::new().with("skip", "pp* cp36*");
        let overlay = ConfigFragment::new().with("skip", vec!["cp37*", "cp36*"]);
        merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap();
        assert_eq!(
            acc.get("skip").unwrap().as_list().unwrap(),
            &["pp*".to_string(), "cp36*".to_string(), "cp37*".to_string()]
        );
    }

    #[test]
    fn test_skip_replaces_when_policy_says_so() {
        let mut acc = ConfigFragment::new().with("skip", "pp*");
        let overlay = ConfigFragment::new().with("skip", "cp36*");
        merge_into(&mut acc, &overlay, &MergePolicies::replace_all()).unwrap();
        assert_eq!(acc.get("skip").unwrap().as_str(), Some("cp36*"));
    }

    #[test]
    fn test_table_replaced_by_default() {
        let mut acc = ConfigFragment::new().with("environment", table(&[("A", "1"), ("B", "2")]));
        let overlay = ConfigFragment::new().with("environment", table(&[("B", "3")]));
        merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap();
        assert_eq!(acc.get("environment").unwrap(), &table(&[("B", "3")]));
    }

    #[test]
    fn test_table_deep_merge_opt_in() {
        let policies = MergePolicies::default().with("environment", MergePolicy::DeepMerge);
        let mut acc = ConfigFragment::new().with("environment", table(&[("A", "1"), ("B", "2")]));
        let overlay = ConfigFragment::new().with("environment", table(&[("B", "3"), ("C", "4")]));
        merge_into(&mut acc, &overlay, &policies).unwrap();
        assert_eq!(
            acc.get("environment").unwrap(),
            &table(&[("A", "1"), ("B", "3"), ("C", "4")])
        );
    }

    #[test]
    fn test_list_vs_scalar_conflict() {
        let mut acc = ConfigFragment::new().with("test-skip", "*-win32");
        let overlay = ConfigFragment::new().with("test-skip", vec!["*-win32"]);
        let err = merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap_err();
        assert_eq!(
            err,
            KindConflict {
                key: "test-skip".to_string(),
                existing: ValueKind::String,
                incoming: ValueKind::List,
            }
        );
    }

    #[test]
    fn test_append_rejects_table() {
        let mut acc = ConfigFragment::new().with("skip", "pp*");
        let overlay = ConfigFragment::new().with("skip", table(&[("x", "y")]));
        let err = merge_into(&mut acc, &overlay, &MergePolicies::default()).unwrap_err();
        assert_eq!(err.incoming, ValueKind::Table);
    }

    #[test]
    fn test_nested_conflict_path() {
        let policies = MergePolicies::default().with("environment", MergePolicy::DeepMerge);
        let mut nested = BTreeMap::new();
        nested.insert("PATH".to_string(), ConfigValue::from(vec!["a"]));
        let mut acc = ConfigFragment::new().with("environment", table(&[("PATH", "/usr/bin")]));
        let overlay = ConfigFragment::new().with("environment", ConfigValue::Table(nested));
        let err = merge_into(&mut acc, &overlay, &policies).unwrap_err();
        assert_eq!(err.key, "environment.PATH");
    }

    #[test]
    fn test_merge_layers() {
        let base = ConfigFragment::new().with("skip", "pp*").with("before-all", "a");
        let platform = ConfigFragment::new().with("before-all", "b");
        let rule = ConfigFragment::new().with("skip", "cp36*");

        let result = merge_layers([&base, &platform, &rule], &MergePolicies::default()).unwrap();
        assert_eq!(result.get("before-all").unwrap().as_str(), Some("b"));
        assert_eq!(result.get("skip").unwrap().as_str(), Some("pp* cp36*"));
    }
}
