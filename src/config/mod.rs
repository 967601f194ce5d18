//! Configuration layers and merging
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults (optional)
//! 2. Base options (`[tool.cibuildwheel]`)
//! 3. Platform table (`[tool.cibuildwheel.<platform>]`)
//! 4. Matching `[[tool.cibuildwheel.overrides]]`, in declaration order

mod defaults;
mod effective;
mod file;
mod merge;
mod policy;
mod value;

pub use defaults::{BuiltinDefaults, DEFAULT_MANYLINUX_IMAGE};
pub use effective::{ConfigSource, EffectiveConfig, Layer, SCHEMA_ID};
pub use file::{ConfigError, ProjectConfig, KNOWN_OPTIONS, TOOL_TABLE};
pub use merge::{merge_into, merge_layers, merge_value, KindConflict};
pub use policy::{MergePolicies, MergePolicy, SKIP_KEY};
pub use value::{ConfigFragment, ConfigValue, ValueKind};
