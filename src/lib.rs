//! wheel-matrix - build-matrix configuration resolver for wheel builds
//!
//! Given a base configuration, per-platform tables, and ordered override
//! rules, this crate resolves the effective options for each build
//! identifier (`<interpreter>-<platform-arch>`, e.g. `cp39-win_amd64`) that
//! an external wheel build tool consumes.

pub mod config;
pub mod context;
pub mod logging;
pub mod options;
pub mod resolver;
pub mod selection;

pub use config::{
    ConfigError, ConfigFragment, ConfigValue, EffectiveConfig, Layer, MergePolicies, MergePolicy,
    ProjectConfig,
};
pub use context::{Arch, BuildContext, ContextError, Platform};
pub use options::{BuildOptions, OptionsError};
pub use resolver::{resolve, ConfigResolver, OverrideRule, ResolveError};
pub use selection::{BuildMatrix, BuildPlan, BuildSelection, PlanEntry, SelectionError};
pub use wheel_selector::{PatternError, PatternList, SelectorPattern};
