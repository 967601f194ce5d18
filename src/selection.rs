//! Build selection and matrix planning
//!
//! Decides, per identifier, whether a wheel is built and whether its tests
//! run. Each identifier is judged against its own effective configuration,
//! so an override can extend `skip` for part of the matrix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use wheel_selector::PatternList;

use crate::context::{Arch, BuildContext, ContextError, Platform};
use crate::options::{BuildOptions, OptionsError};
use crate::resolver::{ConfigResolver, ResolveError};

/// Schema version for build plans
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "wheel-matrix/build_plan@1";

/// Interpreters built when none are requested
pub const DEFAULT_INTERPRETERS: &[&str] = &["cp38", "cp39", "cp310", "cp311", "cp312", "pp39", "pp310"];

/// Planning errors
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{identifier}: {source}")]
    Options {
        identifier: String,
        #[source]
        source: OptionsError,
    },

    #[error("failed to hash config for {identifier}: {message}")]
    Digest { identifier: String, message: String },
}

/// The selector lists that gate building and testing
#[derive(Debug, Clone, Default)]
pub struct BuildSelection {
    build: PatternList,
    skip: PatternList,
    test_skip: PatternList,
    has_test_command: bool,
}

impl BuildSelection {
    pub fn new(build: PatternList, skip: PatternList, test_skip: PatternList) -> Self {
        Self {
            build,
            skip,
            test_skip,
            has_test_command: true,
        }
    }

    pub fn from_options(options: &BuildOptions) -> Self {
        Self {
            build: options.build.clone(),
            skip: options.skip.clone(),
            test_skip: options.test_skip.clone(),
            has_test_command: options.test_command.is_some(),
        }
    }

    /// Selected by `build` (or `build` is empty) and not matched by `skip`
    pub fn should_build(&self, identifier: &str) -> bool {
        (self.build.is_empty() || self.build.matches(identifier)) && !self.skip.matches(identifier)
    }

    /// Built, has a test command, and not matched by `test-skip`
    pub fn should_test(&self, identifier: &str) -> bool {
        self.has_test_command && self.should_build(identifier) && !self.test_skip.matches(identifier)
    }
}

/// Interpreters × architectures on one platform
#[derive(Debug, Clone)]
pub struct BuildMatrix {
    pub platform: Platform,
    pub interpreters: Vec<String>,
    pub archs: Vec<Arch>,
}

impl BuildMatrix {
    /// Default interpreters and the platform's default archs
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            interpreters: DEFAULT_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
            archs: platform.default_archs().to_vec(),
        }
    }

    pub fn with_interpreters(mut self, interpreters: Vec<String>) -> Self {
        self.interpreters = interpreters;
        self
    }

    pub fn with_archs(mut self, archs: Vec<Arch>) -> Self {
        self.archs = archs;
        self
    }

    /// Contexts in interpreter-major order
    pub fn contexts(&self) -> Result<Vec<BuildContext>, ContextError> {
        let mut contexts = Vec::with_capacity(self.interpreters.len() * self.archs.len());
        for interpreter in &self.interpreters {
            for arch in &self.archs {
                contexts.push(BuildContext::new(self.platform, interpreter.as_str(), *arch)?);
            }
        }
        Ok(contexts)
    }

    /// Resolve every context and decide what gets built and tested
    pub fn plan(&self, resolver: &ConfigResolver) -> Result<BuildPlan, SelectionError> {
        let contexts = self.contexts()?;
        let results = resolver.resolve_all(&contexts);

        let mut entries = Vec::with_capacity(contexts.len());
        for (context, result) in contexts.iter().zip(results) {
            let effective = result?;
            let identifier = context.identifier().to_string();

            let options = BuildOptions::from_effective(&effective).map_err(|source| {
                SelectionError::Options {
                    identifier: identifier.clone(),
                    source,
                }
            })?;
            let selection = BuildSelection::from_options(&options);
            let config_digest = effective.digest().map_err(|e| SelectionError::Digest {
                identifier: identifier.clone(),
                message: e.to_string(),
            })?;

            let build = selection.should_build(&identifier);
            let test = selection.should_test(&identifier);
            debug!(identifier = %identifier, build, test, "planned");

            entries.push(PlanEntry {
                identifier,
                interpreter: context.interpreter().to_string(),
                arch: context.arch(),
                build,
                test,
                config_digest,
            });
        }

        let plan = BuildPlan {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            platform: self.platform,
            entries,
        };
        info!(
            platform = %self.platform,
            total = plan.entries.len(),
            built = plan.built().count(),
            "build plan ready"
        );
        Ok(plan)
    }
}

/// One identifier in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub identifier: String,
    pub interpreter: String,
    pub arch: Arch,
    pub build: bool,
    pub test: bool,
    /// SHA-256 of the canonical effective config
    pub config_digest: String,
}

/// Build plan artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    pub platform: Platform,
    pub entries: Vec<PlanEntry>,
}

impl BuildPlan {
    /// Entries that will be built
    pub fn built(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.build)
    }

    /// Serialize to JSON (pretty printed)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFragment, ConfigValue};
    use crate::resolver::OverrideRule;
    use std::collections::BTreeMap;

    fn lists(build: &str, skip: &str, test_skip: &str) -> BuildSelection {
        BuildSelection::new(
            PatternList::parse(build).unwrap(),
            PatternList::parse(skip).unwrap(),
            PatternList::parse(test_skip).unwrap(),
        )
    }

    #[test]
    fn test_should_build() {
        let sel = lists("", "pp* cp36-*", "");
        assert!(sel.should_build("cp38-manylinux_x86_64"));
        assert!(!sel.should_build("pp39-manylinux_x86_64"));
        assert!(!sel.should_build("cp36-win32"));
    }

    #[test]
    fn test_build_list_restricts() {
        let sel = lists("cp3{11,12}-*", "*-win32", "");
        assert!(sel.should_build("cp311-win_amd64"));
        assert!(!sel.should_build("cp311-win32"));
        assert!(!sel.should_build("cp310-win_amd64"));
    }

    #[test]
    fn test_should_test() {
        let sel = lists("", "pp*", "*-manylinux_i686");
        assert!(sel.should_test("cp39-manylinux_x86_64"));
        assert!(!sel.should_test("cp39-manylinux_i686"));
        assert!(!sel.should_test("pp39-manylinux_x86_64"));
    }

    #[test]
    fn test_no_test_command_means_no_tests() {
        let options = BuildOptions::default();
        let sel = BuildSelection::from_options(&options);
        assert!(sel.should_build("cp39-win32"));
        assert!(!sel.should_test("cp39-win32"));
    }

    #[test]
    fn test_matrix_contexts_order() {
        let matrix = BuildMatrix::for_platform(Platform::Windows)
            .with_interpreters(vec!["cp38".into(), "cp39".into()]);
        let ids: Vec<String> = matrix
            .contexts()
            .unwrap()
            .iter()
            .map(|c| c.identifier().to_string())
            .collect();
        assert_eq!(ids, vec!["cp38-win_amd64", "cp38-win32", "cp39-win_amd64", "cp39-win32"]);
    }

    #[test]
    fn test_matrix_rejects_unsupported_arch() {
        let matrix = BuildMatrix::for_platform(Platform::Macos).with_archs(vec![Arch::I686]);
        assert!(matrix.contexts().is_err());
    }

    #[test]
    fn test_plan_uses_per_identifier_config() {
        let base = ConfigFragment::new()
            .with("skip", "pp*")
            .with("test-command", "pytest {project}");
        let rules = vec![
            OverrideRule::new("*-manylinux_i686", ConfigFragment::new().with("skip", "cp38-*")),
            OverrideRule::new("cp39-*", ConfigFragment::new().with("test-skip", "*")),
        ];
        let resolver = ConfigResolver::new(base, BTreeMap::new(), rules).unwrap();

        let matrix = BuildMatrix::for_platform(Platform::Linux)
            .with_interpreters(vec!["cp38".into(), "cp39".into(), "pp39".into()])
            .with_archs(vec![Arch::X86_64, Arch::I686]);
        let plan = matrix.plan(&resolver).unwrap();

        let by_id: BTreeMap<_, _> = plan.entries.iter().map(|e| (e.identifier.as_str(), e)).collect();
        assert!(by_id["cp38-manylinux_x86_64"].build);
        assert!(by_id["cp38-manylinux_x86_64"].test);
        assert!(!by_id["cp38-manylinux_i686"].build);
        assert!(by_id["cp39-manylinux_i686"].build);
        assert!(!by_id["cp39-manylinux_i686"].test);
        assert!(!by_id["pp39-manylinux_x86_64"].build);

        assert_eq!(plan.built().count(), 3);
        assert_eq!(plan.schema_id, SCHEMA_ID);
    }

    #[test]
    fn test_plan_surfaces_resolve_errors() {
        let mut platforms = BTreeMap::new();
        platforms.insert("linux".to_string(), ConfigFragment::new().with("skip", ConfigValue::Table(BTreeMap::new())));
        let resolver = ConfigResolver::new(ConfigFragment::new().with("skip", "pp*"), platforms, vec![]).unwrap();

        let err = BuildMatrix::for_platform(Platform::Linux).plan(&resolver).unwrap_err();
        assert!(matches!(err, SelectionError::Resolve(ResolveError::MergeTypeConflict { .. })));
    }
}
