//! Build-matrix resolution
//!
//! Layers are applied in a fixed order, each merged on top of the last:
//! 1. Built-in defaults (optional)
//! 2. Base configuration
//! 3. The platform table matching the context, if any
//! 4. Every override rule whose selector matches the context's identifier,
//!    in declaration order
//!
//! Selectors are compiled once when the resolver is built, so a malformed
//! pattern fails before any context is resolved.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::thread;
use thiserror::Error;
use tracing::{debug, trace};
use wheel_selector::{PatternError, PatternList};

use crate::config::{
    merge_into, BuiltinDefaults, ConfigFragment, ConfigSource, EffectiveConfig, KindConflict, Layer,
    MergePolicies, ProjectConfig, ValueKind,
};
use crate::context::BuildContext;

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Selector syntax error in an override rule
    #[error("malformed selector in override #{index}: {source}")]
    MalformedPattern {
        index: usize,
        #[source]
        source: PatternError,
    },

    /// Two layers set the same key with incompatible shapes
    #[error(
        "type conflict for '{key}': {existing_layer} sets a {existing_kind}, {incoming_layer} sets a {incoming_kind}"
    )]
    MergeTypeConflict {
        key: String,
        existing_layer: Layer,
        existing_kind: ValueKind,
        incoming_layer: Layer,
        incoming_kind: ValueKind,
    },

    /// Platform entry required but absent
    #[error("no configuration for platform '{0}'")]
    UnknownPlatform(String),
}

/// A conditional fragment applied when `select` matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    select: String,
    fragment: ConfigFragment,
}

impl OverrideRule {
    /// `select` is one or more whitespace-separated selector patterns
    pub fn new(select: impl Into<String>, fragment: ConfigFragment) -> Self {
        Self {
            select: select.into(),
            fragment,
        }
    }

    pub fn select(&self) -> &str {
        &self.select
    }

    pub fn fragment(&self) -> &ConfigFragment {
        &self.fragment
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    index: usize,
    selector: PatternList,
    rule: OverrideRule,
}

/// Resolves effective configurations from a fixed set of layers
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    defaults: Option<ConfigFragment>,
    base: ConfigFragment,
    platforms: BTreeMap<String, ConfigFragment>,
    rules: Vec<CompiledRule>,
    policies: MergePolicies,
    require_platform: bool,
    source: Option<ConfigSource>,
}

impl ConfigResolver {
    /// Compile every rule selector; fails on the first malformed one
    pub fn new(
        base: ConfigFragment,
        platforms: BTreeMap<String, ConfigFragment>,
        rules: Vec<OverrideRule>,
    ) -> Result<Self, ResolveError> {
        let compiled = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                let selector = PatternList::parse(&rule.select)
                    .map_err(|source| ResolveError::MalformedPattern { index, source })?;
                Ok(CompiledRule {
                    index,
                    selector,
                    rule,
                })
            })
            .collect::<Result<Vec<_>, ResolveError>>()?;

        Ok(Self {
            defaults: None,
            base,
            platforms,
            rules: compiled,
            policies: MergePolicies::default(),
            require_platform: false,
            source: None,
        })
    }

    /// Build from a loaded project file, keeping its provenance
    pub fn from_project(project: &ProjectConfig) -> Result<Self, ResolveError> {
        let mut resolver = Self::new(
            project.base.clone(),
            project.platforms.clone(),
            project.rules.clone(),
        )?;
        resolver.source = project.source.clone();
        Ok(resolver)
    }

    /// Add a layer beneath `base`
    pub fn with_defaults(mut self, defaults: ConfigFragment) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn with_builtin_defaults(self) -> Self {
        self.with_defaults(BuiltinDefaults::default().to_fragment())
    }

    pub fn with_policies(mut self, policies: MergePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Treat a missing platform entry as an error instead of "no override"
    pub fn require_platform(mut self, required: bool) -> Self {
        self.require_platform = required;
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Resolve the effective configuration for one context
    pub fn resolve(&self, context: &BuildContext) -> Result<EffectiveConfig, ResolveError> {
        let identifier = context.identifier();
        let mut effective = EffectiveConfig::new(identifier.to_string(), self.source.clone());

        if let Some(defaults) = &self.defaults {
            self.apply(&mut effective, defaults, Layer::Defaults)?;
        }

        self.apply(&mut effective, &self.base, Layer::Base)?;

        let platform = context.platform().as_str();
        match self.platforms.get(platform) {
            Some(fragment) => {
                let layer = Layer::Platform {
                    name: platform.to_string(),
                };
                self.apply(&mut effective, fragment, layer)?;
            }
            None if self.require_platform => {
                return Err(ResolveError::UnknownPlatform(platform.to_string()));
            }
            None => trace!(identifier, platform, "no platform layer"),
        }

        for compiled in &self.rules {
            match compiled.selector.first_match(identifier) {
                Some(pattern) => {
                    debug!(identifier, rule = compiled.index, pattern = %pattern, "override matched");
                    let layer = Layer::Override {
                        index: compiled.index,
                        select: compiled.rule.select.clone(),
                    };
                    self.apply(&mut effective, &compiled.rule.fragment, layer)?;
                }
                None => trace!(identifier, rule = compiled.index, "override not matched"),
            }
        }

        debug!(
            identifier,
            layers = effective.layers.len(),
            keys = effective.config.len(),
            "resolved"
        );
        Ok(effective)
    }

    /// Resolve many contexts in parallel; results keep input order
    pub fn resolve_all(&self, contexts: &[BuildContext]) -> Vec<Result<EffectiveConfig, ResolveError>> {
        if contexts.len() <= 1 {
            return contexts.iter().map(|c| self.resolve(c)).collect();
        }

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(contexts.len());
        let chunk_size = contexts.len().div_ceil(workers);

        thread::scope(|scope| {
            let handles: Vec<_> = contexts
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || chunk.iter().map(|c| self.resolve(c)).collect::<Vec<_>>())
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }

    fn apply(
        &self,
        effective: &mut EffectiveConfig,
        fragment: &ConfigFragment,
        layer: Layer,
    ) -> Result<(), ResolveError> {
        trace!(layer = %layer, keys = fragment.len(), "applying layer");

        merge_into(&mut effective.config, fragment, &self.policies)
            .map_err(|conflict| conflict_error(&effective.origins, conflict, &layer))?;

        for key in fragment.keys() {
            effective.origins.insert(key.to_string(), layer.clone());
        }
        effective.layers.push(layer);
        Ok(())
    }
}

fn conflict_error(origins: &BTreeMap<String, Layer>, conflict: KindConflict, incoming: &Layer) -> ResolveError {
    let top_key = conflict.key.split('.').next().unwrap_or(&conflict.key);
    let existing_layer = origins.get(top_key).cloned().unwrap_or(Layer::Base);

    ResolveError::MergeTypeConflict {
        key: conflict.key,
        existing_layer,
        existing_kind: conflict.existing,
        incoming_layer: incoming.clone(),
        incoming_kind: conflict.incoming,
    }
}

/// One-shot resolution without defaults
pub fn resolve(
    base: &ConfigFragment,
    platform_configs: &BTreeMap<String, ConfigFragment>,
    rules: &[OverrideRule],
    context: &BuildContext,
) -> Result<EffectiveConfig, ResolveError> {
    ConfigResolver::new(base.clone(), platform_configs.clone(), rules.to_vec())?.resolve(context)
}
