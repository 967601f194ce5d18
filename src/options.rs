//! Typed view over an effective configuration
//!
//! Reads the options handed to the external build tool and checks their
//! shapes. Empty command strings mean "not set".

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use wheel_selector::{PatternError, PatternList};

use crate::config::{ConfigValue, EffectiveConfig, ValueKind};
use crate::context::Arch;

/// Placeholder replaced with the project checkout path
pub const PROJECT_PLACEHOLDER: &str = "{project}";

/// Placeholder replaced with the package directory
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Errors reading typed options
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("option '{key}' must be {expected}, found a {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: ValueKind,
    },

    #[error("invalid pattern in '{key}': {source}")]
    Pattern {
        key: String,
        #[source]
        source: PatternError,
    },

    #[error("invalid environment assignment '{0}': expected KEY=VALUE")]
    Environment(String),

    #[error("unterminated quote in environment string")]
    UnterminatedQuote,
}

/// Options for one build identifier
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildOptions {
    pub identifier: String,

    /// Arch name to container image
    pub manylinux_images: BTreeMap<String, String>,

    /// Empty means build everything not skipped
    pub build: PatternList,
    pub skip: PatternList,
    pub test_skip: PatternList,

    pub test_command: Option<String>,
    pub before_test: Option<String>,
    pub before_all: Option<String>,
    pub before_build: Option<String>,

    pub environment: BTreeMap<String, String>,
}

impl BuildOptions {
    pub fn from_effective(effective: &EffectiveConfig) -> Result<Self, OptionsError> {
        let mut manylinux_images = BTreeMap::new();
        for (key, value) in effective.config.iter() {
            if let Some(arch) = key
                .strip_prefix("manylinux-")
                .and_then(|rest| rest.strip_suffix("-image"))
            {
                let image = expect_string(key, value)?;
                if !image.is_empty() {
                    manylinux_images.insert(arch.to_string(), image.to_string());
                }
            }
        }

        Ok(Self {
            identifier: effective.identifier.clone(),
            manylinux_images,
            build: pattern_list(effective, "build")?,
            skip: pattern_list(effective, "skip")?,
            test_skip: pattern_list(effective, "test-skip")?,
            test_command: command(effective, "test-command")?,
            before_test: command(effective, "before-test")?,
            before_all: command(effective, "before-all")?,
            before_build: command(effective, "before-build")?,
            environment: environment(effective)?,
        })
    }

    /// Container image for a Linux arch
    pub fn manylinux_image(&self, arch: Arch) -> Option<&str> {
        self.manylinux_images.get(arch.as_str()).map(String::as_str)
    }

    /// Test command with `{project}` and `{package}` substituted
    pub fn test_command_for(&self, project: &str, package: &str) -> Option<String> {
        self.test_command
            .as_ref()
            .map(|cmd| cmd.replace(PROJECT_PLACEHOLDER, project).replace(PACKAGE_PLACEHOLDER, package))
    }
}

fn expect_string<'a>(key: &str, value: &'a ConfigValue) -> Result<&'a str, OptionsError> {
    value.as_str().ok_or_else(|| OptionsError::WrongType {
        key: key.to_string(),
        expected: "a string",
        found: value.kind(),
    })
}

fn command(effective: &EffectiveConfig, key: &str) -> Result<Option<String>, OptionsError> {
    match effective.config.get(key) {
        None => Ok(None),
        Some(ConfigValue::List(parts)) => {
            // Lists of commands run in sequence
            let joined = parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" && ");
            Ok(Some(joined).filter(|s| !s.is_empty()))
        }
        Some(value) => {
            let s = expect_string(key, value)?.trim();
            Ok(Some(s.to_string()).filter(|s| !s.is_empty()))
        }
    }
}

fn pattern_list(effective: &EffectiveConfig, key: &str) -> Result<PatternList, OptionsError> {
    let parsed = match effective.config.get(key) {
        None => return Ok(PatternList::new()),
        Some(ConfigValue::String(s)) => PatternList::parse(s),
        Some(ConfigValue::List(items)) => PatternList::from_items(items),
        Some(other) => {
            return Err(OptionsError::WrongType {
                key: key.to_string(),
                expected: "a string or list",
                found: other.kind(),
            })
        }
    };
    parsed.map_err(|source| OptionsError::Pattern {
        key: key.to_string(),
        source,
    })
}

fn environment(effective: &EffectiveConfig) -> Result<BTreeMap<String, String>, OptionsError> {
    match effective.config.get("environment") {
        None => Ok(BTreeMap::new()),
        Some(ConfigValue::Table(table)) => {
            let mut env = BTreeMap::new();
            for (name, value) in table {
                let key = format!("environment.{}", name);
                env.insert(name.clone(), expect_string(&key, value)?.to_string());
            }
            Ok(env)
        }
        Some(ConfigValue::String(s)) => parse_assignments(s),
        Some(other) => Err(OptionsError::WrongType {
            key: "environment".to_string(),
            expected: "a table or string",
            found: other.kind(),
        }),
    }
}

/// Parse `A=1 B="two words"` into a map
pub fn parse_assignments(s: &str) -> Result<BTreeMap<String, String>, OptionsError> {
    let mut env = BTreeMap::new();
    for word in split_words(s)? {
        let (name, value) = word
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| OptionsError::Environment(word.clone()))?;
        env.insert(name.to_string(), value.to_string());
    }
    Ok(env)
}

fn split_words(s: &str) -> Result<Vec<String>, OptionsError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in s.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(OptionsError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFragment;

    fn effective(config: ConfigFragment) -> EffectiveConfig {
        let mut e: EffectiveConfig = serde_json::from_value(serde_json::json!({
            "schema_id": "test",
            "identifier": "cp38-manylinux_i686",
            "config": {},
            "layers": [],
            "origins": {}
        }))
        .unwrap();
        e.config = config;
        e
    }

    #[test]
    fn test_full_options() {
        let mut env = BTreeMap::new();
        env.insert("CFLAGS".to_string(), ConfigValue::from("-O2"));

        let e = effective(
            ConfigFragment::new()
                .with("manylinux-i686-image", "manylinux2014")
                .with("manylinux-x86_64-image", "")
                .with("skip", "pp* cp36*")
                .with("test-skip", vec!["*-win32"])
                .with("test-command", "pytest {project}/tests")
                .with("before-all", "yum install -y openblas-devel")
                .with("environment", ConfigValue::Table(env)),
        );
        let opts = BuildOptions::from_effective(&e).unwrap();

        assert_eq!(opts.manylinux_image(Arch::I686), Some("manylinux2014"));
        assert_eq!(opts.manylinux_image(Arch::X86_64), None);
        assert!(opts.skip.matches("pp39-manylinux_x86_64"));
        assert!(opts.test_skip.matches("cp38-win32"));
        assert!(opts.build.is_empty());
        assert_eq!(opts.before_all.as_deref(), Some("yum install -y openblas-devel"));
        assert_eq!(opts.before_test, None);
        assert_eq!(opts.environment["CFLAGS"], "-O2");
        assert_eq!(
            opts.test_command_for("/project", "/project/pkg").as_deref(),
            Some("pytest /project/tests")
        );
    }

    #[test]
    fn test_empty_command_is_unset() {
        let e = effective(ConfigFragment::new().with("test-command", "   "));
        assert_eq!(BuildOptions::from_effective(&e).unwrap().test_command, None);
    }

    #[test]
    fn test_command_list_joined() {
        let e = effective(ConfigFragment::new().with("before-test", vec!["pip install -r req.txt", "make"]));
        let opts = BuildOptions::from_effective(&e).unwrap();
        assert_eq!(opts.before_test.as_deref(), Some("pip install -r req.txt && make"));
    }

    #[test]
    fn test_package_placeholder() {
        let e = effective(ConfigFragment::new().with("test-command", "cd {package} && pytest"));
        let opts = BuildOptions::from_effective(&e).unwrap();
        assert_eq!(opts.test_command_for("/p", "/p/sub").as_deref(), Some("cd /p/sub && pytest"));
    }

    #[test]
    fn test_environment_string_form() {
        let env = parse_assignments(r#"CFLAGS="-O2 -g" PATH=/opt/bin:$PATH  EMPTY="#).unwrap();
        assert_eq!(env["CFLAGS"], "-O2 -g");
        assert_eq!(env["PATH"], "/opt/bin:$PATH");
        assert_eq!(env["EMPTY"], "");
    }

    #[test]
    fn test_environment_errors() {
        assert!(matches!(parse_assignments("NOEQUALS"), Err(OptionsError::Environment(_))));
        assert!(matches!(parse_assignments("=value"), Err(OptionsError::Environment(_))));
        assert!(matches!(parse_assignments("A=\"open"), Err(OptionsError::UnterminatedQuote)));
    }

    #[test]
    fn test_wrong_types() {
        let e = effective(ConfigFragment::new().with("test-command", vec!["a"]).with("manylinux-i686-image", vec!["x"]));
        let err = BuildOptions::from_effective(&e).unwrap_err();
        assert!(matches!(err, OptionsError::WrongType { ref key, .. } if key == "manylinux-i686-image"));
    }

    #[test]
    fn test_bad_skip_pattern() {
        let e = effective(ConfigFragment::new().with("skip", "cp3{8"));
        let err = BuildOptions::from_effective(&e).unwrap_err();
        assert!(matches!(err, OptionsError::Pattern { ref key, .. } if key == "skip"));
    }
}
