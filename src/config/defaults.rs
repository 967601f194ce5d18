//! Built-in wheel build defaults (lowest layer)
//!
//! Hardcoded defaults for every documented option.

use serde::{Deserialize, Serialize};
use super::value::ConfigFragment;

/// Default manylinux image tag
pub const DEFAULT_MANYLINUX_IMAGE: &str = "manylinux2014";

/// Built-in default option values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Container image for x86_64 Linux builds (default: "manylinux2014")
    pub manylinux_x86_64_image: String,

    /// Container image for i686 Linux builds (default: "manylinux2014")
    pub manylinux_i686_image: String,

    /// Container image for aarch64 Linux builds (default: "manylinux2014")
    pub manylinux_aarch64_image: String,

    /// Identifiers to skip (default: none)
    pub skip: String,

    /// Identifiers whose tests are skipped (default: none)
    pub test_skip: String,

    /// Post-build test command (default: none, tests disabled)
    pub test_command: String,

    pub before_test: String,

    pub before_all: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            manylinux_x86_64_image: DEFAULT_MANYLINUX_IMAGE.to_string(),
            manylinux_i686_image: DEFAULT_MANYLINUX_IMAGE.to_string(),
            manylinux_aarch64_image: DEFAULT_MANYLINUX_IMAGE.to_string(),
            skip: String::new(),
            test_skip: String::new(),
            test_command: String::new(),
            before_test: String::new(),
            before_all: String::new(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to a fragment for merging.
    ///
    /// Empty options are left out: an absent key already means unset, and
    /// a seeded empty string would clash with list-form values above it.
    pub fn to_fragment(&self) -> ConfigFragment {
        [
            ("manylinux-x86_64-image", &self.manylinux_x86_64_image),
            ("manylinux-i686-image", &self.manylinux_i686_image),
            ("manylinux-aarch64-image", &self.manylinux_aarch64_image),
            ("skip", &self.skip),
            ("test-skip", &self.test_skip),
            ("test-command", &self.test_command),
            ("before-test", &self.before_test),
            ("before-all", &self.before_all),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| (key, value.as_str()))
        .collect()
    }
}
