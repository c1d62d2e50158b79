// SPDX-License-Identifier: Apache-2.0
//! Engine policy: the tunable vocabulary the scanner, validator and mutator
//! rely on (theme color prefixes, interaction-state names, reserved host
//! attributes). A built-in policy ships with the crate; a JSON file with the
//! same schema can replace it.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ThemefitError};
use crate::util::read_string;

const BUILTIN_POLICY_JSON: &str = include_str!("../policy/engine_policy_v1.json");
pub const SUPPORTED_POLICY_SCHEMA_VERSION: &str = "themefit-policy-v1";

static BUILTIN_POLICY: LazyLock<EnginePolicy> = LazyLock::new(|| {
    EnginePolicy::parse_and_validate(BUILTIN_POLICY_JSON).expect("builtin policy is valid")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnginePolicy {
    pub schema_version: String,
    /// Name of the call wrapping the variant-definition block (`cva`).
    pub variant_call: String,
    /// Dimensions describing interaction state; never required structurally.
    pub interaction_state_dimensions: Vec<String>,
    /// Values not expected to appear as literal identifiers.
    pub generic_state_values: Vec<String>,
    /// Substrings proving that colors are referenced indirectly.
    pub color_reference_prefixes: Vec<String>,
    /// Replacement candidates offered for literal colors.
    pub theme_color_tokens: Vec<String>,
    /// Variant dimension names that collide with native host attributes,
    /// mapped to the name they are renamed to.
    pub reserved_attributes: BTreeMap<String, String>,
}

impl EnginePolicy {
    pub fn parse_and_validate(raw_json: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(raw_json)?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = read_string(path)?;
        let policy = Self::parse_and_validate(&raw)?;
        if policy != *Self::builtin() {
            warn!(path = %path.display(), "engine policy overrides built-in defaults");
        }
        Ok(policy)
    }

    /// Load `path` when given, the built-in policy otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::builtin().clone()),
        }
    }

    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN_POLICY
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SUPPORTED_POLICY_SCHEMA_VERSION {
            return Err(ThemefitError::policy(format!(
                "unsupported schema_version '{}' (expected '{}')",
                self.schema_version, SUPPORTED_POLICY_SCHEMA_VERSION
            )));
        }
        if !is_identifier(&self.variant_call) {
            return Err(ThemefitError::policy(format!(
                "variant_call '{}' is not an identifier",
                self.variant_call
            )));
        }
        if self.color_reference_prefixes.iter().all(|p| p.trim().is_empty()) {
            return Err(ThemefitError::policy(
                "color_reference_prefixes must not be empty",
            ));
        }
        if self.theme_color_tokens.is_empty() {
            return Err(ThemefitError::policy("theme_color_tokens must not be empty"));
        }
        for (reserved, renamed) in &self.reserved_attributes {
            if !is_identifier(reserved) || !is_identifier(renamed) {
                return Err(ThemefitError::policy(format!(
                    "reserved attribute rename '{reserved}' -> '{renamed}' must use identifiers"
                )));
            }
            if reserved == renamed {
                return Err(ThemefitError::policy(format!(
                    "reserved attribute '{reserved}' is renamed to itself"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_interaction_state_dimension(&self, dimension: &str) -> bool {
        self.interaction_state_dimensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(dimension.trim()))
    }

    #[must_use]
    pub fn is_generic_state_value(&self, value: &str) -> bool {
        self.generic_state_values
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(value.trim()))
    }

    /// First indirect color reference found in `source`, if any.
    #[must_use]
    pub fn find_color_reference<'a>(&'a self, source: &str) -> Option<&'a str> {
        self.color_reference_prefixes
            .iter()
            .map(String::as_str)
            .filter(|prefix| !prefix.is_empty())
            .find(|prefix| source.contains(prefix))
    }
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// JavaScript identifier check (ASCII subset).
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
