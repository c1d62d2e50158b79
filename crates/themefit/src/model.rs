// SPDX-License-Identifier: Apache-2.0
//! Shared data model for the compliance engine.
//!
//! All records serialize with camelCase field names so they can be handed to
//! (and read back from) the admin panel without translation.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ThemefitError};
use crate::tokens::CssProperty;

// ── Extracted design spec ──────────────────────────────────────────────

/// Required visual properties for one component, as produced by the
/// generative service. Immutable for the lifetime of a review session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedSpec {
    pub name: String,
    pub description: String,
    pub category: String,
    /// Dimension name → ordered list of values (e.g. `size → [small, base, large]`),
    /// in the order the generator emitted the dimensions.
    pub variants: IndexMap<String, Vec<String>>,
    /// Lines of shape `"purpose: #hex"`.
    pub colors: Vec<String>,
    /// Lines of shape `"name: Npx"`.
    pub spacing: Vec<String>,
    pub typography: Vec<String>,
}

// ── Compliance ─────────────────────────────────────────────────────────

/// Scored result of comparing source text against an [`ExtractedSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub has_required_variants: bool,
    pub has_correct_spacing: bool,
    pub has_theme_colors: bool,
    pub missing_variants: Vec<String>,
    pub spacing_issues: Vec<String>,
    pub color_issues: Vec<String>,
    /// Always within `0..=100`.
    pub overall_match: u8,
    pub recommendations: Vec<String>,
}

impl ComplianceReport {
    /// Number of the three categories (variants, spacing, colors) that failed.
    #[must_use]
    pub fn failed_categories(&self) -> usize {
        [
            !self.has_required_variants,
            !self.has_correct_spacing,
            !self.has_theme_colors,
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count()
    }

    #[must_use]
    pub fn is_fully_compliant(&self) -> bool {
        self.failed_categories() == 0
    }
}

// ── Mapping issues ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Color,
    Spacing,
    Variant,
    Typography,
}

impl IssueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Spacing => "spacing",
            Self::Variant => "variant",
            Self::Typography => "typography",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mapping issue rewrites when it is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MappingTarget {
    /// Replace a literal color everywhere it occurs.
    Color { literal: String },
    /// Replace the utility token bound to a property.
    Utility { property: CssProperty },
    /// Add missing values under a variant dimension.
    Variant {
        dimension: String,
        values: Vec<String>,
    },
}

/// One addressable, user-selectable fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingIssue {
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub title: String,
    pub spec_requirement: String,
    pub current_value: String,
    pub suggested_fix: String,
    pub options: Vec<String>,
    /// `true` when derived from a violation, `false` for optional edits.
    pub is_issue: bool,
    /// `None` for advice that has no mechanical rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<MappingTarget>,
}

// ── Mapping sets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorMapping {
    pub issue_id: String,
    /// Literal color to look for (matched case-insensitively).
    pub from: String,
    /// Indirect reference to write instead.
    pub to: String,
}

/// A utility-token replacement. Typography selections travel in this list as
/// well; the property decides which bucket they land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpacingMapping {
    pub issue_id: String,
    pub property: CssProperty,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantMapping {
    pub issue_id: String,
    pub dimension: String,
    pub values: Vec<String>,
}

/// The chosen replacements for one preview cycle. Order inside each list is
/// significant: later spacing entries win over earlier ones in the same bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecToThemeMappings {
    pub colors: Vec<ColorMapping>,
    pub spacing: Vec<SpacingMapping>,
    pub variants: Vec<VariantMapping>,
}

impl SpecToThemeMappings {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.spacing.is_empty() && self.variants.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len() + self.spacing.len() + self.variants.len()
    }

    /// Build a mapping set from `(issue id, chosen value)` pairs, in the order
    /// they were chosen.
    ///
    /// An empty chosen value falls back to the issue's suggested fix. For
    /// variant issues the chosen value is a comma-separated list of values to
    /// add. Issues without a [`MappingTarget`] are advice only and are skipped.
    pub fn from_selection<'a>(
        issues: &[MappingIssue],
        choices: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let mut mappings = Self::default();
        let mut seen = BTreeSet::new();

        for (issue_id, chosen) in choices {
            let issue = issues
                .iter()
                .find(|issue| issue.id == issue_id)
                .ok_or_else(|| ThemefitError::UnknownIssue {
                    id: issue_id.to_string(),
                })?;
            if !seen.insert(issue_id) {
                continue;
            }
            let value = if chosen.trim().is_empty() {
                issue.suggested_fix.trim()
            } else {
                chosen.trim()
            };

            match &issue.target {
                Some(MappingTarget::Color { literal }) => mappings.colors.push(ColorMapping {
                    issue_id: issue.id.clone(),
                    from: literal.clone(),
                    to: value.to_string(),
                }),
                Some(MappingTarget::Utility { property }) => {
                    mappings.spacing.push(SpacingMapping {
                        issue_id: issue.id.clone(),
                        property: *property,
                        token: value.to_string(),
                    });
                }
                Some(MappingTarget::Variant { dimension, values }) => {
                    let picked = if chosen.trim().is_empty() || value == issue.suggested_fix.trim() {
                        values.clone()
                    } else {
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|v| !v.is_empty())
                            .map(String::from)
                            .collect()
                    };
                    mappings.variants.push(VariantMapping {
                        issue_id: issue.id.clone(),
                        dimension: dimension.clone(),
                        values: picked,
                    });
                }
                None => {}
            }
        }

        Ok(mappings)
    }
}

// ── Editable properties ────────────────────────────────────────────────

/// Where a property occurrence sits in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyLocator {
    /// 1-based line.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
    /// Key or attribute owning the class string (`className`, `small`, ...).
    pub context: String,
}

/// One concrete utility-token occurrence, used for granular editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableProperty {
    pub property: CssProperty,
    pub token: String,
    pub pixels: Option<u32>,
    pub locator: PropertyLocator,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str, target: Option<MappingTarget>, suggested: &str) -> MappingIssue {
        MappingIssue {
            id: id.to_string(),
            issue_type: IssueType::Spacing,
            title: id.to_string(),
            spec_requirement: String::new(),
            current_value: String::new(),
            suggested_fix: suggested.to_string(),
            options: Vec::new(),
            is_issue: true,
            target,
        }
    }

    #[test]
    fn spec_deserializes_with_missing_fields() {
        let spec: ExtractedSpec =
            serde_json::from_str(r#"{"name":"Button","variants":{"size":["sm","lg"]}}"#)
                .expect("spec json");
        assert_eq!(spec.name, "Button");
        assert_eq!(spec.variants["size"], vec!["sm", "lg"]);
        assert!(spec.colors.is_empty());
    }

    #[test]
    fn variant_dimensions_keep_their_declared_order() {
        let spec: ExtractedSpec = serde_json::from_str(
            r#"{"variants":{"size":["sm"],"intent":["primary"],"density":["compact"]}}"#,
        )
        .expect("spec json");
        let dimensions: Vec<&str> = spec.variants.keys().map(String::as_str).collect();
        assert_eq!(dimensions, vec!["size", "intent", "density"]);
    }

    #[test]
    fn report_serializes_camel_case() {
        let report = ComplianceReport {
            overall_match: 80,
            ..ComplianceReport::default()
        };
        let json = serde_json::to_value(&report).expect("report json");
        assert_eq!(json["overallMatch"], 80);
        assert!(json.get("hasRequiredVariants").is_some());
        assert_eq!(report.failed_categories(), 3);
    }

    #[test]
    fn mapping_issue_type_field_is_renamed() {
        let json = serde_json::to_value(issue("spacing-1", None, "h-10")).expect("issue json");
        assert_eq!(json["type"], "spacing");
        assert_eq!(json["isIssue"], true);
        assert!(json.get("target").is_none());
    }

    #[test]
    fn from_selection_preserves_choice_order_and_defaults() {
        let issues = vec![
            issue(
                "a",
                Some(MappingTarget::Utility {
                    property: CssProperty::Height,
                }),
                "h-10",
            ),
            issue(
                "b",
                Some(MappingTarget::Color {
                    literal: "#fff".into(),
                }),
                "bg-background",
            ),
            issue("advice", None, "bg-primary"),
        ];

        let mappings =
            SpecToThemeMappings::from_selection(&issues, [("b", ""), ("a", "h-12"), ("advice", "")])
                .expect("selection");

        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings.colors[0].to, "bg-background");
        assert_eq!(mappings.spacing[0].token, "h-12");
    }

    #[test]
    fn from_selection_rejects_unknown_ids() {
        let error = SpecToThemeMappings::from_selection(&[], [("ghost", "x")]).unwrap_err();
        assert!(matches!(error, ThemefitError::UnknownIssue { id } if id == "ghost"));
    }

    #[test]
    fn variant_selection_accepts_explicit_value_list() {
        let issues = vec![MappingIssue {
            issue_type: IssueType::Variant,
            ..issue(
                "v",
                Some(MappingTarget::Variant {
                    dimension: "size".into(),
                    values: vec!["small".into(), "large".into()],
                }),
                "Add `size` variants: small, large",
            )
        }];

        let all = SpecToThemeMappings::from_selection(&issues, [("v", "")]).expect("all");
        assert_eq!(all.variants[0].values, vec!["small", "large"]);

        let picked =
            SpecToThemeMappings::from_selection(&issues, [("v", "large, ")]).expect("picked");
        assert_eq!(picked.variants[0].values, vec!["large"]);
    }
}
