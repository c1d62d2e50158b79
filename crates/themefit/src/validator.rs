// SPDX-License-Identifier: Apache-2.0
//! Compliance scanning: compares source text against an [`ExtractedSpec`]
//! and produces a scored [`ComplianceReport`].
//!
//! Checks:
//! - **Variants**: every structural dimension and its values appear as
//!   identifiers (interaction-state dimensions and generic state values are
//!   exempt).
//! - **Spacing**: each property named by the spec's spacing lines is
//!   satisfied by *any one* of its target values (pixel literal, scale token,
//!   or arbitrary-value token).
//! - **Colors**: no literal hex colors, and at least one indirect theme
//!   color reference.
//!
//! Recommendation strings are re-parsed by the extractor; the `*_advice`
//! helpers below are the single source of their wording.

use std::collections::BTreeSet;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::model::{ComplianceReport, ExtractedSpec};
use crate::policy::EnginePolicy;
use crate::scanner::TextScanner;
use crate::tokens::{CssProperty, arbitrary_token, pixels_to_token};

// ── Scoring constants ──────────────────────────────────────────────────

const VARIANT_PENALTY_BASE: u32 = 10;
const VARIANT_PENALTY_PER_MISS: u32 = 3;
const VARIANT_PENALTY_CAP: u32 = 20;
const SPACING_PENALTY_PER_ISSUE: u32 = 10;
const SPACING_PENALTY_CAP: u32 = 30;
const COLOR_PENALTY_BASE: u32 = 10;
const COLOR_PENALTY_PER_ISSUE: u32 = 2;
const COLOR_PENALTY_CAP: u32 = 20;
const MULTI_CATEGORY_PENALTY: u32 = 5;
const SPACING_PARTIAL_CREDIT: u32 = 5;

/// Color issue recorded when no indirect color reference exists.
pub const NO_THEME_COLOR_ISSUE: &str = "no theme color token referenced";

// ── Spacing requirements ───────────────────────────────────────────────

/// One parsed spec spacing line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacingRequirement {
    /// Label left of the colon (`"Base height"`).
    pub name: String,
    pub property: CssProperty,
    pub pixels: u32,
    /// The original spec line.
    pub line: String,
}

/// Parse `"<name>: <N>px"` (or `rem`) into a requirement. Lines whose label
/// names no known property, or whose value is not a length, yield `None`.
#[must_use]
pub fn parse_spacing_line(line: &str) -> Option<SpacingRequirement> {
    let re = Regex::new(r"^\s*([^:]+?)\s*:\s*(\d+(?:\.\d+)?)\s*(px|rem)\b")
        .expect("spacing line regex");
    let caps = re.captures(line)?;
    let name = caps.get(1)?.as_str().to_string();
    let number: f64 = caps.get(2)?.as_str().parse().ok()?;
    let pixels = match caps.get(3)?.as_str() {
        "rem" => number * 16.0,
        _ => number,
    };
    if pixels.fract() != 0.0 {
        return None;
    }
    let property = CssProperty::from_keyword(&name)?;
    Some(SpacingRequirement {
        name,
        property,
        pixels: pixels as u32,
        line: line.trim().to_string(),
    })
}

/// Spacing requirements grouped by property, in first-seen order. Pixel
/// values within a group keep spec order and are de-duplicated.
#[must_use]
pub fn group_spacing_requirements(lines: &[String]) -> Vec<(CssProperty, Vec<u32>)> {
    let mut groups: Vec<(CssProperty, Vec<u32>)> = Vec::new();
    for line in lines {
        let Some(req) = parse_spacing_line(line) else {
            debug!(line = line.as_str(), "spacing line not recognised");
            continue;
        };
        match groups.iter_mut().find(|(property, _)| *property == req.property) {
            Some((_, values)) => {
                if !values.contains(&req.pixels) {
                    values.push(req.pixels);
                }
            }
            None => groups.push((req.property, vec![req.pixels])),
        }
    }
    groups
}

// ── Recommendation wording ─────────────────────────────────────────────

#[must_use]
pub fn missing_variant_advice(dimension: &str, values: &[String]) -> String {
    format!("Add missing `{dimension}` values: {}", values.join(", "))
}

/// `"40px (h-10)"` alternatives joined with `or`.
#[must_use]
pub fn describe_targets(property: CssProperty, values: &[u32]) -> String {
    values
        .iter()
        .map(|px| format!("{px}px ({})", pixels_to_token(property, *px)))
        .collect::<Vec<_>>()
        .join(" or ")
}

#[must_use]
pub fn spacing_advice(property: CssProperty, values: &[u32]) -> String {
    format!(
        "Set `{}` to {}",
        property.css_name(),
        describe_targets(property, values)
    )
}

#[must_use]
pub fn literal_color_advice(literals: &[String]) -> String {
    format!(
        "Replace hardcoded colors with theme tokens: {}",
        literals.join(", ")
    )
}

#[must_use]
pub fn theme_color_advice(policy: &EnginePolicy) -> String {
    let examples: Vec<&str> = policy
        .theme_color_tokens
        .iter()
        .take(2)
        .map(String::as_str)
        .collect();
    format!(
        "Use theme color tokens (e.g. {}) instead of literal colors",
        examples.join(", ")
    )
}

// ── Validation ─────────────────────────────────────────────────────────

/// Validate with the built-in policy.
#[must_use]
pub fn validate(source: &str, spec: &ExtractedSpec) -> ComplianceReport {
    validate_with_policy(source, spec, EnginePolicy::builtin())
}

#[must_use]
pub fn validate_with_policy(
    source: &str,
    spec: &ExtractedSpec,
    policy: &EnginePolicy,
) -> ComplianceReport {
    let _span = info_span!(
        "validate",
        component = spec.name.as_str(),
        source_len = source.len()
    )
    .entered();

    let scanner = TextScanner::new(source);
    let mut recommendations = Vec::new();

    let missing_variants = check_variants(source, spec, policy, &mut recommendations);
    let spacing_issues = check_spacing(&scanner, spec, &mut recommendations);
    let color_issues = check_colors(source, policy, &mut recommendations);

    let overall_match = score_compliance(&ScoreInputs {
        missing_variants: missing_variants.len(),
        spacing_issues: spacing_issues.len(),
        color_issues: color_issues.len(),
        has_spacing_token: scanner.has_spacing_token(),
    });
    debug!(
        overall_match,
        missing_variants = missing_variants.len(),
        spacing_issues = spacing_issues.len(),
        color_issues = color_issues.len(),
        "compliance scored"
    );

    ComplianceReport {
        has_required_variants: missing_variants.is_empty(),
        has_correct_spacing: spacing_issues.is_empty(),
        has_theme_colors: color_issues.is_empty(),
        missing_variants,
        spacing_issues,
        color_issues,
        overall_match,
        recommendations,
    }
}

fn identifier_present(source: &str, name: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex_lite::escape(name.trim()));
    Regex::new(&pattern)
        .map(|re| re.is_match(source))
        .unwrap_or(false)
}

fn check_variants(
    source: &str,
    spec: &ExtractedSpec,
    policy: &EnginePolicy,
    recommendations: &mut Vec<String>,
) -> Vec<String> {
    let mut missing = Vec::new();

    for (dimension, values) in &spec.variants {
        if policy.is_interaction_state_dimension(dimension) {
            continue;
        }
        let required: Vec<String> = values
            .iter()
            .filter(|value| !policy.is_generic_state_value(value))
            .cloned()
            .collect();

        if !identifier_present(source, dimension) {
            missing.push(dimension.clone());
            recommendations.push(missing_variant_advice(dimension, &required));
            continue;
        }

        let absent: Vec<String> = required
            .into_iter()
            .filter(|value| !identifier_present(source, value))
            .collect();
        if !absent.is_empty() {
            missing.extend(absent.iter().map(|value| format!("{dimension}.{value}")));
            recommendations.push(missing_variant_advice(dimension, &absent));
        }
    }

    missing
}

/// OR semantics: any one target value satisfies a shared property.
fn spacing_satisfied(scanner: &TextScanner, property: CssProperty, values: &[u32]) -> bool {
    values.iter().any(|px| {
        let literal = Regex::new(&format!(r"(^|[^\d.]){px}px\b")).expect("pixel literal regex");
        literal.is_match(scanner.as_str())
            || scanner.contains_token(&pixels_to_token(property, *px))
            || scanner.as_str().contains(&arbitrary_token(property, *px))
    })
}

fn check_spacing(
    scanner: &TextScanner,
    spec: &ExtractedSpec,
    recommendations: &mut Vec<String>,
) -> Vec<String> {
    let mut issues = Vec::new();
    for (property, values) in group_spacing_requirements(&spec.spacing) {
        if spacing_satisfied(scanner, property, &values) {
            continue;
        }
        issues.push(format!(
            "{}: expected {}",
            property.css_name(),
            describe_targets(property, &values)
        ));
        recommendations.push(spacing_advice(property, &values));
    }
    issues
}

/// Literal hex colors, verbatim and de-duplicated, in source order.
#[must_use]
pub fn find_literal_colors(source: &str) -> Vec<String> {
    let re = Regex::new(r"#[0-9a-fA-F]{3,6}\b").expect("hex color regex");
    let mut seen = BTreeSet::new();
    re.find_iter(source)
        .map(|m| m.as_str().to_string())
        .filter(|literal| seen.insert(literal.clone()))
        .collect()
}

fn check_colors(
    source: &str,
    policy: &EnginePolicy,
    recommendations: &mut Vec<String>,
) -> Vec<String> {
    let mut issues = find_literal_colors(source);
    if !issues.is_empty() {
        recommendations.push(literal_color_advice(&issues));
    }
    if policy.find_color_reference(source).is_none() {
        issues.push(NO_THEME_COLOR_ISSUE.to_string());
        recommendations.push(theme_color_advice(policy));
    }
    issues
}

// ── Scoring ────────────────────────────────────────────────────────────

/// Counts feeding [`score_compliance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreInputs {
    pub missing_variants: usize,
    pub spacing_issues: usize,
    pub color_issues: usize,
    pub has_spacing_token: bool,
}

fn capped(count: usize, base: u32, per_item: u32, cap: u32) -> u32 {
    if count == 0 {
        return 0;
    }
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    base.saturating_add(per_item.saturating_mul(count)).min(cap)
}

/// Start at 100, subtract independently capped category penalties, subtract
/// a flat amount when two or more categories failed, add partial credit when
/// spacing failed but spacing-shaped tokens exist, clamp to `0..=100`.
#[must_use]
pub fn score_compliance(inputs: &ScoreInputs) -> u8 {
    let variants = capped(
        inputs.missing_variants,
        VARIANT_PENALTY_BASE,
        VARIANT_PENALTY_PER_MISS,
        VARIANT_PENALTY_CAP,
    );
    let spacing = capped(
        inputs.spacing_issues,
        0,
        SPACING_PENALTY_PER_ISSUE,
        SPACING_PENALTY_CAP,
    );
    let colors = capped(
        inputs.color_issues,
        COLOR_PENALTY_BASE,
        COLOR_PENALTY_PER_ISSUE,
        COLOR_PENALTY_CAP,
    );

    let failed = [
        inputs.missing_variants,
        inputs.spacing_issues,
        inputs.color_issues,
    ]
    .into_iter()
    .filter(|count| *count > 0)
    .count();

    let mut score = 100_i64 - i64::from(variants) - i64::from(spacing) - i64::from(colors);
    if failed >= 2 {
        score -= i64::from(MULTI_CATEGORY_PENALTY);
    }
    if inputs.spacing_issues > 0 && inputs.has_spacing_token {
        score += i64::from(SPACING_PARTIAL_CREDIT);
    }
    score.clamp(0, 100) as u8
}
