// SPDX-License-Identifier: Apache-2.0
//! Turns compliance findings (and, in advanced mode, every spec-declared
//! property) into UI-addressable [`MappingIssue`] records.
//!
//! Two passes run over the same `(spec, report)` pair:
//!
//! 1. **Issue-derived**: each recommendation string is matched against a
//!    fixed cascade of patterns, one per issue shape. Strings that match no
//!    pattern are dropped.
//! 2. **Full-properties**: every variant dimension, spacing line, color line
//!    and typography line becomes an optional edit (`is_issue = false`),
//!    unless an issue-derived record already covers it.
//!
//! Ids hash the issue's type, title and requirement, so they are stable for a
//! given `(spec, report)` pair and survive re-renders.

use std::collections::BTreeMap;

use regex_lite::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::{ComplianceReport, ExtractedSpec, IssueType, MappingIssue, MappingTarget};
use crate::policy::EnginePolicy;
use crate::scanner::{TextScanner, UtilityScanner};
use crate::tokens::{CssProperty, pixels_to_token, spacing_options};
use crate::validator::{NO_THEME_COLOR_ISSUE, parse_spacing_line};

/// Theme slots recognised inside color purposes, most specific first.
const THEME_SLOTS: &[&str] = &[
    "destructive",
    "secondary",
    "primary",
    "muted",
    "accent",
    "background",
    "foreground",
    "card",
    "popover",
    "border",
    "input",
    "ring",
];

const NOT_FOUND: &str = "not found";

/// Builder over one `(spec, report)` pair.
#[derive(Debug, Clone, Copy)]
pub struct MappingExtractor<'a> {
    spec: &'a ExtractedSpec,
    report: &'a ComplianceReport,
    policy: &'a EnginePolicy,
    source: Option<&'a str>,
}

impl<'a> MappingExtractor<'a> {
    #[must_use]
    pub fn new(spec: &'a ExtractedSpec, report: &'a ComplianceReport) -> Self {
        Self {
            spec,
            report,
            policy: EnginePolicy::builtin(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: &'a EnginePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Source text used only to fill `current_value` fields.
    #[must_use]
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    /// Issue-derived records only.
    #[must_use]
    pub fn issues(&self) -> Vec<MappingIssue> {
        let mut issues = Vec::new();
        for recommendation in &self.report.recommendations {
            match self.parse_recommendation(recommendation) {
                Some(parsed) => issues.extend(parsed),
                None => debug!(
                    recommendation = recommendation.as_str(),
                    "recommendation matched no issue pattern"
                ),
            }
        }
        assign_ids(&mut issues);
        issues
    }

    /// Issue-derived records followed by every remaining spec property.
    #[must_use]
    pub fn all_properties(&self) -> Vec<MappingIssue> {
        let mut issues = self.issues();
        let extra: Vec<MappingIssue> = self
            .property_candidates()
            .into_iter()
            .filter(|candidate| !issues.iter().any(|i| duplicates(i, candidate)))
            .collect();
        issues.extend(extra);
        // Derived entries come first, so their ids are unchanged.
        assign_ids(&mut issues);
        issues
    }

    // ── Issue-derived pass ──────────────────────────────────────────────

    fn parse_recommendation(&self, recommendation: &str) -> Option<Vec<MappingIssue>> {
        let cascade: [fn(&Self, &str) -> Option<Vec<MappingIssue>>; 4] = [
            Self::parse_missing_variant,
            Self::parse_spacing_mismatch,
            Self::parse_color_advice,
            Self::parse_literal_colors,
        ];
        cascade
            .iter()
            .find_map(|parse| parse(self, recommendation.trim()))
    }

    fn parse_missing_variant(&self, text: &str) -> Option<Vec<MappingIssue>> {
        let re = Regex::new(r"^Add missing `([^`]+)` values:\s*(.*)$").expect("variant advice regex");
        let caps = re.captures(text)?;
        let dimension = caps.get(1)?.as_str().to_string();
        let missing = split_list(caps.get(2)?.as_str());

        let declared = self.spec.variants.get(&dimension);
        let spec_requirement = match declared {
            Some(values) => format!("{dimension}: {}", values.join(", ")),
            None => format!("{dimension}: {}", missing.join(", ")),
        };
        let current_value = if self.report.missing_variants.contains(&dimension) {
            "not defined".to_string()
        } else {
            format!("missing: {}", missing.join(", "))
        };

        Some(vec![MappingIssue {
            id: String::new(),
            issue_type: IssueType::Variant,
            title: format!("Missing `{dimension}` variant values"),
            spec_requirement,
            current_value,
            suggested_fix: format!("Add `{dimension}` variants: {}", missing.join(", ")),
            options: missing.clone(),
            is_issue: true,
            target: Some(MappingTarget::Variant {
                dimension,
                values: missing,
            }),
        }])
    }

    fn parse_spacing_mismatch(&self, text: &str) -> Option<Vec<MappingIssue>> {
        let re = Regex::new(r"^Set `([^`]+)` to (.+)$").expect("spacing advice regex");
        let caps = re.captures(text)?;
        let property = CssProperty::from_css_name(caps.get(1)?.as_str())?;
        let px_re = Regex::new(r"(\d+)px").expect("pixel value regex");
        let targets: Vec<u32> = px_re
            .captures_iter(caps.get(2)?.as_str())
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .collect();
        let first = *targets.first()?;

        let mut options: Vec<String> = Vec::new();
        for px in &targets {
            for option in spacing_options(property, *px) {
                if !options.contains(&option) {
                    options.push(option);
                }
            }
        }
        let lines: Vec<&str> = self
            .spec
            .spacing
            .iter()
            .filter(|line| parse_spacing_line(line).is_some_and(|r| r.property == property))
            .map(String::as_str)
            .collect();
        let spec_requirement = if lines.is_empty() {
            caps.get(2)?.as_str().to_string()
        } else {
            lines.join("; ")
        };

        Some(vec![MappingIssue {
            id: String::new(),
            issue_type: IssueType::Spacing,
            title: format!("Spacing `{}`", property.css_name()),
            spec_requirement,
            current_value: self.current_token(property),
            suggested_fix: pixels_to_token(property, first),
            options,
            is_issue: true,
            target: Some(MappingTarget::Utility { property }),
        }])
    }

    fn parse_color_advice(&self, text: &str) -> Option<Vec<MappingIssue>> {
        if !text.starts_with("Use theme color tokens") {
            return None;
        }
        let current_value = if self
            .report
            .color_issues
            .iter()
            .any(|issue| issue == NO_THEME_COLOR_ISSUE)
        {
            NO_THEME_COLOR_ISSUE.to_string()
        } else {
            "literal colors only".to_string()
        };
        let spec_requirement = if self.spec.colors.is_empty() {
            "Reference colors through theme tokens".to_string()
        } else {
            self.spec.colors.join("; ")
        };
        let options = self.policy.theme_color_tokens.clone();

        Some(vec![MappingIssue {
            id: String::new(),
            issue_type: IssueType::Color,
            title: "Theme color tokens".to_string(),
            spec_requirement,
            current_value,
            suggested_fix: options.first().cloned().unwrap_or_default(),
            options,
            is_issue: true,
            target: None,
        }])
    }

    fn parse_literal_colors(&self, text: &str) -> Option<Vec<MappingIssue>> {
        let re = Regex::new(r"^Replace hardcoded colors with theme tokens:\s*(.+)$")
            .expect("literal color advice regex");
        let caps = re.captures(text)?;
        let literals = split_list(caps.get(1)?.as_str());
        if literals.is_empty() {
            return None;
        }

        Some(
            literals
                .into_iter()
                .map(|literal| {
                    let declared = self.spec.colors.iter().find_map(|line| {
                        let (purpose, value) = split_color_line(line)?;
                        value.eq_ignore_ascii_case(&literal).then_some((purpose, line))
                    });
                    let suggested = declared.map_or_else(
                        || self.default_color_token(),
                        |(purpose, _)| theme_token_for_purpose(purpose),
                    );
                    MappingIssue {
                        id: String::new(),
                        issue_type: IssueType::Color,
                        title: format!("Hardcoded color `{literal}`"),
                        spec_requirement: declared.map_or_else(
                            || "Use a theme color token".to_string(),
                            |(_, line)| line.clone(),
                        ),
                        current_value: literal.clone(),
                        options: self.color_options(&suggested),
                        suggested_fix: suggested,
                        is_issue: true,
                        target: Some(MappingTarget::Color { literal }),
                    }
                })
                .collect(),
        )
    }

    // ── Full-properties pass ────────────────────────────────────────────

    fn property_candidates(&self) -> Vec<MappingIssue> {
        let mut candidates = Vec::new();

        for (dimension, values) in &self.spec.variants {
            let present: Vec<&String> = match self.source {
                Some(source) => values
                    .iter()
                    .filter(|value| source.contains(value.as_str()))
                    .collect(),
                None => values.iter().collect(),
            };
            candidates.push(MappingIssue {
                id: String::new(),
                issue_type: IssueType::Variant,
                title: format!("Variant `{dimension}`"),
                spec_requirement: format!("{dimension}: {}", values.join(", ")),
                current_value: match self.source {
                    Some(_) => format!(
                        "present: {}",
                        present.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                    None => "defined in spec".to_string(),
                },
                suggested_fix: values.join(", "),
                options: values.clone(),
                is_issue: false,
                target: Some(MappingTarget::Variant {
                    dimension: dimension.clone(),
                    values: values.clone(),
                }),
            });
        }

        for line in &self.spec.spacing {
            let Some(req) = parse_spacing_line(line) else {
                continue;
            };
            let options = spacing_options(req.property, req.pixels);
            let current_value = match self.source {
                Some(_) => self.current_token(req.property),
                None => pixels_to_token(req.property, req.pixels),
            };
            candidates.push(MappingIssue {
                id: String::new(),
                issue_type: IssueType::Spacing,
                title: format!("Spacing `{}` ({})", req.property.css_name(), req.name),
                spec_requirement: req.line.clone(),
                current_value,
                suggested_fix: pixels_to_token(req.property, req.pixels),
                options,
                is_issue: false,
                target: Some(MappingTarget::Utility {
                    property: req.property,
                }),
            });
        }

        for line in &self.spec.colors {
            let Some((purpose, value)) = split_color_line(line) else {
                continue;
            };
            let suggested = theme_token_for_purpose(purpose);
            let is_literal = value.starts_with('#');
            candidates.push(MappingIssue {
                id: String::new(),
                issue_type: IssueType::Color,
                title: format!("Color `{purpose}`"),
                spec_requirement: line.trim().to_string(),
                current_value: value.to_string(),
                options: self.color_options(&suggested),
                suggested_fix: suggested,
                is_issue: false,
                target: is_literal.then(|| MappingTarget::Color {
                    literal: value.to_string(),
                }),
            });
        }

        for line in &self.spec.typography {
            candidates.push(self.typography_candidate(line));
        }

        candidates
    }

    fn typography_candidate(&self, line: &str) -> MappingIssue {
        let parsed = parse_typography_line(line);
        let (title, current_value, suggested_fix, options, target) = match parsed {
            Some((property, value)) => {
                let options = spacing_options(property, value);
                let current = match self.source {
                    Some(_) => self.current_token(property),
                    None => pixels_to_token(property, value),
                };
                (
                    format!("Typography `{}`", property.css_name()),
                    current,
                    pixels_to_token(property, value),
                    options,
                    Some(MappingTarget::Utility { property }),
                )
            }
            None => (
                format!("Typography `{}`", line.trim()),
                NOT_FOUND.to_string(),
                String::new(),
                Vec::new(),
                None,
            ),
        };
        MappingIssue {
            id: String::new(),
            issue_type: IssueType::Typography,
            title,
            spec_requirement: line.trim().to_string(),
            current_value,
            suggested_fix,
            options,
            is_issue: false,
            target,
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn current_token(&self, property: CssProperty) -> String {
        self.source
            .and_then(|source| TextScanner::new(source).find_utility_token(property))
            .map_or_else(|| NOT_FOUND.to_string(), |token| token.text)
    }

    fn default_color_token(&self) -> String {
        self.policy
            .theme_color_tokens
            .first()
            .cloned()
            .unwrap_or_else(|| "bg-primary".to_string())
    }

    fn color_options(&self, suggested: &str) -> Vec<String> {
        let mut options = vec![suggested.to_string()];
        for token in &self.policy.theme_color_tokens {
            if !options.contains(token) {
                options.push(token.clone());
            }
        }
        options
    }
}

/// Issue-derived records for `(spec, report)` with the built-in policy.
#[must_use]
pub fn extract_issue_mappings(spec: &ExtractedSpec, report: &ComplianceReport) -> Vec<MappingIssue> {
    MappingExtractor::new(spec, report).issues()
}

/// Issue-derived records plus optional edits for every other spec property.
#[must_use]
pub fn extract_all_mappings(spec: &ExtractedSpec, report: &ComplianceReport) -> Vec<MappingIssue> {
    MappingExtractor::new(spec, report).all_properties()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// `"primary: #3B82F6"` → `("primary", "#3B82F6")`.
fn split_color_line(line: &str) -> Option<(&str, &str)> {
    let (purpose, value) = line.split_once(':')?;
    let purpose = purpose.trim();
    let value = value.trim();
    (!purpose.is_empty() && !value.is_empty()).then_some((purpose, value))
}

/// Map a color purpose (`"Primary text"`, `"hover background"`) to the theme
/// token that would carry it.
#[must_use]
pub fn theme_token_for_purpose(purpose: &str) -> String {
    let lower = purpose.to_ascii_lowercase();
    let slot = THEME_SLOTS
        .iter()
        .find(|slot| lower.contains(*slot))
        .copied()
        .unwrap_or("primary");

    if lower.contains("border") || lower.contains("outline") {
        if slot == "border" {
            "border-border".to_string()
        } else {
            format!("border-{slot}")
        }
    } else if lower.contains("text") || lower.contains("foreground") || lower.contains("label") {
        match slot {
            "foreground" => "text-foreground".to_string(),
            "background" => "text-foreground".to_string(),
            other => format!("text-{other}-foreground"),
        }
    } else if slot == "ring" {
        "ring-ring".to_string()
    } else {
        format!("bg-{slot}")
    }
}

/// Typography lines carry a font size (`14px`), a weight (`600`, `semibold`)
/// or a line height.
fn parse_typography_line(line: &str) -> Option<(CssProperty, u32)> {
    let lower = line.to_ascii_lowercase();
    let (label, value) = lower.split_once(':').unwrap_or(("", lower.as_str()));
    let px_re = Regex::new(r"(\d+)\s*px").expect("typography px regex");

    if label.contains("weight") || (!value.contains("px") && has_weight_value(value)) {
        let weight_re = Regex::new(r"\b([1-9]00)\b").expect("weight regex");
        if let Some(caps) = weight_re.captures(value) {
            return caps.get(1)?.as_str().parse().ok().map(|w| (CssProperty::FontWeight, w));
        }
        return crate::tokens::FONT_WEIGHT_SCALE
            .iter()
            .find(|(name, _)| value.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == *name))
            .map(|(_, weight)| (CssProperty::FontWeight, *weight));
    }

    let px: u32 = px_re.captures(value)?.get(1)?.as_str().parse().ok()?;
    if label.contains("line") || label.contains("leading") {
        Some((CssProperty::LineHeight, px))
    } else {
        Some((CssProperty::FontSize, px))
    }
}

fn has_weight_value(value: &str) -> bool {
    crate::tokens::FONT_WEIGHT_SCALE
        .iter()
        .any(|(name, _)| value.split(|c: char| !c.is_ascii_alphanumeric()).any(|w| w == *name))
}

fn subject(issue: &MappingIssue) -> Option<String> {
    match &issue.target {
        Some(MappingTarget::Color { literal }) => Some(literal.to_ascii_lowercase()),
        Some(MappingTarget::Utility { property }) => Some(property.css_name().to_string()),
        Some(MappingTarget::Variant { dimension, .. }) => Some(dimension.clone()),
        None => None,
    }
}

/// Same type and either the same title or the same addressed subject.
fn duplicates(existing: &MappingIssue, candidate: &MappingIssue) -> bool {
    if existing.issue_type != candidate.issue_type {
        return false;
    }
    if existing.title == candidate.title {
        return true;
    }
    match (subject(existing), subject(candidate)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn issue_digest(issue: &MappingIssue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(issue.issue_type.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(issue.title.as_bytes());
    hasher.update(b"|");
    hasher.update(issue.spec_requirement.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(5).map(|b| format!("{b:02x}")).collect()
}

fn assign_ids(issues: &mut [MappingIssue]) {
    let mut used: BTreeMap<String, usize> = BTreeMap::new();
    for issue in issues.iter_mut() {
        let base = format!("{}-{}", issue.issue_type, issue_digest(issue));
        let count = used.entry(base.clone()).or_insert(0);
        *count += 1;
        issue.id = if *count == 1 {
            base
        } else {
            format!("{base}-{count}")
        };
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::validator::validate;

    const SOURCE: &str = r##"const buttonVariants = cva("inline-flex h-9 px-4 bg-[#3B82F6]", {
  variants: {
    variant: {
      default: "text-white",
    },
  },
});
export function Button() { return null; }
"##;

    fn spec() -> ExtractedSpec {
        let mut variants = IndexMap::new();
        variants.insert(
            "size".to_string(),
            vec!["small".to_string(), "base".to_string()],
        );
        variants.insert("variant".to_string(), vec!["default".to_string()]);
        ExtractedSpec {
            name: "Button".to_string(),
            variants,
            colors: vec!["Primary background: #3b82f6".to_string()],
            spacing: vec![
                "Base height: 40px".to_string(),
                "Horizontal padding: 16px".to_string(),
            ],
            typography: vec![
                "Font size: 14px".to_string(),
                "Font weight: semibold".to_string(),
                "Uppercase labels".to_string(),
            ],
            ..ExtractedSpec::default()
        }
    }

    #[test]
    fn issue_pass_covers_every_recommendation_shape() {
        let spec = spec();
        let report = validate(SOURCE, &spec);
        let issues = MappingExtractor::new(&spec, &report)
            .with_source(SOURCE)
            .issues();

        let types: Vec<IssueType> = issues.iter().map(|i| i.issue_type).collect();
        assert_eq!(
            types,
            vec![
                IssueType::Variant,
                IssueType::Spacing,
                IssueType::Color,
                IssueType::Color
            ]
        );
        assert!(issues.iter().all(|i| i.is_issue));

        let variant = &issues[0];
        assert_eq!(variant.current_value, "not defined");
        assert_eq!(variant.options, vec!["small", "base"]);

        let spacing = &issues[1];
        assert_eq!(spacing.title, "Spacing `height`");
        assert_eq!(spacing.current_value, "h-9");
        assert_eq!(spacing.suggested_fix, "h-10");
        assert_eq!(spacing.options, vec!["h-10", "h-9", "h-11", "h-[40px]"]);
        assert_eq!(spacing.spec_requirement, "Base height: 40px");

        let literal = &issues[2];
        assert_eq!(literal.current_value, "#3B82F6");
        assert_eq!(literal.suggested_fix, "bg-primary");
        assert_eq!(literal.spec_requirement, "Primary background: #3b82f6");

        let advice = &issues[3];
        assert_eq!(advice.title, "Theme color tokens");
        assert!(advice.target.is_none());
    }

    #[test]
    fn unmatched_recommendations_are_dropped() {
        let report = ComplianceReport {
            recommendations: vec![
                "Consider adding a focus ring".to_string(),
                "Set `nonsense` to 4px (x-1)".to_string(),
            ],
            ..ComplianceReport::default()
        };
        assert!(extract_issue_mappings(&ExtractedSpec::default(), &report).is_empty());
    }

    #[test]
    fn ids_are_stable_and_unique() {
        let spec = spec();
        let report = validate(SOURCE, &spec);
        let first = extract_all_mappings(&spec, &report);
        let second = extract_all_mappings(&spec, &report);
        let ids: Vec<&str> = first.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            second.iter().map(|i| i.id.as_str()).collect::<Vec<_>>()
        );
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| id.contains('-')));

        let derived = extract_issue_mappings(&spec, &report);
        for (issue, full) in derived.iter().zip(&first) {
            assert_eq!(issue.id, full.id);
        }
    }

    #[test]
    fn full_pass_skips_entries_covered_by_issues() {
        let spec = spec();
        let report = validate(SOURCE, &spec);
        let all = MappingExtractor::new(&spec, &report)
            .with_source(SOURCE)
            .all_properties();
        let optional: Vec<&MappingIssue> = all.iter().filter(|i| !i.is_issue).collect();

        // size and height are issue-derived; the literal color too.
        assert!(!optional.iter().any(|i| i.title == "Variant `size`"));
        assert!(!optional.iter().any(|i| i.title.starts_with("Spacing `height`")));
        assert!(!optional.iter().any(|i| i.title == "Color `Primary background`"));

        assert!(optional.iter().any(|i| i.title == "Variant `variant`"));
        let padding = optional
            .iter()
            .find(|i| i.title == "Spacing `padding-x` (Horizontal padding)")
            .expect("padding-x edit");
        assert_eq!(padding.current_value, "px-4");

        let weight = optional
            .iter()
            .find(|i| i.title == "Typography `font-weight`")
            .expect("weight edit");
        assert_eq!(weight.suggested_fix, "font-semibold");

        let free_form = optional
            .iter()
            .find(|i| i.spec_requirement == "Uppercase labels")
            .expect("free-form typography is still listed");
        assert!(free_form.options.is_empty());
        assert!(free_form.target.is_none());
    }

    #[test]
    fn purpose_to_theme_token() {
        assert_eq!(theme_token_for_purpose("Primary background"), "bg-primary");
        assert_eq!(theme_token_for_purpose("primary text"), "text-primary-foreground");
        assert_eq!(theme_token_for_purpose("Body text"), "text-primary-foreground");
        assert_eq!(theme_token_for_purpose("foreground"), "text-foreground");
        assert_eq!(theme_token_for_purpose("Border"), "border-border");
        assert_eq!(theme_token_for_purpose("Danger"), "bg-primary");
        assert_eq!(theme_token_for_purpose("destructive"), "bg-destructive");
    }

    #[test]
    fn typography_lines_parse_size_weight_and_leading() {
        assert_eq!(
            parse_typography_line("Font size: 14px"),
            Some((CssProperty::FontSize, 14))
        );
        assert_eq!(
            parse_typography_line("Weight: 600"),
            Some((CssProperty::FontWeight, 600))
        );
        assert_eq!(
            parse_typography_line("Label: medium"),
            Some((CssProperty::FontWeight, 500))
        );
        assert_eq!(
            parse_typography_line("Line height: 20px"),
            Some((CssProperty::LineHeight, 20))
        );
        assert_eq!(parse_typography_line("Uppercase labels"), None);
    }
}
