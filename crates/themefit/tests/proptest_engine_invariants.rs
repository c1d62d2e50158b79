// SPDX-License-Identifier: Apache-2.0
//! Property-based invariant tests for the token converter, validator and
//! mutator.
//!
//! 1. Pixel → token → pixel is lossless for every property.
//! 2. Off-scale values use the arbitrary-value form.
//! 3. Scores stay in [0, 100]; a clean report scores 100.
//! 4. The color pass is idempotent and removes its literal.
//! 5. Validation and mutation are deterministic.
//! 6. Validation and the structure check are total over arbitrary text.

use proptest::prelude::*;
use themefit::model::{ColorMapping, SpacingMapping, SpecToThemeMappings};
use themefit::tokens::exact_token;
use themefit::validator::{ScoreInputs, score_compliance};
use themefit::{
    CssProperty, ExtractedSpec, apply_mappings, check_structure, pixels_to_token,
    token_to_pixels, validate,
};

// ── Strategies ────────────────────────────────────────────────────────────

fn property() -> impl Strategy<Value = CssProperty> {
    prop::sample::select(CssProperty::ALL.to_vec())
}

fn hex_color() -> impl Strategy<Value = String> {
    "[0-9a-f]{6}".prop_map(|digits| format!("#{digits}"))
}

fn theme_token() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["bg-primary", "text-foreground", "border-border"])
}

fn spacing_token() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["2", "4", "6", "8", "10", "12"])
        .prop_map(|key| format!("h-{key}"))
}

fn fixture_spec() -> ExtractedSpec {
    let mut spec = ExtractedSpec {
        name: "Fixture".to_string(),
        spacing: vec!["Base height: 40px".to_string(), "Gap: 8px".to_string()],
        ..ExtractedSpec::default()
    };
    spec.variants
        .insert("size".to_string(), vec!["small".to_string(), "large".to_string()]);
    spec
}

// ═══════════════════════════════════════════════════════════════════════════
// 1. Scale round-trip
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn pixel_token_round_trip_is_lossless(property in property(), pixels in 0u32..10_000) {
        let token = pixels_to_token(property, pixels);
        prop_assert_eq!(
            token_to_pixels(property, &token),
            Some(pixels),
            "{} did not round-trip through {}",
            pixels,
            token
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 2. Arbitrary-value fallback
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn off_scale_values_use_brackets(property in property(), pixels in 0u32..10_000) {
        let token = pixels_to_token(property, pixels);
        if exact_token(property, pixels).is_none() {
            prop_assert!(token.starts_with(&format!("{}-[", property.prefix())), "{}", token);
            prop_assert!(token.ends_with(']'));
        } else {
            prop_assert!(!token.contains('['), "{}", token);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 3. Score range
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn score_stays_in_range(
        missing_variants in 0usize..40,
        spacing_issues in 0usize..40,
        color_issues in 0usize..40,
        has_spacing_token in any::<bool>(),
    ) {
        let score = score_compliance(&ScoreInputs {
            missing_variants,
            spacing_issues,
            color_issues,
            has_spacing_token,
        });
        prop_assert!(score <= 100);
        let clean = missing_variants == 0 && spacing_issues == 0 && color_issues == 0;
        prop_assert_eq!(score == 100, clean);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 4. Color pass idempotence
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn color_pass_is_idempotent(hex in hex_color(), token in theme_token()) {
        let source = format!(
            "export const v = cva(\"flex bg-[{hex}] text-[{}]\", {{\n  variants: {{ tone: {{ solid: \"{hex}\" }} }},\n}});\n",
            hex.to_ascii_uppercase()
        );
        let mappings = SpecToThemeMappings {
            colors: vec![ColorMapping {
                issue_id: "color-1".to_string(),
                from: hex.clone(),
                to: token.to_string(),
            }],
            ..SpecToThemeMappings::default()
        };

        let once = apply_mappings(&source, &mappings);
        prop_assert!(!once.to_ascii_lowercase().contains(&hex), "{}", once);
        prop_assert_eq!(apply_mappings(&once, &mappings), once);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 5. Determinism
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn mutation_and_validation_are_deterministic(
        first in spacing_token(),
        second in spacing_token(),
        hex in hex_color(),
    ) {
        let source = format!(
            "export const v = cva(\"flex h-9 gap-2 bg-[{hex}]\", {{\n  variants: {{ size: {{ small: \"h-8\" }} }},\n}});\n"
        );
        let mappings = SpecToThemeMappings {
            spacing: vec![
                SpacingMapping {
                    issue_id: "spacing-1".to_string(),
                    property: CssProperty::Height,
                    token: first,
                },
                SpacingMapping {
                    issue_id: "spacing-2".to_string(),
                    property: CssProperty::Height,
                    token: second.clone(),
                },
            ],
            ..SpecToThemeMappings::default()
        };

        let a = apply_mappings(&source, &mappings);
        let b = apply_mappings(&source, &mappings);
        prop_assert_eq!(&a, &b);
        let expected = format!("flex {second} gap-2");
        prop_assert!(a.contains(&expected), "{}", a);

        let spec = fixture_spec();
        prop_assert_eq!(validate(&a, &spec), validate(&b, &spec));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 6. Totality over arbitrary text
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn validation_never_fails_on_arbitrary_text(source in "[ -~\n]{0,240}") {
        let spec = fixture_spec();
        let report = validate(&source, &spec);
        prop_assert!(report.overall_match <= 100);
        prop_assert_eq!(report.has_theme_colors, report.color_issues.is_empty());

        let structure = check_structure(&source);
        prop_assert_eq!(structure.valid, structure.errors.is_empty());
    }
}
