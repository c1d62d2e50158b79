// SPDX-License-Identifier: Apache-2.0
//! Text-level utility-token scanning.
//!
//! The validator, extractor and mutator only talk to source text through
//! [`UtilityScanner`], so a parser-backed implementation can replace
//! [`TextScanner`] without touching their contracts.
//!
//! Tokens are recognised inside class strings by boundary characters
//! (whitespace, quotes, `:` modifiers, braces, commas) rather than by parsing.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{EditableProperty, PropertyLocator};
use crate::tokens::{CssProperty, classify_token, token_to_pixels, value_pattern};

/// Characters allowed immediately before a utility token.
const LEAD_BOUNDARY: &str = r#"(^|[\s"'`:{(,])"#;
/// Characters allowed immediately after a utility token.
const TRAIL_BOUNDARY: &str = r#"($|[\s"'`,)}])"#;

/// One utility-token occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityToken {
    pub property: CssProperty,
    pub text: String,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    pub pixels: Option<u32>,
}

/// Find/replace the utility token bound to a property within source text.
pub trait UtilityScanner {
    /// First occurrence of a token for `property`, in source order.
    fn find_utility_token(&self, property: CssProperty) -> Option<UtilityToken>;

    /// Replace the first occurrence of a token for `property`. Returns
    /// `false` (and leaves the text untouched) when there is none.
    fn replace_utility_token(&mut self, property: CssProperty, new_token: &str) -> bool;
}

/// Regex-backed scanner over an owned source string.
#[derive(Debug, Clone, Default)]
pub struct TextScanner {
    text: String,
}

impl TextScanner {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    fn property_regex(property: CssProperty) -> Regex {
        let body = if property == CssProperty::BorderRadius {
            format!("rounded(?:-(?:{}))?", value_pattern(property))
        } else {
            format!("{}-(?:{})", regex_lite::escape(property.prefix()), value_pattern(property))
        };
        Regex::new(&format!("{LEAD_BOUNDARY}({body}){TRAIL_BOUNDARY}"))
            .expect("utility token regex")
    }

    /// Every occurrence of a token for `property`, in source order.
    #[must_use]
    pub fn find_all(&self, property: CssProperty) -> Vec<UtilityToken> {
        let re = Self::property_regex(property);
        let mut found = Vec::new();
        let mut pos = 0;
        while pos <= self.text.len() {
            let Some(caps) = re.captures_at(&self.text, pos) else {
                break;
            };
            let Some(token) = caps.get(2) else {
                break;
            };
            found.push(UtilityToken {
                property,
                text: token.as_str().to_string(),
                start: token.start(),
                end: token.end(),
                pixels: token_to_pixels(property, token.as_str()),
            });
            // Resume on the trailing boundary so adjacent tokens still match.
            pos = token.end();
        }
        found
    }

    /// Earliest occurrence among several properties.
    #[must_use]
    pub fn find_first_of(&self, properties: &[CssProperty]) -> Option<UtilityToken> {
        properties
            .iter()
            .filter_map(|property| self.find_utility_token(*property))
            .min_by_key(|token| token.start)
    }

    /// Whether the text carries the exact utility token `token` as a
    /// standalone class.
    #[must_use]
    pub fn contains_token(&self, token: &str) -> bool {
        let pattern = format!(
            "{LEAD_BOUNDARY}{}{TRAIL_BOUNDARY}",
            regex_lite::escape(token)
        );
        Regex::new(&pattern)
            .map(|re| re.is_match(&self.text))
            .unwrap_or(false)
    }

    /// Whether any spacing-shaped token occurs at all.
    #[must_use]
    pub fn has_spacing_token(&self) -> bool {
        let re = Regex::new(&format!(
            r"{LEAD_BOUNDARY}-?(?:h|w|size|p[xytrbl]?|m[xytrbl]?|gap(?:-[xy])?|space-[xy])-(?:\d+(?:\.\d+)?|px|\[\d+(?:\.\d+)?(?:px|rem)\]){TRAIL_BOUNDARY}"
        ))
        .expect("spacing shape regex");
        re.is_match(&self.text)
    }
}

impl UtilityScanner for TextScanner {
    fn find_utility_token(&self, property: CssProperty) -> Option<UtilityToken> {
        self.find_all(property).into_iter().next()
    }

    fn replace_utility_token(&mut self, property: CssProperty, new_token: &str) -> bool {
        let Some(found) = self.find_utility_token(property) else {
            return false;
        };
        self.text.replace_range(found.start..found.end, new_token);
        true
    }
}

// ── Editable properties ────────────────────────────────────────────────

/// 1-based (line, column) of a byte offset.
#[must_use]
pub fn line_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Name of the key or attribute that owns a string starting at `offset`
/// (`className="…"`, `small: "…"`), or `"literal"` when there is none.
fn owning_context(text: &str, offset: usize) -> String {
    let re = Regex::new(r"([A-Za-z_$][\w$-]*)\s*(?::|=\{?)\s*(?:[\w$.]+\()?\s*$")
        .expect("owning key regex");
    let start = offset.saturating_sub(120);
    let window_start = (start..=offset)
        .find(|idx| text.is_char_boundary(*idx))
        .unwrap_or(offset);
    re.captures(&text[window_start..offset])
        .and_then(|caps| caps.get(1))
        .map_or_else(|| "literal".to_string(), |m| m.as_str().to_string())
}

/// Every recognised utility token inside every string literal of `source`.
#[must_use]
pub fn editable_properties(source: &str) -> Vec<EditableProperty> {
    let strings = Regex::new(r#""([^"\n]*)"|'([^'\n]*)'|`([^`]*)`"#).expect("string literal regex");
    let words = Regex::new(r"\S+").expect("class word regex");
    let mut properties = Vec::new();

    for caps in strings.captures_iter(source) {
        let Some(body) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let literal_start = caps.get(0).map_or(body.start(), |m| m.start());
        let mut context: Option<String> = None;

        for word in words.find_iter(body.as_str()) {
            let piece = word.as_str();
            let piece_start = body.start() + word.start();
            let Some((property, pixels)) = classify_token(piece) else {
                continue;
            };
            let context = context
                .get_or_insert_with(|| owning_context(source, literal_start))
                .clone();
            let (line, column) = line_column(source, piece_start);
            properties.push(EditableProperty {
                property,
                token: piece.to_string(),
                pixels,
                locator: PropertyLocator {
                    line,
                    column,
                    context,
                },
            });
        }
    }

    properties
}
