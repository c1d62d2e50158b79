// SPDX-License-Identifier: Apache-2.0
//! Bidirectional pixel ↔ utility-token conversion.
//!
//! Each property resolves to a class prefix and a scale table. The
//! pixel → token direction is total: an exact scale hit yields
//! `prefix-key`, anything else yields the arbitrary-value form
//! `prefix-[Npx]`. The token → pixel direction is partial and returns
//! `None` for anything it does not recognise.

use std::fmt;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

// ── Scales ─────────────────────────────────────────────────────────────

/// Shared by height, width, padding, margin and gap.
pub const SPACING_SCALE: &[(&str, u32)] = &[
    ("0", 0),
    ("px", 1),
    ("0.5", 2),
    ("1", 4),
    ("1.5", 6),
    ("2", 8),
    ("2.5", 10),
    ("3", 12),
    ("3.5", 14),
    ("4", 16),
    ("5", 20),
    ("6", 24),
    ("7", 28),
    ("8", 32),
    ("9", 36),
    ("10", 40),
    ("11", 44),
    ("12", 48),
    ("14", 56),
    ("16", 64),
    ("20", 80),
    ("24", 96),
    ("28", 112),
    ("32", 128),
    ("36", 144),
    ("40", 160),
    ("44", 176),
    ("48", 192),
    ("52", 208),
    ("56", 224),
    ("60", 240),
    ("64", 256),
    ("72", 288),
    ("80", 320),
    ("96", 384),
];

pub const FONT_SIZE_SCALE: &[(&str, u32)] = &[
    ("xs", 12),
    ("sm", 14),
    ("base", 16),
    ("lg", 18),
    ("xl", 20),
    ("2xl", 24),
    ("3xl", 30),
    ("4xl", 36),
    ("5xl", 48),
    ("6xl", 60),
    ("7xl", 72),
    ("8xl", 96),
    ("9xl", 128),
];

/// Numeric CSS weights, not pixels; the arbitrary form carries no unit.
pub const FONT_WEIGHT_SCALE: &[(&str, u32)] = &[
    ("thin", 100),
    ("extralight", 200),
    ("light", 300),
    ("normal", 400),
    ("medium", 500),
    ("semibold", 600),
    ("bold", 700),
    ("extrabold", 800),
    ("black", 900),
];

pub const LINE_HEIGHT_SCALE: &[(&str, u32)] = &[
    ("3", 12),
    ("4", 16),
    ("5", 20),
    ("6", 24),
    ("7", 28),
    ("8", 32),
    ("9", 36),
    ("10", 40),
];

/// The empty key is the bare `rounded` token.
pub const RADIUS_SCALE: &[(&str, u32)] = &[
    ("none", 0),
    ("sm", 2),
    ("", 4),
    ("md", 6),
    ("lg", 8),
    ("xl", 12),
    ("2xl", 16),
    ("3xl", 24),
    ("full", 9999),
];

// ── Properties ─────────────────────────────────────────────────────────

/// A CSS-like property that maps onto a utility-class prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CssProperty {
    Height,
    Width,
    Padding,
    PaddingX,
    PaddingY,
    Margin,
    MarginX,
    MarginY,
    Gap,
    BorderRadius,
    FontSize,
    FontWeight,
    LineHeight,
}

impl CssProperty {
    pub const ALL: [Self; 13] = [
        Self::Height,
        Self::Width,
        Self::Padding,
        Self::PaddingX,
        Self::PaddingY,
        Self::Margin,
        Self::MarginX,
        Self::MarginY,
        Self::Gap,
        Self::BorderRadius,
        Self::FontSize,
        Self::FontWeight,
        Self::LineHeight,
    ];

    /// Utility-class prefix for this property.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Height => "h",
            Self::Width => "w",
            Self::Padding => "p",
            Self::PaddingX => "px",
            Self::PaddingY => "py",
            Self::Margin => "m",
            Self::MarginX => "mx",
            Self::MarginY => "my",
            Self::Gap => "gap",
            Self::BorderRadius => "rounded",
            Self::FontSize => "text",
            Self::FontWeight => "font",
            Self::LineHeight => "leading",
        }
    }

    #[must_use]
    pub const fn scale(self) -> &'static [(&'static str, u32)] {
        match self {
            Self::BorderRadius => RADIUS_SCALE,
            Self::FontSize => FONT_SIZE_SCALE,
            Self::FontWeight => FONT_WEIGHT_SCALE,
            Self::LineHeight => LINE_HEIGHT_SCALE,
            _ => SPACING_SCALE,
        }
    }

    /// Kebab-case CSS name, as used in recommendations.
    #[must_use]
    pub const fn css_name(self) -> &'static str {
        match self {
            Self::Height => "height",
            Self::Width => "width",
            Self::Padding => "padding",
            Self::PaddingX => "padding-x",
            Self::PaddingY => "padding-y",
            Self::Margin => "margin",
            Self::MarginX => "margin-x",
            Self::MarginY => "margin-y",
            Self::Gap => "gap",
            Self::BorderRadius => "border-radius",
            Self::FontSize => "font-size",
            Self::FontWeight => "font-weight",
            Self::LineHeight => "line-height",
        }
    }

    #[must_use]
    pub fn from_css_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|property| property.css_name().eq_ignore_ascii_case(name))
    }

    /// Infer a property from a free-form spec label such as `"Base height"`
    /// or `"Horizontal padding"`.
    #[must_use]
    pub fn from_keyword(label: &str) -> Option<Self> {
        let lower = label.to_ascii_lowercase();
        let has = |needle: &str| lower.contains(needle);
        let horizontal = has("horizontal") || has("-x") || has(" x") || has("inline");
        let vertical = has("vertical") || has("-y") || has(" y") || has("block");

        // Order matters: "line height" must not fall through to "height".
        if has("line height") || has("line-height") || has("leading") {
            Some(Self::LineHeight)
        } else if has("font size") || has("font-size") || has("text size") {
            Some(Self::FontSize)
        } else if has("weight") {
            Some(Self::FontWeight)
        } else if has("radius") || has("rounded") || has("corner") {
            Some(Self::BorderRadius)
        } else if has("height") {
            Some(Self::Height)
        } else if has("width") {
            Some(Self::Width)
        } else if has("padding") {
            Some(if horizontal {
                Self::PaddingX
            } else if vertical {
                Self::PaddingY
            } else {
                Self::Padding
            })
        } else if has("margin") {
            Some(if horizontal {
                Self::MarginX
            } else if vertical {
                Self::MarginY
            } else {
                Self::Margin
            })
        } else if has("gap") {
            Some(Self::Gap)
        } else {
            None
        }
    }

    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|property| property.prefix() == prefix)
    }

    #[must_use]
    pub const fn is_spacing(self) -> bool {
        matches!(
            self,
            Self::Height
                | Self::Width
                | Self::Padding
                | Self::PaddingX
                | Self::PaddingY
                | Self::Margin
                | Self::MarginX
                | Self::MarginY
                | Self::Gap
        )
    }

    #[must_use]
    pub const fn is_typography(self) -> bool {
        matches!(self, Self::FontSize | Self::FontWeight | Self::LineHeight)
    }

    const fn arbitrary_unit(self) -> &'static str {
        match self {
            Self::FontWeight => "",
            _ => "px",
        }
    }
}

impl fmt::Display for CssProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

/// Utility prefix for a property.
#[must_use]
pub const fn prefix_for(property: CssProperty) -> &'static str {
    property.prefix()
}

/// Property owning a utility prefix (`"py"` → padding-y).
#[must_use]
pub fn property_for_prefix(prefix: &str) -> Option<CssProperty> {
    CssProperty::from_prefix(prefix)
}

// ── Conversion ─────────────────────────────────────────────────────────

fn format_token(property: CssProperty, key: &str) -> String {
    if key.is_empty() {
        property.prefix().to_string()
    } else {
        format!("{}-{key}", property.prefix())
    }
}

/// The arbitrary-value token for `pixels`, regardless of scale membership.
#[must_use]
pub fn arbitrary_token(property: CssProperty, pixels: u32) -> String {
    format!(
        "{}-[{pixels}{}]",
        property.prefix(),
        property.arbitrary_unit()
    )
}

/// The exact scale token for `pixels`, if one exists.
#[must_use]
pub fn exact_token(property: CssProperty, pixels: u32) -> Option<String> {
    property
        .scale()
        .iter()
        .find(|(_, value)| *value == pixels)
        .map(|(key, _)| format_token(property, key))
}

/// Convert a pixel value into a utility token. Never loses precision.
#[must_use]
pub fn pixels_to_token(property: CssProperty, pixels: u32) -> String {
    exact_token(property, pixels).unwrap_or_else(|| arbitrary_token(property, pixels))
}

/// Parse the number inside an arbitrary-value bracket (`[40px]`, `[2.5rem]`,
/// `[550]`). Rem values are converted at 16px per rem.
fn parse_bracket_value(token: &str) -> Option<u32> {
    let re = Regex::new(r"\[(\d+(?:\.\d+)?)(px|rem)?\]").expect("bracket value regex");
    let caps = re.captures(token)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let value = match caps.get(2).map(|m| m.as_str()) {
        Some("rem") => number * 16.0,
        _ => number,
    };
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}

/// Drop state/breakpoint modifiers (`hover:`, `md:`) in front of a token.
#[must_use]
pub fn strip_modifiers(token: &str) -> &str {
    let bracket = token.find('[').unwrap_or(token.len());
    match token[..bracket].rfind(':') {
        Some(idx) => &token[idx + 1..],
        None => token,
    }
}

/// Convert a utility token back into pixels. Unknown tokens yield `None`.
#[must_use]
pub fn token_to_pixels(property: CssProperty, token: &str) -> Option<u32> {
    let token = strip_modifiers(token.trim());
    let prefix = property.prefix();
    let key = if token == prefix {
        ""
    } else {
        token.strip_prefix(prefix)?.strip_prefix('-')?
    };
    if key.starts_with('[') {
        return parse_bracket_value(key);
    }
    property
        .scale()
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, value)| *value)
}

/// Identify which property a bare utility token belongs to.
///
/// Bracket forms are only accepted with numeric content, so color brackets
/// such as `text-[#fff]` are not mistaken for font sizes.
#[must_use]
pub fn classify_token(token: &str) -> Option<(CssProperty, Option<u32>)> {
    let token = strip_modifiers(token.trim());
    CssProperty::ALL.into_iter().find_map(|property| {
        let prefix = property.prefix();
        let rest = if token == prefix {
            ""
        } else {
            token.strip_prefix(prefix)?.strip_prefix('-')?
        };
        if rest.starts_with('[') {
            let pixels = parse_bracket_value(rest)?;
            return Some((property, Some(pixels)));
        }
        property
            .scale()
            .iter()
            .find(|(key, _)| *key == rest)
            .map(|(_, value)| (property, Some(*value)))
    })
}

/// Ranked replacement candidates for a target value: the exact scale token
/// (when one exists), the nearest lower and nearest higher scale tokens, and
/// always the arbitrary-value token last.
#[must_use]
pub fn spacing_options(property: CssProperty, pixels: u32) -> Vec<String> {
    let scale = property.scale();
    let mut options = Vec::with_capacity(4);

    if let Some(exact) = exact_token(property, pixels) {
        options.push(exact);
    }
    let lower = scale
        .iter()
        .filter(|(_, value)| *value < pixels)
        .max_by_key(|(_, value)| *value);
    if let Some((key, _)) = lower {
        options.push(format_token(property, key));
    }
    let higher = scale
        .iter()
        .filter(|(_, value)| *value > pixels)
        .min_by_key(|(_, value)| *value);
    if let Some((key, _)) = higher {
        options.push(format_token(property, key));
    }
    let arbitrary = arbitrary_token(property, pixels);
    if !options.contains(&arbitrary) {
        options.push(arbitrary);
    }
    options
}

/// Regex alternation matching any value this property can carry, longest
/// keys first so `1.5` wins over `1`.
#[must_use]
pub fn value_pattern(property: CssProperty) -> String {
    let mut keys: Vec<&str> = property
        .scale()
        .iter()
        .map(|(key, _)| *key)
        .filter(|key| !key.is_empty())
        .collect();
    keys.sort_by_key(|key| std::cmp::Reverse(key.len()));
    let mut alternatives: Vec<String> = keys.into_iter().map(regex_lite::escape).collect();
    alternatives.push(r"\[\d+(?:\.\d+)?(?:px|rem)?\]".to_string());
    alternatives.join("|")
}
