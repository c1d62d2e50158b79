// SPDX-License-Identifier: Apache-2.0
//! Source rewriting: applies a [`SpecToThemeMappings`] set to component
//! source text.
//!
//! Passes run in a fixed order:
//! 1. **Color replacement**: every occurrence of a literal color becomes the
//!    chosen theme reference; arbitrary-value utilities keep their prefix
//! 2. **Spacing replacement**: one winner per property bucket, last mapping
//!    wins, replacing the first matching token anywhere in the text
//! 3. **Variant insertion**: missing dimensions and values are spliced into
//!    the variant-definition block with placeholder bindings
//! 4. **Conflict resolution**: a dimension named like a reserved host
//!    attribute is renamed everywhere it is bound (always runs)
//!
//! Every pass is deterministic and only looks at the text and the mapping
//! set. Text that does not have the expected shape turns the affected
//! mapping into a no-op instead of an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex_lite::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::model::{ColorMapping, SpacingMapping, SpecToThemeMappings, VariantMapping};
use crate::policy::{EnginePolicy, is_identifier};
use crate::scanner::{TextScanner, UtilityScanner};
use crate::tokens::CssProperty;

// ── Constants ──────────────────────────────────────────────────────────

/// Module version tag.
pub const MUTATOR_VERSION: &str = "themefit-mutator-v1";

const SNIPPET_RADIUS: usize = 24;

// ── Core Types ─────────────────────────────────────────────────────────

/// Rewritten text plus an audit trail of what each pass changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResult {
    /// Schema version.
    pub version: String,
    pub text: String,
    pub records: Vec<TransformationRecord>,
    pub stats: MutationStats,
}

/// A single change applied by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationRecord {
    pub pass: PassKind,
    /// Mapping that caused the change; `None` for conflict resolution.
    pub issue_id: Option<String>,
    pub description: String,
    /// Text around the change before it was applied.
    pub before_snippet: String,
    /// Text around the change after it was applied.
    pub after_snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassKind {
    ColorReplacement,
    SpacingReplacement,
    VariantInsertion,
    ConflictResolution,
}

impl PassKind {
    /// Execution order.
    pub const ALL: [Self; 4] = [
        Self::ColorReplacement,
        Self::SpacingReplacement,
        Self::VariantInsertion,
        Self::ConflictResolution,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationStats {
    pub passes_executed: usize,
    pub transformations: usize,
    /// Per-pass counts.
    pub by_pass: BTreeMap<String, usize>,
}

/// Advisory post-mutation sanity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

// ── Public API ─────────────────────────────────────────────────────────

/// Apply `mappings` with the built-in policy.
#[must_use]
pub fn apply_mappings(source: &str, mappings: &SpecToThemeMappings) -> String {
    apply_mappings_with_policy(source, mappings, EnginePolicy::builtin())
}

#[must_use]
pub fn apply_mappings_with_policy(
    source: &str,
    mappings: &SpecToThemeMappings,
    policy: &EnginePolicy,
) -> String {
    apply_mappings_traced(source, mappings, policy).text
}

/// Apply `mappings` and keep the per-pass transformation records.
#[must_use]
pub fn apply_mappings_traced(
    source: &str,
    mappings: &SpecToThemeMappings,
    policy: &EnginePolicy,
) -> MutationResult {
    let _span = info_span!(
        "apply_mappings",
        colors = mappings.colors.len(),
        spacing = mappings.spacing.len(),
        variants = mappings.variants.len()
    )
    .entered();

    let mut text = source.to_string();
    let mut records = Vec::new();
    let mut stats = MutationStats::default();

    for pass in PassKind::ALL {
        stats.passes_executed += 1;
        let pass_records = run_pass(pass, &mut text, mappings, policy);
        let count = pass_records.len();
        if count > 0 {
            *stats.by_pass.entry(format!("{pass:?}")).or_insert(0) += count;
            stats.transformations += count;
            records.extend(pass_records);
        }
    }
    debug!(transformations = stats.transformations, "mappings applied");

    MutationResult {
        version: MUTATOR_VERSION.to_string(),
        text,
        records,
        stats,
    }
}

/// [`check_structure_with_policy`] with the built-in policy.
#[must_use]
pub fn check_structure(text: &str) -> StructureCheck {
    check_structure_with_policy(text, EnginePolicy::builtin())
}

/// Balanced braces and parentheses (outside strings and comments), a
/// variant-definition call and an export statement. Never blocks anything;
/// callers decide what to do with the errors.
#[must_use]
pub fn check_structure_with_policy(text: &str, policy: &EnginePolicy) -> StructureCheck {
    let mut errors = Vec::new();
    let (mut open_braces, mut close_braces, mut open_parens, mut close_parens) = (0, 0, 0, 0);
    for (_, byte) in code_bytes(text, 0, text.len()) {
        match byte {
            b'{' => open_braces += 1,
            b'}' => close_braces += 1,
            b'(' => open_parens += 1,
            b')' => close_parens += 1,
            _ => {}
        }
    }
    if open_braces != close_braces {
        errors.push(format!(
            "unbalanced braces: {open_braces} opening, {close_braces} closing"
        ));
    }
    if open_parens != close_parens {
        errors.push(format!(
            "unbalanced parentheses: {open_parens} opening, {close_parens} closing"
        ));
    }
    if !call_regex(policy).is_match(text) {
        errors.push(format!(
            "missing `{}(` variant definition call",
            policy.variant_call
        ));
    }
    if !identifier_present(text, "export") {
        errors.push("missing export statement".to_string());
    }

    StructureCheck {
        valid: errors.is_empty(),
        errors,
    }
}

// ── Pass Dispatch ──────────────────────────────────────────────────────

fn run_pass(
    pass: PassKind,
    text: &mut String,
    mappings: &SpecToThemeMappings,
    policy: &EnginePolicy,
) -> Vec<TransformationRecord> {
    match pass {
        PassKind::ColorReplacement => pass_color_replacement(text, &mappings.colors),
        PassKind::SpacingReplacement => pass_spacing_replacement(text, &mappings.spacing),
        PassKind::VariantInsertion => pass_variant_insertion(text, &mappings.variants, policy),
        PassKind::ConflictResolution => pass_conflict_resolution(text, policy),
    }
}

// ── Pass 1: Color Replacement ──────────────────────────────────────────

fn literal_pattern(literal: &str) -> String {
    let escaped = regex_lite::escape(literal);
    if literal.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        format!(r"{escaped}\b")
    } else {
        escaped
    }
}

/// Utility prefixes that take a color slot (`bg-primary`, `text-[#fff]`).
const COLOR_UTILITIES: &[&str] = &[
    "bg",
    "text",
    "border",
    "ring",
    "outline",
    "fill",
    "stroke",
    "decoration",
    "accent",
    "caret",
    "divide",
    "placeholder",
    "shadow",
    "from",
    "via",
    "to",
];

/// Theme slot of a color utility token: `primary` for `bg-primary`,
/// `muted-foreground` for `text-muted-foreground`.
fn theme_slot(token: &str) -> Option<&str> {
    let (utility, slot) = token.split_once('-')?;
    (COLOR_UTILITIES.contains(&utility) && !slot.is_empty() && !slot.starts_with('['))
        .then_some(slot)
}

fn pass_color_replacement(text: &mut String, mappings: &[ColorMapping]) -> Vec<TransformationRecord> {
    let mut records = Vec::new();

    for mapping in mappings {
        let literal = mapping.from.trim();
        let replacement = mapping.to.trim();
        if literal.is_empty() || replacement.is_empty() {
            debug!(issue_id = mapping.issue_id.as_str(), "empty color mapping skipped");
            continue;
        }
        let body = literal_pattern(literal);
        // An arbitrary-value utility keeps its own prefix and takes the
        // token's theme slot: `text-[#fff]` becomes `text-primary` for
        // `bg-primary`. Tokens without a slot fill the brackets instead.
        let arbitrary = Regex::new(&format!(r"(?i)\b([a-z][\w-]*)-\[{body}\]"))
            .expect("arbitrary color regex");
        let bare = Regex::new(&format!("(?i){body}")).expect("literal color regex");
        let slot = theme_slot(replacement);

        let current = text.as_str();
        let first = slot
            .and_then(|_| arbitrary.find(current))
            .or_else(|| bare.find(current))
            .map(|m| (m.start(), m.end()));
        let Some((start, end)) = first else {
            debug!(
                issue_id = mapping.issue_id.as_str(),
                literal, "color literal not found; mapping is a no-op"
            );
            continue;
        };
        let before_snippet = snippet(text, start, end);

        let mut count = 0;
        let mut rewritten = text.clone();
        if let Some(slot) = slot {
            count += arbitrary.find_iter(&rewritten).count();
            rewritten = arbitrary
                .replace_all(&rewritten, |caps: &regex_lite::Captures<'_>| {
                    format!("{}-{slot}", &caps[1])
                })
                .into_owned();
        }
        count += bare.find_iter(&rewritten).count();
        let rewritten = bare.replace_all(&rewritten, NoExpand(replacement)).into_owned();
        let after_snippet = snippet(&rewritten, start, start + replacement.len());
        *text = rewritten;

        records.push(TransformationRecord {
            pass: PassKind::ColorReplacement,
            issue_id: Some(mapping.issue_id.clone()),
            description: format!("replaced {count} occurrence(s) of {literal} with {replacement}"),
            before_snippet,
            after_snippet,
        });
    }

    records
}

// ── Pass 2: Spacing Replacement ────────────────────────────────────────

/// Properties that share one physical token slot in the text-scan model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpacingBucket {
    Height,
    Padding,
    Gap,
    /// Every remaining property (width, margin, radius, typography).
    Other,
}

impl SpacingBucket {
    fn of(property: CssProperty) -> Self {
        match property {
            CssProperty::Height => Self::Height,
            CssProperty::Padding | CssProperty::PaddingX | CssProperty::PaddingY => Self::Padding,
            CssProperty::Gap => Self::Gap,
            _ => Self::Other,
        }
    }

    fn members(self) -> Vec<CssProperty> {
        match self {
            Self::Height => vec![CssProperty::Height],
            Self::Padding => vec![
                CssProperty::Padding,
                CssProperty::PaddingX,
                CssProperty::PaddingY,
            ],
            Self::Gap => vec![CssProperty::Gap],
            Self::Other => CssProperty::ALL
                .into_iter()
                .filter(|property| Self::of(*property) == Self::Other)
                .collect(),
        }
    }
}

impl fmt::Display for SpacingBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height => f.write_str("height"),
            Self::Padding => f.write_str("padding"),
            Self::Gap => f.write_str("gap"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// Last write wins inside a bucket; buckets keep first-seen order.
fn bucket_winners(mappings: &[SpacingMapping]) -> Vec<(SpacingBucket, &SpacingMapping)> {
    let mut winners: Vec<(SpacingBucket, &SpacingMapping)> = Vec::new();
    for mapping in mappings {
        let bucket = SpacingBucket::of(mapping.property);
        match winners.iter_mut().find(|(existing, _)| *existing == bucket) {
            Some(slot) => {
                debug!(
                    bucket = %bucket,
                    superseded = slot.1.token.as_str(),
                    winner = mapping.token.as_str(),
                    "later spacing mapping wins bucket"
                );
                slot.1 = mapping;
            }
            None => winners.push((bucket, mapping)),
        }
    }
    winners
}

fn pass_spacing_replacement(
    text: &mut String,
    mappings: &[SpacingMapping],
) -> Vec<TransformationRecord> {
    let mut records = Vec::new();
    let mut scanner = TextScanner::new(std::mem::take(text));

    for (bucket, mapping) in bucket_winners(mappings) {
        let token = mapping.token.trim();
        if token.is_empty() {
            continue;
        }
        let Some(found) = scanner.find_first_of(&bucket.members()) else {
            debug!(bucket = %bucket, token, "no token in bucket; mapping is a no-op");
            continue;
        };
        if found.text == token {
            continue;
        }
        let before_snippet = snippet(scanner.as_str(), found.start, found.end);
        if scanner.replace_utility_token(found.property, token) {
            records.push(TransformationRecord {
                pass: PassKind::SpacingReplacement,
                issue_id: Some(mapping.issue_id.clone()),
                description: format!("{bucket}: {} -> {token}", found.text),
                before_snippet,
                after_snippet: snippet(scanner.as_str(), found.start, found.start + token.len()),
            });
        }
    }

    *text = scanner.into_text();
    records
}

// ── Pass 3: Variant Insertion ──────────────────────────────────────────

/// Byte span of the variant-definition object: `open` indexes its `{`,
/// `close` the matching `}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantBlock {
    pub open: usize,
    pub close: usize,
}

fn call_regex(policy: &EnginePolicy) -> Regex {
    Regex::new(&format!(r"\b{}\s*\(", regex_lite::escape(&policy.variant_call)))
        .expect("variant call regex")
}

/// The `variants: { … }` object, preferring one after the variant call.
#[must_use]
pub fn locate_variant_block(text: &str, policy: &EnginePolicy) -> Option<VariantBlock> {
    let from = call_regex(policy).find(text).map_or(0, |m| m.end());
    let key = Regex::new(r"\bvariants\s*:\s*\{").expect("variants key regex");
    let found = key.find_at(text, from).or_else(|| key.find(text))?;
    let open = found.end() - 1;
    let close = matching_brace(text, open)?;
    Some(VariantBlock { open, close })
}

fn pass_variant_insertion(
    text: &mut String,
    mappings: &[VariantMapping],
    policy: &EnginePolicy,
) -> Vec<TransformationRecord> {
    mappings
        .iter()
        .filter_map(|mapping| insert_variant(text, mapping, policy))
        .collect()
}

fn format_key(value: &str) -> String {
    if is_identifier(value) {
        value.to_string()
    } else {
        format!("\"{}\"", value.replace('"', "\\\""))
    }
}

fn insert_variant(
    text: &mut String,
    mapping: &VariantMapping,
    policy: &EnginePolicy,
) -> Option<TransformationRecord> {
    let dimension = mapping.dimension.trim();
    let mut values: Vec<&str> = Vec::new();
    for value in mapping.values.iter().map(|v| v.trim()) {
        if !value.is_empty() && !values.contains(&value) {
            values.push(value);
        }
    }
    if dimension.is_empty() || values.is_empty() {
        return None;
    }
    let Some(block) = locate_variant_block(text, policy) else {
        debug!(dimension, "no variant block; mapping is a no-op");
        return None;
    };

    let entries = object_entries(text, block.open, block.close);
    let (open, close, body, closing_indent, added) =
        match entries.iter().find(|e| !e.quoted && e.key == dimension) {
            Some(entry) => {
                if text.as_bytes().get(entry.value_start) != Some(&b'{') {
                    debug!(dimension, "dimension value is not an object literal");
                    return None;
                }
                let inner_close = matching_brace(text, entry.value_start)?;
                let existing_entries = object_entries(text, entry.value_start, inner_close);
                // Only bare identifier keys count as present.
                let existing: BTreeSet<&str> = existing_entries
                    .iter()
                    .filter(|e| !e.quoted)
                    .map(|e| e.key.as_str())
                    .collect();
                let missing: Vec<&str> = values
                    .iter()
                    .copied()
                    .filter(|v| !existing.contains(v))
                    .collect();
                if missing.is_empty() {
                    return None;
                }
                let key_indent = line_indent(text, entry.key_start);
                let value_indent = existing_entries
                    .first()
                    .and_then(|e| own_line_indent(text, e.key_start))
                    .unwrap_or_else(|| format!("{key_indent}  "));
                let body: String = missing
                    .iter()
                    .map(|v| format!("\n{value_indent}{}: \"\",", format_key(v)))
                    .collect();
                (entry.value_start, inner_close, body, key_indent, missing)
            }
            None => {
                let entry_indent = entries
                    .first()
                    .and_then(|e| own_line_indent(text, e.key_start))
                    .unwrap_or_else(|| format!("{}  ", line_indent(text, block.open)));
                let mut body = format!("\n{entry_indent}{}: {{", format_key(dimension));
                for value in &values {
                    body.push_str(&format!("\n{entry_indent}  {}: \"\",", format_key(value)));
                }
                body.push_str(&format!("\n{entry_indent}}},"));
                (block.open, block.close, body, line_indent(text, block.open), values)
            }
        };

    let before_snippet = snippet(text, close, close + 1);
    let (start, end) = splice_before_close(text, open, close, &body, &closing_indent);
    Some(TransformationRecord {
        pass: PassKind::VariantInsertion,
        issue_id: Some(mapping.issue_id.clone()),
        description: format!("added `{dimension}` values: {}", added.join(", ")),
        before_snippet,
        after_snippet: snippet(text, start, end),
    })
}

/// Insert `body` after the last non-whitespace byte inside `open..close`,
/// adding a separating comma when the previous entry lacks one.
fn splice_before_close(
    text: &mut String,
    open: usize,
    close: usize,
    body: &str,
    closing_indent: &str,
) -> (usize, usize) {
    let last = open + text[open + 1..close].trim_end().len();
    let mut insertion = String::new();
    if !matches!(text.as_bytes()[last], b',' | b'{') {
        insertion.push(',');
    }
    insertion.push_str(body);
    if !text[last + 1..close].contains('\n') {
        insertion.push('\n');
        insertion.push_str(closing_indent);
    }
    let at = last + 1;
    text.insert_str(at, &insertion);
    (at, at + insertion.len())
}

// ── Pass 4: Conflict Resolution ────────────────────────────────────────

fn pass_conflict_resolution(text: &mut String, policy: &EnginePolicy) -> Vec<TransformationRecord> {
    let mut records = Vec::new();

    for (reserved, renamed) in &policy.reserved_attributes {
        let Some(block) = locate_variant_block(text, policy) else {
            break;
        };
        let conflicting = object_entries(text, block.open, block.close)
            .iter()
            .any(|e| !e.quoted && e.key == *reserved);
        if !conflicting {
            continue;
        }
        let target = free_identifier(text, renamed);
        let sites = rename_sites(text, reserved);
        let Some(&first) = sites.first() else {
            continue;
        };

        let before_snippet = snippet(text, first, first + reserved.len());
        let mut rewritten = String::with_capacity(text.len() + sites.len() * target.len());
        let mut last = 0;
        for site in &sites {
            rewritten.push_str(&text[last..*site]);
            rewritten.push_str(&target);
            last = site + reserved.len();
        }
        rewritten.push_str(&text[last..]);
        let after_snippet = snippet(&rewritten, first, first + target.len());
        *text = rewritten;

        debug!(reserved = reserved.as_str(), target = target.as_str(), sites = sites.len(), "renamed reserved dimension");
        records.push(TransformationRecord {
            pass: PassKind::ConflictResolution,
            issue_id: None,
            description: format!(
                "renamed {} occurrence(s) of reserved `{reserved}` to `{target}`",
                sites.len()
            ),
            before_snippet,
            after_snippet,
        });
    }

    records
}

/// `name`, or the first of `{name}Variant`, `{name}Variant2`, … that the
/// text does not already use.
fn free_identifier(text: &str, name: &str) -> String {
    if !identifier_present(text, name) {
        return name.to_string();
    }
    let base = format!("{name}Variant");
    let mut candidate = base.clone();
    let mut suffix = 2;
    while identifier_present(text, &candidate) {
        candidate = format!("{base}{suffix}");
        suffix += 1;
    }
    candidate
}

/// Where a name is bound rather than used as an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    /// Object key or prop declaration: `name:` / `name?:`.
    Declaration,
    /// Destructured binding or shorthand property: `{ name,` `, name }`
    /// `{ name = …`, and expression slots `={name}`.
    Binding,
    /// Any other expression read: `name === "x"`, `fn(name)`.
    Read,
}

/// Positions to rename for a dimension called `name`. Reads are only
/// renamed once a binding was renamed, so the new binding is never left
/// dangling. Member access, strings, JSX attribute names and TypeScript
/// `type` keyword positions are skipped.
fn rename_sites(text: &str, name: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let Some(&first_byte) = name.as_bytes().first() else {
        return Vec::new();
    };
    let mut sites = Vec::new();

    for (i, byte) in code_bytes(text, 0, text.len()) {
        if byte != first_byte || !text[i..].starts_with(name) {
            continue;
        }
        let end = i + name.len();
        let prev_raw = i.checked_sub(1).map(|p| bytes[p]);
        if prev_raw.is_some_and(|b| is_ident_byte(b) || b == b'.')
            || bytes.get(end).is_some_and(|b| is_ident_byte(*b))
        {
            continue;
        }
        if let Some(site) = classify_site(bytes, i, end) {
            sites.push((i, site));
        }
    }

    let bound = sites.iter().any(|(_, site)| *site == Site::Binding);
    sites
        .into_iter()
        .filter(|(_, site)| bound || *site != Site::Read)
        .map(|(i, _)| i)
        .collect()
}

fn classify_site(bytes: &[u8], start: usize, end: usize) -> Option<Site> {
    let prev = prev_non_ws(bytes, start);
    let next_at = next_non_ws(bytes, end);
    let next = bytes.get(next_at).copied();
    let next2 = bytes.get(next_at + 1).copied();

    if prev != Some(b'?') && (next == Some(b':') || (next == Some(b'?') && next2 == Some(b':'))) {
        return Some(Site::Declaration);
    }
    let assigns = next == Some(b'=') && !matches!(next2, Some(b'=' | b'>'));
    if matches!(prev, Some(b'{' | b',')) && (matches!(next, Some(b',' | b'}')) || assigns) {
        return Some(Site::Binding);
    }
    // `type="text"` attributes and assignments keep their name.
    if assigns {
        return None;
    }
    // `type Props = …`, `import { type X }`, `export type { X }`.
    if next.is_some_and(|b| is_ident_byte(b) && !b.is_ascii_digit())
        && !matches!(word_at(bytes, next_at), "as" | "in" | "instanceof" | "satisfies")
    {
        return None;
    }
    if matches!(word_before(bytes, start), "import" | "export") {
        return None;
    }
    // JSX text such as `<label>type</label>`; arrow bodies still count.
    let arrow = prev == Some(b'>') && prev_byte_before(bytes, start) == Some(b'=');
    if (prev == Some(b'>') && !arrow) || next == Some(b'<') {
        return None;
    }
    Some(Site::Read)
}

// ── Lexing helpers ─────────────────────────────────────────────────────

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

fn identifier_present(text: &str, name: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex_lite::escape(name)))
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Identifier starting at `pos`.
fn word_at(bytes: &[u8], pos: usize) -> &str {
    let len = bytes
        .iter()
        .skip(pos)
        .take_while(|b| is_ident_byte(**b))
        .count();
    std::str::from_utf8(&bytes[pos..pos + len]).unwrap_or("")
}

/// Identifier ending at the last non-blank byte before `pos`.
fn word_before(bytes: &[u8], pos: usize) -> &str {
    let end = pos - bytes[..pos].iter().rev().take_while(|b| b.is_ascii_whitespace()).count();
    let len = bytes[..end]
        .iter()
        .rev()
        .take_while(|b| is_ident_byte(**b))
        .count();
    std::str::from_utf8(&bytes[end - len..end]).unwrap_or("")
}

/// The byte just before the last non-blank byte before `pos`.
fn prev_byte_before(bytes: &[u8], pos: usize) -> Option<u8> {
    let end = pos - bytes[..pos].iter().rev().take_while(|b| b.is_ascii_whitespace()).count();
    end.checked_sub(2).map(|p| bytes[p])
}

fn prev_non_ws(bytes: &[u8], pos: usize) -> Option<u8> {
    bytes[..pos]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .copied()
}

fn next_non_ws(bytes: &[u8], pos: usize) -> usize {
    bytes
        .iter()
        .skip(pos)
        .position(|b| !b.is_ascii_whitespace())
        .map_or(bytes.len(), |offset| pos + offset)
}

/// Index one past the closing quote of the string starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' if quote != b'`' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// End of a comment starting at `start`, if one does.
fn skip_comment(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start) != Some(&b'/') {
        return None;
    }
    match bytes.get(start + 1) {
        Some(b'/') => Some(
            bytes[start..]
                .iter()
                .position(|b| *b == b'\n')
                .map_or(bytes.len(), |offset| start + offset),
        ),
        Some(b'*') => Some(
            bytes[start + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(bytes.len(), |offset| start + 2 + offset + 2),
        ),
        _ => None,
    }
}

/// Bytes of `start..end` that are code, skipping strings and comments.
struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl Iterator for CodeBytes<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.end {
            let byte = self.bytes[self.pos];
            if matches!(byte, b'"' | b'\'' | b'`') {
                self.pos = skip_string(self.bytes, self.pos);
                continue;
            }
            if let Some(after) = skip_comment(self.bytes, self.pos) {
                self.pos = after;
                continue;
            }
            let at = self.pos;
            self.pos += 1;
            return Some((at, byte));
        }
        None
    }
}

fn code_bytes(text: &str, start: usize, end: usize) -> CodeBytes<'_> {
    CodeBytes {
        bytes: text.as_bytes(),
        pos: start,
        end: end.min(text.len()),
    }
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, byte) in code_bytes(text, open, text.len()) {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ObjectEntry {
    key: String,
    quoted: bool,
    key_start: usize,
    value_start: usize,
}

/// Top-level `key: value` entries of the object literal spanning
/// `open..=close`.
fn object_entries(text: &str, open: usize, close: usize) -> Vec<ObjectEntry> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut segment_start = open + 1;
    for (i, byte) in code_bytes(text, open + 1, close) {
        match byte {
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                segments.push((segment_start, i));
                segment_start = i + 1;
            }
            _ => {}
        }
    }
    segments.push((segment_start, close));

    let key_re = Regex::new(
        r#"^(?:\s+|//[^\n]*|/\*[\s\S]*?\*/)*(?:([A-Za-z_$][\w$]*)|"([^"\n]*)"|'([^'\n]*)')\s*:\s*"#,
    )
    .expect("object key regex");

    segments
        .into_iter()
        .filter_map(|(start, end)| {
            let caps = key_re.captures(&text[start..end])?;
            let (key, quoted) = match caps.get(1) {
                Some(bare) => (bare, false),
                None => (caps.get(2).or_else(|| caps.get(3))?, true),
            };
            Some(ObjectEntry {
                key: key.as_str().to_string(),
                quoted,
                key_start: start + key.start() - usize::from(quoted),
                value_start: start + caps.get(0)?.end(),
            })
        })
        .collect()
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |idx| idx + 1)
}

fn line_indent(text: &str, pos: usize) -> String {
    text[line_start(text, pos)..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

/// Indentation of `pos` when it is the first non-blank character of its line.
fn own_line_indent(text: &str, pos: usize) -> Option<String> {
    let prefix = &text[line_start(text, pos)..pos];
    prefix
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then(|| prefix.to_string())
}

fn snippet(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_RADIUS).min(text.len());
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = end.saturating_add(SNIPPET_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].replace('\n', " ")
}
