// SPDX-License-Identifier: Apache-2.0
//! Cascade parser for the generative service's text response.
//!
//! The service is asked for a JSON object carrying the extracted spec and the
//! component source, but answers arrive wrapped in prose, fenced blocks or
//! slightly broken JSON. Strategies are tried in order and the first one that
//! yields a JSON object wins:
//!
//! 1. the first fenced ```` ```json ```` block
//! 2. the first balanced `{ … }` object in the raw text
//! 3. either candidate after cleanup (comments, trailing commas, smart quotes)
//!
//! The spec is read from a `spec` member or from the top level; the source
//! from `code`, `componentCode` or `source`, falling back to a fenced
//! `tsx`/`jsx` block outside the JSON.

use std::fmt;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, ThemefitError};
use crate::model::ExtractedSpec;

const SOURCE_KEYS: &[&str] = &["code", "componentCode", "source"];

/// Spec plus source text handed over by the generative service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedComponent {
    pub spec: ExtractedSpec,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseStrategy {
    FencedJson,
    BareObject,
    Cleaned,
}

impl ParseStrategy {
    pub const ALL: [Self; 3] = [Self::FencedJson, Self::BareObject, Self::Cleaned];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FencedJson => "fenced-json",
            Self::BareObject => "bare-object",
            Self::Cleaned => "cleaned",
        }
    }

    fn attempt(self, raw: &str) -> Option<Map<String, Value>> {
        match self {
            Self::FencedJson => fenced_block(raw, &["json"]).and_then(|body| parse_object(&body)),
            Self::BareObject => balanced_object(raw).and_then(parse_object),
            Self::Cleaned => {
                let candidates = [
                    fenced_block(raw, &["json"]),
                    balanced_object(raw).map(str::to_string),
                    first_to_last_brace(raw).map(str::to_string),
                ];
                candidates
                    .into_iter()
                    .flatten()
                    .find_map(|candidate| parse_object(&clean_json(&candidate)))
            }
        }
    }
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a raw generation response into spec and source.
pub fn parse_generation_response(raw: &str) -> Result<GeneratedComponent> {
    let mut attempts = Vec::new();

    for strategy in ParseStrategy::ALL {
        let Some(object) = strategy.attempt(raw) else {
            debug!(strategy = strategy.as_str(), "response strategy did not yield an object");
            attempts.push(strategy.as_str().to_string());
            continue;
        };
        match interpret(&object, raw) {
            Some(component) => {
                debug!(
                    strategy = strategy.as_str(),
                    component = component.spec.name.as_str(),
                    "generation response parsed"
                );
                return Ok(component);
            }
            None => attempts.push(format!("{} (no component source)", strategy.as_str())),
        }
    }

    Err(ThemefitError::ResponseParse { attempts })
}

fn interpret(object: &Map<String, Value>, raw: &str) -> Option<GeneratedComponent> {
    let spec_value = match object.get("spec") {
        Some(value @ Value::Object(_)) => value.clone(),
        _ => Value::Object(object.clone()),
    };
    let spec: ExtractedSpec = serde_json::from_value(spec_value).ok()?;

    let source = SOURCE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| fenced_block(raw, &["tsx", "jsx", "typescript", "ts", "javascript", "js"]))?;
    if source.trim().is_empty() {
        return None;
    }

    Some(GeneratedComponent {
        spec,
        source: normalize_newlines(&source),
    })
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Body of the first fenced block tagged with one of `languages`.
fn fenced_block(raw: &str, languages: &[&str]) -> Option<String> {
    let re = Regex::new(r"(?s)```([A-Za-z]*)[ \t]*\r?\n(.*?)```").expect("fenced block regex");
    re.captures_iter(raw).find_map(|caps| {
        let language = caps.get(1)?.as_str().to_ascii_lowercase();
        languages
            .contains(&language.as_str())
            .then(|| caps.get(2).map(|body| body.as_str().to_string()))
            .flatten()
    })
}

/// The first `{` and its matching `}`, ignoring braces inside JSON strings.
fn balanced_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn first_to_last_brace(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Repair the usual defects of model-written JSON.
fn clean_json(candidate: &str) -> String {
    let unquoted = candidate
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // Line comments outside strings.
    let mut without_comments = String::with_capacity(unquoted.len());
    for line in unquoted.lines() {
        without_comments.push_str(strip_line_comment(line));
        without_comments.push('\n');
    }

    let trailing = Regex::new(r",(\s*[}\]])").expect("trailing comma regex");
    trailing.replace_all(&without_comments, "$1").into_owned()
}

fn strip_line_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn normalize_newlines(source: &str) -> String {
    source.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "export const Button = () => null;";

    #[test]
    fn parses_fenced_json_with_nested_spec() {
        let raw = format!(
            "Here is the component.\n```json\n{{\"spec\": {{\"name\": \"Button\", \"variants\": {{\"size\": [\"small\"]}}}}, \"code\": \"{CODE}\"}}\n```\nEnjoy!"
        );
        let parsed = parse_generation_response(&raw).expect("parse");
        assert_eq!(parsed.spec.name, "Button");
        assert_eq!(parsed.spec.variants["size"], vec!["small"]);
        assert_eq!(parsed.source, CODE);
    }

    #[test]
    fn variant_dimensions_keep_the_generated_order() {
        let raw = format!(
            "```json\n{{\"spec\": {{\"variants\": {{\"tone\": [\"solid\"], \"size\": [\"small\"], \"emphasis\": [\"low\"]}}}}, \"code\": \"{CODE}\"}}\n```"
        );
        let parsed = parse_generation_response(&raw).expect("parse");
        let dimensions: Vec<&str> = parsed.spec.variants.keys().map(String::as_str).collect();
        assert_eq!(dimensions, vec!["tone", "size", "emphasis"]);
    }

    #[test]
    fn parses_bare_object_with_top_level_spec_fields() {
        let raw = format!(
            "Sure! {{\"name\": \"Card\", \"spacing\": [\"Gap: 8px\"], \"componentCode\": \"{CODE}\"}} Let me know."
        );
        let parsed = parse_generation_response(&raw).expect("parse");
        assert_eq!(parsed.spec.name, "Card");
        assert_eq!(parsed.spec.spacing, vec!["Gap: 8px"]);
        assert_eq!(parsed.source, CODE);
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        let raw = r#"{"name": "Brace", "code": "export function X() { return \"}\"; }"} trailing }"#;
        let parsed = parse_generation_response(raw).expect("parse");
        assert_eq!(parsed.source, r#"export function X() { return "}"; }"#);
    }

    #[test]
    fn cleanup_repairs_comments_trailing_commas_and_smart_quotes() {
        let raw = "```json\n{\n  // extracted\n  \u{201C}name\u{201D}: \"Input\",\n  \"colors\": [\"primary: #fff\",],\n  \"code\": \"export const Input = 1;\",\n}\n```";
        let parsed = parse_generation_response(raw).expect("parse");
        assert_eq!(parsed.spec.name, "Input");
        assert_eq!(parsed.spec.colors, vec!["primary: #fff"]);
    }

    #[test]
    fn source_can_come_from_a_separate_fenced_block() {
        let raw = "```json\n{\"name\": \"Badge\"}\n```\n\n```tsx\nexport function Badge() {\n  return null;\n}\n```";
        let parsed = parse_generation_response(raw).expect("parse");
        assert_eq!(parsed.spec.name, "Badge");
        assert!(parsed.source.starts_with("export function Badge()"));
    }

    #[test]
    fn failure_lists_every_attempt() {
        let error = parse_generation_response("no json here").unwrap_err();
        match error {
            ThemefitError::ResponseParse { attempts } => {
                assert_eq!(attempts, vec!["fenced-json", "bare-object", "cleaned"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn object_without_source_is_rejected() {
        let error = parse_generation_response("{\"name\": \"Ghost\"}").unwrap_err();
        assert!(error.to_string().contains("no component source"));
    }
}
