// SPDX-License-Identifier: Apache-2.0
//! Engine subcommands: argument structs and their runners.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use crate::error::{Result, ThemefitError};
use crate::extractor::MappingExtractor;
use crate::model::{ExtractedSpec, SpecToThemeMappings};
use crate::mutator::{apply_mappings_traced, check_structure_with_policy};
use crate::policy::EnginePolicy;
use crate::response::parse_generation_response;
use crate::review::{JsonDirStore, ReviewSession, ReviewState};
use crate::scanner::editable_properties;
use crate::tokens::{CssProperty, pixels_to_token, spacing_options, token_to_pixels};
use crate::util::{
    OutputIntegration, ensure_dir, output_for, read_json, read_string, write_string,
};
use crate::validator::validate_with_policy;

/// Spec, source and policy shared by every engine subcommand.
#[derive(Debug, Clone, Args)]
pub struct EngineInputArgs {
    /// Extracted spec JSON.
    #[arg(long)]
    pub spec: PathBuf,

    /// Component source file.
    #[arg(long)]
    pub source: PathBuf,

    /// Engine policy JSON; the built-in policy when absent.
    #[arg(long)]
    pub policy: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct EngineInputs {
    pub spec: ExtractedSpec,
    pub source: String,
    pub policy: EnginePolicy,
}

impl EngineInputArgs {
    pub fn load(&self) -> Result<EngineInputs> {
        Ok(EngineInputs {
            spec: read_json(&self.spec)?,
            source: read_string(&self.source)?,
            policy: EnginePolicy::load(self.policy.as_deref())?,
        })
    }
}

fn display_name(spec: &ExtractedSpec) -> &str {
    if spec.name.trim().is_empty() {
        "component"
    } else {
        spec.name.as_str()
    }
}

fn pass_fail(passed: bool) -> &'static str {
    if passed { "pass" } else { "fail" }
}

// ── validate ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub input: EngineInputArgs,

    /// Exit non-zero when the overall match is below this score.
    #[arg(long = "fail-under", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub fail_under: Option<u8>,

    #[arg(long)]
    pub json: bool,
}

pub fn run_validate(args: ValidateArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    run_validate_with_integration(args, &integration)
}

pub(crate) fn run_validate_with_integration(
    args: ValidateArgs,
    integration: &OutputIntegration,
) -> Result<()> {
    let ui = output_for(integration);
    let inputs = args.input.load()?;
    let report = validate_with_policy(&inputs.source, &inputs.spec, &inputs.policy);

    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "command": "validate",
                "status": "ok",
                "component": inputs.spec.name,
                "report": report,
                "integration": integration,
            })
        );
    } else {
        ui.rule(Some(&format!("{} compliance", display_name(&inputs.spec))));
        ui.info(&format!("overall match: {}/100", report.overall_match));
        ui.info(&format!(
            "variants: {} | spacing: {} | colors: {}",
            pass_fail(report.has_required_variants),
            pass_fail(report.has_correct_spacing),
            pass_fail(report.has_theme_colors)
        ));
        for recommendation in &report.recommendations {
            ui.warning(recommendation);
        }
        if report.is_fully_compliant() {
            ui.success("component follows the design tokens");
        }
    }

    if let Some(threshold) = args.fail_under
        && report.overall_match < threshold
    {
        return Err(ThemefitError::exit(
            1,
            format!(
                "overall match {} is below --fail-under {threshold}",
                report.overall_match
            ),
        ));
    }
    Ok(())
}

// ── issues ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct IssuesArgs {
    #[command(flatten)]
    pub input: EngineInputArgs,

    /// Also list optional edits for properties that already comply.
    #[arg(long)]
    pub advanced: bool,

    /// Write the issue list here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

pub fn run_issues(args: IssuesArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    run_issues_with_integration(args, &integration)
}

pub(crate) fn run_issues_with_integration(
    args: IssuesArgs,
    integration: &OutputIntegration,
) -> Result<()> {
    let ui = output_for(integration);
    let inputs = args.input.load()?;
    let report = validate_with_policy(&inputs.source, &inputs.spec, &inputs.policy);
    let extractor = MappingExtractor::new(&inputs.spec, &report)
        .with_policy(&inputs.policy)
        .with_source(&inputs.source);
    let issues = if args.advanced {
        extractor.all_properties()
    } else {
        extractor.issues()
    };

    let content = serde_json::to_string_pretty(&issues)?;
    match &args.output {
        Some(path) => {
            write_string(path, &content)?;
            ui.success(&format!("{} issue(s) written to {}", issues.len(), path.display()));
            if integration.should_emit_json() {
                println!(
                    "{}",
                    json!({
                        "command": "issues",
                        "status": "ok",
                        "count": issues.len(),
                        "output": path.display().to_string(),
                        "integration": integration,
                    })
                );
            }
        }
        None => println!("{content}"),
    }
    Ok(())
}

// ── apply ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct ApplyArgs {
    /// Component source file.
    #[arg(long)]
    pub source: PathBuf,

    /// Mapping set JSON (`colors`, `spacing`, `variants`).
    #[arg(long)]
    pub mappings: PathBuf,

    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Write the rewritten source here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

pub fn run_apply(args: ApplyArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    run_apply_with_integration(args, &integration)
}

pub(crate) fn run_apply_with_integration(
    args: ApplyArgs,
    integration: &OutputIntegration,
) -> Result<()> {
    let ui = output_for(integration);
    let source = read_string(&args.source)?;
    let mappings: SpecToThemeMappings = read_json(&args.mappings)?;
    let policy = EnginePolicy::load(args.policy.as_deref())?;

    let result = apply_mappings_traced(&source, &mappings, &policy);
    let structure = check_structure_with_policy(&result.text, &policy);
    for error in &structure.errors {
        ui.warning(&format!("structure: {error}"));
    }

    if let Some(path) = &args.output {
        write_string(path, &result.text)?;
        ui.success(&format!(
            "{} transformation(s) applied, written to {}",
            result.stats.transformations,
            path.display()
        ));
    } else if !integration.should_emit_json() {
        print!("{}", result.text);
    }

    if integration.should_emit_json() {
        let text = args.output.is_none().then_some(result.text.as_str());
        println!(
            "{}",
            json!({
                "command": "apply",
                "status": "ok",
                "output": args.output.as_ref().map(|path| path.display().to_string()),
                "text": text,
                "records": result.records,
                "stats": result.stats,
                "structure": structure,
                "integration": integration,
            })
        );
    }
    Ok(())
}

// ── review ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct ReviewArgs {
    #[command(flatten)]
    pub input: EngineInputArgs,

    /// `ISSUE_ID=VALUE` choice; an empty value takes the suggested fix.
    /// Without any, every fixable issue takes its suggested fix.
    #[arg(long = "select", value_name = "ID=VALUE")]
    pub select: Vec<String>,

    #[arg(long)]
    pub advanced: bool,

    /// Directory the saved component record goes to.
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Commit the preview to `--store`.
    #[arg(long)]
    pub save: bool,

    /// Write the previewed source here.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

pub(crate) fn parse_selections(values: &[String]) -> Result<Vec<(String, String)>> {
    values
        .iter()
        .map(|raw| {
            let (id, value) = raw.split_once('=').unwrap_or((raw.as_str(), ""));
            let id = id.trim();
            if id.is_empty() {
                return Err(ThemefitError::invalid(format!(
                    "selection '{raw}' has no issue id"
                )));
            }
            Ok((id.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn run_review(args: ReviewArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    run_review_with_integration(args, &integration)
}

pub(crate) fn run_review_with_integration(
    args: ReviewArgs,
    integration: &OutputIntegration,
) -> Result<()> {
    let ui = output_for(integration);
    if args.save && args.store.is_none() {
        return Err(ThemefitError::invalid("--save requires --store"));
    }
    let selections = parse_selections(&args.select)?;
    let inputs = args.input.load()?;

    let mut session = ReviewSession::with_policy(inputs.policy).advanced(args.advanced);
    session.load_generated(inputs.spec, inputs.source)?;
    let score_before = session.validate()?.overall_match;

    if selections.is_empty() {
        let fixable: Vec<String> = session
            .issues()
            .iter()
            .filter(|issue| issue.is_issue && issue.target.is_some())
            .map(|issue| issue.id.clone())
            .collect();
        for id in fixable {
            session.select(&id, "")?;
        }
    } else {
        for (id, value) in &selections {
            session.select(id, value)?;
        }
    }

    if session.state() != ReviewState::MappingSelected {
        ui.success(&format!("nothing to fix, overall match {score_before}/100"));
        if integration.should_emit_json() {
            println!(
                "{}",
                json!({
                    "command": "review",
                    "status": "ok",
                    "state": session.state(),
                    "score_before": score_before,
                    "score_after": score_before,
                    "integration": integration,
                })
            );
        }
        return Ok(());
    }

    let preview = session.preview_selection()?.clone();
    ui.rule(Some("preview"));
    ui.info(&format!(
        "overall match: {} -> {} ({:+})",
        preview.score_before,
        preview.score_after,
        preview.score_delta()
    ));
    for error in &preview.structure.errors {
        ui.warning(&format!("structure: {error}"));
    }
    if let Some(path) = &args.output {
        write_string(path, &preview.text)?;
        ui.success(&format!("preview written to {}", path.display()));
    }

    let saved = match (&args.store, args.save) {
        (Some(root), true) => {
            let mut store = JsonDirStore::new(root.clone());
            let location = session.commit(&mut store)?;
            ui.success(&format!("saved {location}"));
            Some(location)
        }
        _ => None,
    };

    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "command": "review",
                "status": "ok",
                "state": session.state(),
                "selected": session.selection().len(),
                "score_before": preview.score_before,
                "score_after": preview.score_after,
                "mappings": preview.mappings,
                "structure": preview.structure,
                "saved": saved,
                "output": args.output.as_ref().map(|path| path.display().to_string()),
                "integration": integration,
            })
        );
    }
    Ok(())
}

// ── convert ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct ConvertArgs {
    /// CSS name (`padding`), utility prefix (`p`) or label (`Base height`).
    #[arg(long)]
    pub property: String,

    #[arg(long, conflicts_with = "token")]
    pub pixels: Option<u32>,

    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub json: bool,
}

pub(crate) fn resolve_property(name: &str) -> Option<CssProperty> {
    let name = name.trim();
    CssProperty::from_css_name(name)
        .or_else(|| CssProperty::from_prefix(name))
        .or_else(|| CssProperty::from_keyword(name))
}

pub fn run_convert(args: ConvertArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    let ui = output_for(&integration);
    let property = resolve_property(&args.property).ok_or_else(|| {
        ThemefitError::invalid(format!("unknown property '{}'", args.property))
    })?;

    match (args.pixels, args.token.as_deref()) {
        (Some(pixels), None) => {
            let token = pixels_to_token(property, pixels);
            let options = spacing_options(property, pixels);
            if integration.should_emit_json() {
                println!(
                    "{}",
                    json!({
                        "command": "convert",
                        "property": property,
                        "pixels": pixels,
                        "token": token,
                        "options": options,
                    })
                );
            } else {
                ui.info(&format!("{pixels}px -> {token}"));
                ui.info(&format!("options: {}", options.join(", ")));
            }
            Ok(())
        }
        (None, Some(token)) => {
            let pixels = token_to_pixels(property, token);
            if integration.should_emit_json() {
                println!(
                    "{}",
                    json!({
                        "command": "convert",
                        "property": property,
                        "token": token,
                        "pixels": pixels,
                    })
                );
            } else {
                match pixels {
                    Some(pixels) => ui.info(&format!("{token} -> {pixels}px")),
                    None => ui.warning(&format!(
                        "{token} has no pixel value for {}",
                        property.css_name()
                    )),
                }
            }
            Ok(())
        }
        _ => Err(ThemefitError::invalid(
            "exactly one of --pixels or --token is required",
        )),
    }
}

// ── parse-response ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct ParseResponseArgs {
    /// Raw text answer from the generative service.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long = "out-dir")]
    pub out_dir: PathBuf,

    #[arg(long)]
    pub json: bool,
}

pub fn run_parse_response(args: ParseResponseArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    let ui = output_for(&integration);
    let raw = read_string(&args.input)?;
    let component = parse_generation_response(&raw)?;

    ensure_dir(&args.out_dir)?;
    let spec_path = args.out_dir.join("spec.json");
    let source_path = args.out_dir.join("component.tsx");
    write_string(&spec_path, &serde_json::to_string_pretty(&component.spec)?)?;
    write_string(&source_path, &component.source)?;

    ui.success(&format!("spec: {}", spec_path.display()));
    ui.success(&format!("source: {}", source_path.display()));
    if integration.should_emit_json() {
        println!(
            "{}",
            json!({
                "command": "parse-response",
                "status": "ok",
                "component": component.spec.name,
                "spec": spec_path.display().to_string(),
                "source": source_path.display().to_string(),
                "integration": integration,
            })
        );
    }
    Ok(())
}

// ── properties ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct PropertiesArgs {
    /// Component source file.
    #[arg(long)]
    pub source: PathBuf,
}

/// Every recognised utility occurrence, as JSON on stdout.
pub fn run_properties(args: PropertiesArgs) -> Result<()> {
    let source = read_string(&args.source)?;
    let properties = editable_properties(&source);
    println!("{}", serde_json::to_string_pretty(&properties)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;
    use crate::model::MappingIssue;

    const SPEC: &str = r#"{
  "name": "Primary Button",
  "variants": { "size": ["small", "base"] },
  "spacing": ["Base height: 40px"]
}"#;

    const SOURCE: &str = r##"const buttonVariants = cva("inline-flex h-9 px-4 bg-[#3B82F6]", {
  variants: {
    size: {
      small: "h-8 px-3",
    },
  },
});

export function Button({ size }) {
  return <button className={buttonVariants({ size })} />;
}
"##;

    fn inputs(dir: &Path) -> EngineInputArgs {
        let spec = dir.join("spec.json");
        let source = dir.join("button.tsx");
        fs::write(&spec, SPEC).expect("write spec");
        fs::write(&source, SOURCE).expect("write source");
        EngineInputArgs {
            spec,
            source,
            policy: None,
        }
    }

    #[test]
    fn validate_fail_under_maps_to_exit_error() {
        let temp = tempdir().expect("tempdir");
        let args = ValidateArgs {
            input: inputs(temp.path()),
            fail_under: Some(90),
            json: true,
        };
        let error = run_validate(args).expect_err("63 is below 90");
        assert_eq!(error.exit_code(), 1);
        assert!(error.to_string().contains("overall match 63"));

        let args = ValidateArgs {
            input: inputs(temp.path()),
            fail_under: Some(60),
            json: true,
        };
        run_validate(args).expect("63 clears 60");
    }

    #[test]
    fn issues_are_written_as_json() {
        let temp = tempdir().expect("tempdir");
        let output = temp.path().join("issues.json");
        let args = IssuesArgs {
            input: inputs(temp.path()),
            advanced: false,
            output: Some(output.clone()),
            json: true,
        };
        run_issues_with_integration(args, &OutputIntegration::json()).expect("issues");

        let issues: Vec<MappingIssue> =
            serde_json::from_str(&fs::read_to_string(output).expect("read")).expect("parse");
        assert_eq!(issues.len(), 4);
        assert!(issues.iter().all(|issue| issue.is_issue));
    }

    #[test]
    fn apply_writes_rewritten_source() {
        let temp = tempdir().expect("tempdir");
        let input = inputs(temp.path());
        let mappings = temp.path().join("mappings.json");
        fs::write(
            &mappings,
            r##"{"colors": [{"issueId": "c1", "from": "#3B82F6", "to": "bg-primary"}],
                 "spacing": [{"issueId": "s1", "property": "height", "token": "h-10"}]}"##,
        )
        .expect("write mappings");
        let output = temp.path().join("out/button.tsx");

        let args = ApplyArgs {
            source: input.source,
            mappings,
            policy: None,
            output: Some(output.clone()),
            json: true,
        };
        run_apply(args).expect("apply");

        let text = fs::read_to_string(output).expect("read output");
        assert!(text.contains("inline-flex h-10 px-4 bg-primary"));
        assert!(text.contains("small: \"h-8 px-3\""));
    }

    #[test]
    fn review_auto_selects_and_saves() {
        let temp = tempdir().expect("tempdir");
        let store = temp.path().join("store");
        let output = temp.path().join("preview.tsx");
        let args = ReviewArgs {
            input: inputs(temp.path()),
            select: Vec::new(),
            advanced: false,
            store: Some(store.clone()),
            save: true,
            output: Some(output.clone()),
            json: true,
        };
        run_review(args).expect("review");

        let preview = fs::read_to_string(output).expect("preview");
        assert!(preview.contains("bg-primary"));
        let saved: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(store.join("primary-button.json")).expect("saved record"),
        )
        .expect("parse saved");
        assert_eq!(saved["report"]["overallMatch"], 100);
        assert_eq!(saved["source"], preview.as_str());
    }

    #[test]
    fn review_save_without_store_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let args = ReviewArgs {
            input: inputs(temp.path()),
            select: Vec::new(),
            advanced: false,
            store: None,
            save: true,
            output: None,
            json: true,
        };
        let error = run_review(args).expect_err("store required");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn review_unknown_selection_is_reported() {
        let temp = tempdir().expect("tempdir");
        let args = ReviewArgs {
            input: inputs(temp.path()),
            select: vec!["color-deadbeef00=bg-primary".to_string()],
            advanced: false,
            store: None,
            save: false,
            output: None,
            json: true,
        };
        let error = run_review(args).expect_err("unknown id");
        assert!(matches!(error, ThemefitError::UnknownIssue { .. }));
    }

    #[test]
    fn selections_split_on_first_equals() {
        let parsed = parse_selections(&[
            "variant-abc=base, large".to_string(),
            "spacing-def".to_string(),
            "color-x=var(--a=b)".to_string(),
        ])
        .expect("parse");
        assert_eq!(
            parsed,
            vec![
                ("variant-abc".to_string(), "base, large".to_string()),
                ("spacing-def".to_string(), String::new()),
                ("color-x".to_string(), "var(--a=b)".to_string()),
            ]
        );
        assert!(parse_selections(&["=h-10".to_string()]).is_err());
    }

    #[test]
    fn property_names_resolve_from_several_spellings() {
        assert_eq!(resolve_property("padding"), Some(CssProperty::Padding));
        assert_eq!(resolve_property("h"), Some(CssProperty::Height));
        assert_eq!(resolve_property("nope"), None);
    }

    #[test]
    fn convert_requires_exactly_one_input() {
        let args = ConvertArgs {
            property: "height".to_string(),
            pixels: None,
            token: None,
            json: true,
        };
        assert_eq!(run_convert(args).expect_err("missing input").exit_code(), 2);

        let args = ConvertArgs {
            property: "height".to_string(),
            pixels: Some(40),
            token: None,
            json: true,
        };
        run_convert(args).expect("convert");
    }

    #[test]
    fn parse_response_writes_spec_and_component() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("response.txt");
        fs::write(
            &input,
            "```json\n{\"name\": \"Badge\", \"code\": \"export const Badge = () => null;\"}\n```",
        )
        .expect("write response");
        let out_dir = temp.path().join("generated");

        let args = ParseResponseArgs {
            input,
            out_dir: out_dir.clone(),
            json: true,
        };
        run_parse_response(args).expect("parse response");

        let spec: ExtractedSpec =
            serde_json::from_str(&fs::read_to_string(out_dir.join("spec.json")).expect("spec"))
                .expect("parse spec");
        assert_eq!(spec.name, "Badge");
        assert_eq!(
            fs::read_to_string(out_dir.join("component.tsx")).expect("component"),
            "export const Badge = () => null;"
        );
    }
}
