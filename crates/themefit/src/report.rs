// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use crate::commands::EngineInputArgs;
use crate::error::Result;
use crate::extractor::MappingExtractor;
use crate::model::{ComplianceReport, EditableProperty, MappingIssue};
use crate::mutator::{StructureCheck, check_structure_with_policy};
use crate::scanner::editable_properties;
use crate::util::{OutputIntegration, now_utc_iso, output_for, write_string};
use crate::validator::validate_with_policy;

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: EngineInputArgs,

    #[arg(long = "output-html")]
    pub output_html: Option<PathBuf>,

    #[arg(long = "output-json")]
    pub output_json: Option<PathBuf>,

    #[arg(long, default_value = "Theme Compliance Report")]
    pub title: String,

    /// Force machine-readable output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub title: String,
    pub component: String,
    pub source_path: String,
    pub generated_at: String,
    pub overall_match: u8,
    pub failed_categories: usize,
    pub report: ComplianceReport,
    pub issues: Vec<MappingIssue>,
    pub editable_properties: Vec<EditableProperty>,
    pub structure: StructureCheck,
}

fn html_escape(value: &str) -> String {
    v_htmlescape::escape(value).to_string()
}

fn default_output(source: &Path, extension: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "component".to_string(), |s| s.to_string_lossy().into_owned());
    source.with_file_name(format!("{stem}.report.{extension}"))
}

fn score_class(score: u8) -> &'static str {
    match score {
        90..=100 => "ok",
        60..=89 => "warn",
        _ => "fail",
    }
}

fn render_category(html: &mut String, name: &str, passed: bool, items: &[String]) {
    let class_name = if passed { "ok" } else { "fail" };
    html.push_str(&format!("<section class=\"card {class_name}\">\n"));
    html.push_str(&format!(
        "<h2>{} <span class=\"pill\">{}</span></h2>\n",
        html_escape(name),
        if passed { "pass" } else { "fail" }
    ));
    for item in items {
        html.push_str(&format!("<div class=\"row\">{}</div>\n", html_escape(item)));
    }
    html.push_str("</section>\n");
}

fn render_html(summary: &ReportSummary) -> String {
    let mut html = String::new();

    html.push_str(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
    );
    html.push_str(&format!(
        "  <title>{}</title>\n",
        html_escape(&summary.title)
    ));
    html.push_str(
        "  <style>\n    body { font-family: ui-sans-serif, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 24px; background: #0f1115; color: #e7ebf3; }\n    h1, h2 { margin: 0 0 12px; }\n    .meta { margin-bottom: 20px; color: #a8b0c5; }\n    .score { font-size: 42px; font-weight: 700; margin-bottom: 16px; }\n    .score.ok { color: #2cb67d; }\n    .score.warn { color: #f5a524; }\n    .score.fail { color: #ef4565; }\n    .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); gap: 16px; margin-bottom: 24px; }\n    .card { border: 1px solid #2a3142; border-radius: 10px; padding: 14px; background: #171b24; }\n    .ok { border-left: 5px solid #2cb67d; }\n    .fail { border-left: 5px solid #ef4565; }\n    .row { margin: 4px 0; font-size: 13px; color: #c8d0e3; }\n    .label { color: #8a95b5; display: inline-block; min-width: 130px; }\n    table { border-collapse: collapse; width: 100%; font-size: 13px; }\n    th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid #2a3142; vertical-align: top; }\n    code { color: #b9c6ee; }\n    .pill { font-size: 11px; border: 1px solid #3a4460; border-radius: 999px; padding: 2px 8px; margin-left: 8px; color: #b9c6ee; }\n  </style>\n</head>\n<body>\n",
    );

    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&summary.title)));
    html.push_str(&format!(
        "<div class=\"meta\">component={} | source={} | generated_at={}</div>\n",
        html_escape(&summary.component),
        html_escape(&summary.source_path),
        html_escape(&summary.generated_at)
    ));
    html.push_str(&format!(
        "<div class=\"score {}\">{}/100</div>\n",
        score_class(summary.overall_match),
        summary.overall_match
    ));

    let report = &summary.report;
    html.push_str("<div class=\"grid\">\n");
    render_category(
        &mut html,
        "Variants",
        report.has_required_variants,
        &report.missing_variants,
    );
    render_category(&mut html, "Spacing", report.has_correct_spacing, &report.spacing_issues);
    render_category(&mut html, "Colors", report.has_theme_colors, &report.color_issues);
    render_category(
        &mut html,
        "Structure",
        summary.structure.valid,
        &summary.structure.errors,
    );
    html.push_str("</div>\n");

    if !report.recommendations.is_empty() {
        html.push_str("<h2>Recommendations</h2>\n<ul>\n");
        for recommendation in &report.recommendations {
            html.push_str(&format!("<li>{}</li>\n", html_escape(recommendation)));
        }
        html.push_str("</ul>\n");
    }

    if !summary.issues.is_empty() {
        html.push_str(
            "<h2>Mapping issues</h2>\n<table>\n<tr><th>id</th><th>type</th><th>title</th><th>current</th><th>suggested</th><th>options</th></tr>\n",
        );
        for issue in &summary.issues {
            html.push_str(&format!(
                "<tr><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td></tr>\n",
                html_escape(&issue.id),
                issue.issue_type,
                html_escape(&issue.title),
                html_escape(&issue.current_value),
                html_escape(&issue.suggested_fix),
                html_escape(&issue.options.join(", "))
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str(&format!(
        "<div class=\"meta\">editable properties: {}</div>\n",
        summary.editable_properties.len()
    ));
    html.push_str("</body>\n</html>\n");
    html
}

pub fn run_report(args: ReportArgs) -> Result<()> {
    let integration = OutputIntegration::resolve(args.json);
    run_report_with_integration(args, &integration)
}

pub(crate) fn run_report_with_integration(
    args: ReportArgs,
    integration: &OutputIntegration,
) -> Result<()> {
    let ui = output_for(integration);
    let inputs = args.input.load()?;

    let output_html = args
        .output_html
        .unwrap_or_else(|| default_output(&args.input.source, "html"));
    let output_json = args
        .output_json
        .unwrap_or_else(|| default_output(&args.input.source, "json"));

    let report = validate_with_policy(&inputs.source, &inputs.spec, &inputs.policy);
    let issues = MappingExtractor::new(&inputs.spec, &report)
        .with_policy(&inputs.policy)
        .with_source(&inputs.source)
        .all_properties();

    let summary = ReportSummary {
        title: args.title,
        component: inputs.spec.name.clone(),
        source_path: args.input.source.display().to_string(),
        generated_at: now_utc_iso(),
        overall_match: report.overall_match,
        failed_categories: report.failed_categories(),
        issues,
        editable_properties: editable_properties(&inputs.source),
        structure: check_structure_with_policy(&inputs.source, &inputs.policy),
        report,
    };

    let json_content = serde_json::to_string_pretty(&summary)?;
    write_string(&output_json, &json_content)?;

    let html = render_html(&summary);
    write_string(&output_html, &html)?;

    ui.success(&format!("report JSON: {}", output_json.display()));
    ui.success(&format!("report HTML: {}", output_html.display()));

    if integration.should_emit_json() {
        println!(
            "{}",
            serde_json::json!({
                "command": "report",
                "status": "ok",
                "overall_match": summary.overall_match,
                "report_json": output_json.display().to_string(),
                "report_html": output_html.display().to_string(),
                "integration": integration,
            })
        );
    }

    Ok(())
}
