// SPDX-License-Identifier: Apache-2.0
use clap::{Parser, Subcommand};

use crate::commands::{
    ApplyArgs, ConvertArgs, IssuesArgs, ParseResponseArgs, PropertiesArgs, ReviewArgs,
    ValidateArgs, run_apply, run_convert, run_issues, run_parse_response, run_properties,
    run_review, run_validate,
};
use crate::error::Result;
use crate::report::{ReportArgs, run_report};

#[derive(Debug, Parser)]
#[command(
    name = "themefit",
    about = "Design-token compliance scoring and source rewriting for generated UI components",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score a component against its extracted spec.
    Validate(ValidateArgs),

    /// List selectable mapping issues as JSON.
    Issues(IssuesArgs),

    /// Rewrite a source file with a mapping set.
    Apply(ApplyArgs),

    /// Validate, select fixes, preview and optionally save.
    Review(ReviewArgs),

    /// Convert between pixel values and utility tokens.
    Convert(ConvertArgs),

    /// Split a generative-service response into spec and source files.
    #[command(name = "parse-response")]
    ParseResponse(ParseResponseArgs),

    /// List editable utility occurrences in a source file.
    Properties(PropertiesArgs),

    /// Generate HTML and JSON compliance reports.
    Report(ReportArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate(args) => run_validate(args),
        Commands::Issues(args) => run_issues(args),
        Commands::Apply(args) => run_apply(args),
        Commands::Review(args) => run_review(args),
        Commands::Convert(args) => run_convert(args),
        Commands::ParseResponse(args) => run_parse_response(args),
        Commands::Properties(args) => run_properties(args),
        Commands::Report(args) => run_report(args),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use clap::Parser;
    use tempfile::tempdir;

    use super::{Cli, Commands, run};
    use crate::commands::{ConvertArgs, EngineInputArgs, ParseResponseArgs, PropertiesArgs};
    use crate::error::ThemefitError;
    use crate::report::ReportArgs;

    #[test]
    fn convert_command_dispatches_successfully() {
        let result = run(Cli {
            command: Commands::Convert(ConvertArgs {
                property: "gap".to_string(),
                pixels: None,
                token: Some("gap-4".to_string()),
                json: true,
            }),
        });
        assert!(result.is_ok());
    }

    #[test]
    fn convert_command_rejects_unknown_property() {
        let error = run(Cli {
            command: Commands::Convert(ConvertArgs {
                property: "elevation".to_string(),
                pixels: Some(4),
                token: None,
                json: true,
            }),
        })
        .expect_err("unknown property should fail");
        assert!(
            matches!(error, ThemefitError::InvalidArgument { message } if message.contains("elevation"))
        );
    }

    #[test]
    fn report_command_dispatches_missing_path_error() {
        let result = run(Cli {
            command: Commands::Report(ReportArgs {
                input: EngineInputArgs {
                    spec: PathBuf::from("/tmp/themefit/does-not-exist.json"),
                    source: PathBuf::from("/tmp/themefit/does-not-exist.tsx"),
                    policy: None,
                },
                output_html: None,
                output_json: None,
                title: "x".to_string(),
                json: true,
            }),
        });

        let error = result.expect_err("missing spec should fail");
        assert!(matches!(
            error,
            ThemefitError::MissingPath { path }
                if path == Path::new("/tmp/themefit/does-not-exist.json")
        ));
    }

    #[test]
    fn parse_response_command_reports_every_strategy() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("response.txt");
        std::fs::write(&input, "I could not build that component.").expect("write");

        let error = run(Cli {
            command: Commands::ParseResponse(ParseResponseArgs {
                input,
                out_dir: temp.path().join("out"),
                json: true,
            }),
        })
        .expect_err("unparseable response should fail");
        assert!(matches!(error, ThemefitError::ResponseParse { attempts } if attempts.len() == 3));
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn properties_command_dispatches_successfully() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("card.tsx");
        std::fs::write(&source, "<div className=\"p-4 gap-2\" />").expect("write");

        let result = run(Cli {
            command: Commands::Properties(PropertiesArgs { source }),
        });
        assert!(result.is_ok());
    }

    #[test]
    fn argument_parsing_accepts_repeated_selections() {
        let cli = Cli::try_parse_from([
            "themefit",
            "review",
            "--spec",
            "spec.json",
            "--source",
            "button.tsx",
            "--select",
            "spacing-abc=h-10",
            "--select",
            "color-def=",
            "--json",
        ])
        .expect("parse");
        match cli.command {
            Commands::Review(args) => {
                assert_eq!(args.select, vec!["spacing-abc=h-10", "color-def="]);
                assert!(args.json);
                assert!(!args.save);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn argument_parsing_rejects_pixels_with_token() {
        let result = Cli::try_parse_from([
            "themefit", "convert", "--property", "height", "--pixels", "40", "--token", "h-10",
        ]);
        assert!(result.is_err());
    }
}
