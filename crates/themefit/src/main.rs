// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("THEMEFIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let integration = themefit::util::OutputIntegration::detect();
    if let Err(error) = themefit::run_from_env() {
        if integration.should_emit_json() {
            eprintln!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": error.to_string(),
                    "exit_code": error.exit_code(),
                    "integration": integration,
                })
            );
        } else {
            eprintln!("{error}");
        }
        std::process::exit(error.exit_code());
    }
}
