// SPDX-License-Identifier: Apache-2.0
use std::fs;
use std::path::Path;

use chrono::Utc;
use fastapi_output::RichOutput;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlmodel_console::OutputMode as SqlModelOutputMode;

use crate::error::{Result, ThemefitError};

#[must_use]
pub fn now_utc_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputIntegration {
    pub fastapi_mode: String,
    pub fastapi_agent: bool,
    pub fastapi_ci: bool,
    pub fastapi_tty: bool,
    pub sqlmodel_mode: String,
    pub sqlmodel_agent: bool,
}

impl OutputIntegration {
    #[must_use]
    pub fn detect() -> Self {
        let fastapi_detection = fastapi_output::detect_environment();
        let fastapi_mode = fastapi_output::OutputMode::auto();
        let sqlmodel_mode = SqlModelOutputMode::detect();
        Self {
            fastapi_mode: fastapi_mode.as_str().to_string(),
            fastapi_agent: fastapi_detection.is_agent,
            fastapi_ci: fastapi_detection.is_ci,
            fastapi_tty: fastapi_detection.is_tty,
            sqlmodel_mode: sqlmodel_mode.as_str().to_string(),
            sqlmodel_agent: SqlModelOutputMode::is_agent_environment(),
        }
    }

    /// Forced machine output, used by `--json` flags and tests.
    #[must_use]
    pub fn json() -> Self {
        Self {
            fastapi_mode: "plain".to_string(),
            fastapi_agent: true,
            fastapi_ci: false,
            fastapi_tty: false,
            sqlmodel_mode: "json".to_string(),
            sqlmodel_agent: true,
        }
    }

    #[must_use]
    pub fn should_emit_json(&self) -> bool {
        self.sqlmodel_mode == "json"
    }

    /// Detected integration, switched to JSON when the caller asked for it.
    #[must_use]
    pub fn resolve(force_json: bool) -> Self {
        if force_json { Self::json() } else { Self::detect() }
    }
}

#[derive(Debug, Clone)]
pub struct CliOutput {
    inner: RichOutput,
    enabled: bool,
}

impl CliOutput {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: RichOutput::auto(),
            enabled,
        }
    }

    pub fn rule(&self, title: Option<&str>) {
        if self.enabled {
            self.inner.rule(title);
        }
    }

    pub fn info(&self, message: &str) {
        if self.enabled {
            self.inner.info(message);
        }
    }

    pub fn success(&self, message: &str) {
        if self.enabled {
            self.inner.success(message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.enabled {
            self.inner.warning(message);
        }
    }
}

#[must_use]
pub fn output_for(integration: &OutputIntegration) -> CliOutput {
    CliOutput::new(!integration.should_emit_json())
}

pub fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ThemefitError::MissingPath {
            path: path.to_path_buf(),
        })
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

pub fn read_string(path: &Path) -> Result<String> {
    ensure_exists(path)?;
    Ok(fs::read_to_string(path)?)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = read_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_string(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Lowercase, dash-separated, ASCII-only rendering of a display name.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "component".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn write_string_creates_parent_directories() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested/dir/out.txt");
        write_string(&path, "hello").expect("write");
        assert_eq!(read_string(&path).expect("read"), "hello");
    }

    #[test]
    fn read_string_reports_missing_path() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("nope.json");
        let error = read_string(&missing).unwrap_err();
        assert!(matches!(error, ThemefitError::MissingPath { path } if path == missing));
    }

    #[test]
    fn read_json_parses_documents() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("v.json");
        write_string(&path, r#"{"a": [1, 2]}"#).expect("write");
        let value: serde_json::Value = read_json(&path).expect("json");
        assert_eq!(value["a"][1], 2);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Primary Button!"), "primary-button");
        assert_eq!(slugify("  --Input  Field--"), "input-field");
        assert_eq!(slugify("###"), "component");
    }

    #[test]
    fn forced_json_integration_emits_json() {
        assert!(OutputIntegration::json().should_emit_json());
        assert!(OutputIntegration::resolve(true).should_emit_json());
    }
}
