// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThemefitError>;

#[derive(Debug, Error)]
pub enum ThemefitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("required path does not exist: {path}")]
    MissingPath { path: PathBuf },

    #[error("policy validation failed: {message}")]
    Policy { message: String },

    #[error("could not parse generation response (tried: {})", .attempts.join(", "))]
    ResponseParse { attempts: Vec<String> },

    #[error("cannot {action} while review is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("unknown mapping issue: {id}")]
    UnknownIssue { id: String },

    #[error("{message}")]
    Exit { code: i32, message: String },
}

impl ThemefitError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exit { code, .. } => *code,
            Self::InvalidArgument { .. } | Self::MissingPath { .. } => 2,
            Self::InvalidTransition { .. } | Self::UnknownIssue { .. } => 3,
            _ => 1,
        }
    }

    #[must_use]
    pub fn exit(code: i32, message: impl Into<String>) -> Self {
        Self::Exit {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transition(from: impl ToString, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }
}
