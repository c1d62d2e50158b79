// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod extractor;
pub mod model;
pub mod mutator;
pub mod policy;
pub mod report;
pub mod response;
pub mod review;
pub mod scanner;
pub mod tokens;
pub mod util;
pub mod validator;

pub use cli::run_from_env;
pub use error::{Result, ThemefitError};
pub use extractor::{MappingExtractor, extract_all_mappings, extract_issue_mappings};
pub use model::{
    ComplianceReport, EditableProperty, ExtractedSpec, IssueType, MappingIssue,
    SpecToThemeMappings,
};
pub use mutator::{apply_mappings, apply_mappings_with_policy, check_structure};
pub use policy::EnginePolicy;
pub use response::{GeneratedComponent, parse_generation_response};
pub use review::{ReviewSession, ReviewState};
pub use tokens::{CssProperty, pixels_to_token, token_to_pixels};
pub use validator::{validate, validate_with_policy};
