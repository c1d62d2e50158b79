// SPDX-License-Identifier: Apache-2.0
//! Review session state machine.
//!
//! ```text
//! Draft ─load/generate─▶ Generated ─validate─▶ Validated ─select─▶ MappingSelected
//!                                                  ▲                    │   ▲
//!                                      deselect all│             preview│   │back / select
//!                                                  │                    ▼   │
//!                                                  └──────────────── Previewed ─commit─▶ Saved
//! ```
//!
//! Any state returns to `Draft` through [`ReviewSession::reset`]. Previews
//! are scored by the same [`validate_with_policy`] call as the initial pass,
//! so the before and after scores are directly comparable.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ThemefitError};
use crate::extractor::MappingExtractor;
use crate::model::{ComplianceReport, ExtractedSpec, MappingIssue, SpecToThemeMappings};
use crate::mutator::{StructureCheck, apply_mappings_with_policy, check_structure_with_policy};
use crate::policy::EnginePolicy;
use crate::response::parse_generation_response;
use crate::util::{ensure_dir, now_utc_iso, slugify, write_string};
use crate::validator::validate_with_policy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Draft,
    Generated,
    Validated,
    MappingSelected,
    Previewed,
    Saved,
}

impl ReviewState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Validated => "validated",
            Self::MappingSelected => "mapping_selected",
            Self::Previewed => "previewed",
            Self::Saved => "saved",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutated text and its fresh score, held in memory until committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub text: String,
    pub mappings: SpecToThemeMappings,
    pub report: ComplianceReport,
    pub score_before: u8,
    pub score_after: u8,
    pub structure: StructureCheck,
}

impl Preview {
    #[must_use]
    pub fn score_delta(&self) -> i16 {
        i16::from(self.score_after) - i16::from(self.score_before)
    }
}

/// The black-box generative service.
pub trait ComponentGenerator {
    /// Raw text response for `prompt`.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// What gets handed to persistence on commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedComponent {
    pub name: String,
    pub saved_at: String,
    pub spec: ExtractedSpec,
    pub source: String,
    pub report: ComplianceReport,
    pub mappings: SpecToThemeMappings,
}

/// Persistence collaborator. Returns a location for the saved record.
pub trait ThemeStore {
    fn save(&mut self, component: &SavedComponent) -> Result<String>;
}

/// One pretty-printed JSON file per component, named after its slug.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ThemeStore for JsonDirStore {
    fn save(&mut self, component: &SavedComponent) -> Result<String> {
        ensure_dir(&self.root)?;
        let path = self.root.join(format!("{}.json", slugify(&component.name)));
        write_string(&path, &serde_json::to_string_pretty(component)?)?;
        Ok(path.display().to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub saved: Vec<SavedComponent>,
}

impl ThemeStore for MemoryStore {
    fn save(&mut self, component: &SavedComponent) -> Result<String> {
        self.saved.push(component.clone());
        Ok(format!("memory:{}", self.saved.len() - 1))
    }
}

/// One editing session over one spec and one source text.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    state: ReviewState,
    policy: EnginePolicy,
    advanced: bool,
    spec: Option<ExtractedSpec>,
    source: Option<String>,
    report: Option<ComplianceReport>,
    issues: Vec<MappingIssue>,
    selection: Vec<(String, String)>,
    preview: Option<Preview>,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSession {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(EnginePolicy::builtin().clone())
    }

    #[must_use]
    pub fn with_policy(policy: EnginePolicy) -> Self {
        Self {
            state: ReviewState::Draft,
            policy,
            advanced: false,
            spec: None,
            source: None,
            report: None,
            issues: Vec::new(),
            selection: Vec::new(),
            preview: None,
        }
    }

    /// Also offer optional edits for compliant properties.
    #[must_use]
    pub fn advanced(mut self, advanced: bool) -> Self {
        self.advanced = advanced;
        self
    }

    #[must_use]
    pub fn state(&self) -> ReviewState {
        self.state
    }

    #[must_use]
    pub fn spec(&self) -> Option<&ExtractedSpec> {
        self.spec.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn report(&self) -> Option<&ComplianceReport> {
        self.report.as_ref()
    }

    #[must_use]
    pub fn issues(&self) -> &[MappingIssue] {
        &self.issues
    }

    #[must_use]
    pub fn selection(&self) -> &[(String, String)] {
        &self.selection
    }

    #[must_use]
    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    fn require(&self, action: &str, allowed: &[ReviewState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ThemefitError::transition(self.state, action))
        }
    }

    fn move_to(&mut self, next: ReviewState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "review state changed");
        }
        self.state = next;
    }

    fn loaded(&self) -> Result<(&ExtractedSpec, &str)> {
        match (&self.spec, &self.source) {
            (Some(spec), Some(source)) => Ok((spec, source.as_str())),
            _ => Err(ThemefitError::transition(self.state, "use component")),
        }
    }

    /// Take a spec and source produced elsewhere.
    pub fn load_generated(&mut self, spec: ExtractedSpec, source: impl Into<String>) -> Result<()> {
        self.require("load a component", &[ReviewState::Draft])?;
        self.spec = Some(spec);
        self.source = Some(source.into());
        self.move_to(ReviewState::Generated);
        Ok(())
    }

    /// Ask the generative service and parse its response.
    pub fn generate_with(&mut self, generator: &dyn ComponentGenerator, prompt: &str) -> Result<()> {
        self.require("generate", &[ReviewState::Draft])?;
        let raw = generator.generate(prompt)?;
        let component = parse_generation_response(&raw)?;
        self.load_generated(component.spec, component.source)
    }

    /// Score the source and derive the selectable issues.
    pub fn validate(&mut self) -> Result<&ComplianceReport> {
        self.require("validate", &[ReviewState::Generated, ReviewState::Validated])?;
        let (spec, source) = self.loaded()?;
        let report = validate_with_policy(source, spec, &self.policy);
        let extractor = MappingExtractor::new(spec, &report)
            .with_policy(&self.policy)
            .with_source(source);
        let issues = if self.advanced {
            extractor.all_properties()
        } else {
            extractor.issues()
        };
        info!(
            overall_match = report.overall_match,
            issues = issues.len(),
            "component validated"
        );

        self.issues = issues;
        self.selection.clear();
        self.preview = None;
        self.move_to(ReviewState::Validated);
        Ok(&*self.report.insert(report))
    }

    /// Choose `value` for issue `id`. Re-selecting an issue replaces its
    /// value in place; an empty value means the suggested fix.
    pub fn select(&mut self, id: &str, value: &str) -> Result<()> {
        self.require(
            "select a mapping",
            &[
                ReviewState::Validated,
                ReviewState::MappingSelected,
                ReviewState::Previewed,
            ],
        )?;
        if !self.issues.iter().any(|issue| issue.id == id) {
            return Err(ThemefitError::UnknownIssue { id: id.to_string() });
        }
        match self.selection.iter_mut().find(|(selected, _)| selected == id) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.selection.push((id.to_string(), value.to_string())),
        }
        self.preview = None;
        self.move_to(ReviewState::MappingSelected);
        Ok(())
    }

    /// Drop issue `id` from the selection. Returns whether it was selected.
    pub fn deselect(&mut self, id: &str) -> Result<bool> {
        self.require(
            "deselect a mapping",
            &[ReviewState::MappingSelected, ReviewState::Previewed],
        )?;
        let before = self.selection.len();
        self.selection.retain(|(selected, _)| selected != id);
        let removed = self.selection.len() != before;
        self.preview = None;
        if self.selection.is_empty() {
            self.move_to(ReviewState::Validated);
        } else {
            self.move_to(ReviewState::MappingSelected);
        }
        Ok(removed)
    }

    /// Flip issue `id` in or out of the selection with its suggested fix.
    /// Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        if self.selection.iter().any(|(selected, _)| selected == id) {
            self.deselect(id)?;
            Ok(false)
        } else {
            self.select(id, "")?;
            Ok(true)
        }
    }

    /// The mapping set for the current selection, in selection order.
    pub fn mappings(&self) -> Result<SpecToThemeMappings> {
        SpecToThemeMappings::from_selection(
            &self.issues,
            self.selection
                .iter()
                .map(|(id, value)| (id.as_str(), value.as_str())),
        )
    }

    /// Apply the selection and re-score the result.
    pub fn preview_selection(&mut self) -> Result<&Preview> {
        self.require("preview", &[ReviewState::MappingSelected])?;
        let mappings = self.mappings()?;
        let (spec, source) = self.loaded()?;
        let score_before = self.report.as_ref().map_or(0, |report| report.overall_match);

        let text = apply_mappings_with_policy(source, &mappings, &self.policy);
        let report = validate_with_policy(&text, spec, &self.policy);
        let structure = check_structure_with_policy(&text, &self.policy);
        if !structure.valid {
            warn!(errors = ?structure.errors, "previewed source failed the structure check");
        }
        info!(
            score_before,
            score_after = report.overall_match,
            mappings = mappings.len(),
            "preview computed"
        );

        let preview = Preview {
            text,
            mappings,
            score_before,
            score_after: report.overall_match,
            report,
            structure,
        };
        self.move_to(ReviewState::Previewed);
        Ok(&*self.preview.insert(preview))
    }

    /// Leave the preview and keep editing the selection.
    pub fn back_to_selection(&mut self) -> Result<()> {
        self.require("return to selection", &[ReviewState::Previewed])?;
        self.preview = None;
        self.move_to(ReviewState::MappingSelected);
        Ok(())
    }

    /// Hand the previewed text to `store`. Returns the store's location.
    pub fn commit(&mut self, store: &mut dyn ThemeStore) -> Result<String> {
        self.require("commit", &[ReviewState::Previewed])?;
        let (spec, _) = self.loaded()?;
        let Some(preview) = &self.preview else {
            return Err(ThemefitError::transition(self.state, "commit"));
        };
        let component = SavedComponent {
            name: spec.name.clone(),
            saved_at: now_utc_iso(),
            spec: spec.clone(),
            source: preview.text.clone(),
            report: preview.report.clone(),
            mappings: preview.mappings.clone(),
        };
        let location = store.save(&component)?;
        info!(location = location.as_str(), "component saved");
        self.move_to(ReviewState::Saved);
        Ok(location)
    }

    /// Discard everything and start over.
    pub fn reset(&mut self) {
        self.spec = None;
        self.source = None;
        self.report = None;
        self.issues.clear();
        self.selection.clear();
        self.preview = None;
        self.move_to(ReviewState::Draft);
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::model::IssueType;
    use crate::validator::validate;

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

    fn spec() -> ExtractedSpec {
        let mut variants = IndexMap::new();
        variants.insert(
            "size".to_string(),
            vec!["small".to_string(), "base".to_string()],
        );
        ExtractedSpec {
            name: "Primary Button".to_string(),
            variants,
            spacing: vec!["Base height: 40px".to_string()],
            ..ExtractedSpec::default()
        }
    }

    fn validated() -> ReviewSession {
        let mut session = ReviewSession::new();
        session.load_generated(spec(), SOURCE).expect("load");
        session.validate().expect("validate");
        session
    }

    fn select_all(session: &mut ReviewSession) {
        let ids: Vec<String> = session.issues().iter().map(|i| i.id.clone()).collect();
        for id in ids {
            session.select(&id, "").expect("select");
        }
    }

    struct CannedGenerator(String);

    impl ComponentGenerator for CannedGenerator {
        fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn initial_validation_scores_and_lists_issues() {
        let session = validated();
        assert_eq!(session.state(), ReviewState::Validated);
        // 100 - 13 - 10 - 14 - 5 + 5
        assert_eq!(session.report().expect("report").overall_match, 63);
        let types: Vec<IssueType> = session.issues().iter().map(|i| i.issue_type).collect();
        assert_eq!(
            types,
            vec![
                IssueType::Variant,
                IssueType::Spacing,
                IssueType::Color,
                IssueType::Color
            ]
        );
    }

    #[test]
    fn full_loop_reaches_saved_with_improved_score() {
        let mut session = validated();
        select_all(&mut session);
        assert_eq!(session.state(), ReviewState::MappingSelected);

        let preview = session.preview_selection().expect("preview").clone();
        assert_eq!(preview.score_before, 63);
        assert_eq!(preview.score_after, 100, "{:#?}", preview.report);
        assert_eq!(preview.score_delta(), 37);
        assert!(preview.structure.valid, "{:?}", preview.structure.errors);
        assert!(preview.text.contains("inline-flex h-10 px-4 bg-primary"));
        assert!(preview.text.contains("base: \"\","));
        // Same entry point as the initial pass.
        assert_eq!(preview.report, validate(&preview.text, &spec()));

        let mut store = MemoryStore::default();
        let location = session.commit(&mut store).expect("commit");
        assert_eq!(location, "memory:0");
        assert_eq!(session.state(), ReviewState::Saved);
        assert_eq!(store.saved[0].source, preview.text);
        assert_eq!(store.saved[0].name, "Primary Button");
    }

    #[test]
    fn preview_back_edge_allows_iteration() {
        let mut session = validated();
        let spacing_id = session.issues()[1].id.clone();
        session.select(&spacing_id, "h-11").expect("select");
        let first = session.preview_selection().expect("preview").text.clone();
        assert!(first.contains("inline-flex h-11"));

        session.back_to_selection().expect("back");
        assert_eq!(session.state(), ReviewState::MappingSelected);
        assert!(session.preview().is_none());

        session.select(&spacing_id, "h-10").expect("reselect");
        assert_eq!(session.selection().len(), 1);
        let second = session.preview_selection().expect("preview").text.clone();
        assert!(second.contains("inline-flex h-10"));
    }

    #[test]
    fn toggling_everything_off_returns_to_validated() {
        let mut session = validated();
        let id = session.issues()[0].id.clone();
        assert!(session.toggle(&id).expect("on"));
        assert_eq!(session.state(), ReviewState::MappingSelected);
        assert!(!session.toggle(&id).expect("off"));
        assert_eq!(session.state(), ReviewState::Validated);
    }

    #[test]
    fn illegal_transitions_are_errors() {
        let mut session = ReviewSession::new();
        let error = session.validate().unwrap_err();
        assert_eq!(error.to_string(), "cannot validate while review is draft");
        assert_eq!(error.exit_code(), 3);

        let mut session = validated();
        assert!(matches!(
            session.preview_selection(),
            Err(ThemefitError::InvalidTransition { .. })
        ));
        assert!(session.commit(&mut MemoryStore::default()).is_err());
        assert!(session.load_generated(spec(), SOURCE).is_err());
    }

    #[test]
    fn unknown_issue_ids_are_rejected() {
        let mut session = validated();
        assert!(matches!(
            session.select("spacing-nope", ""),
            Err(ThemefitError::UnknownIssue { id }) if id == "spacing-nope"
        ));
        assert_eq!(session.state(), ReviewState::Validated);
    }

    #[test]
    fn reset_works_from_any_state() {
        let mut session = validated();
        select_all(&mut session);
        session.preview_selection().expect("preview");
        session.reset();
        assert_eq!(session.state(), ReviewState::Draft);
        assert!(session.source().is_none());
        assert!(session.issues().is_empty());
        session.load_generated(spec(), SOURCE).expect("reload");
    }

    #[test]
    fn generate_with_parses_service_response() {
        let code = serde_json::to_string(SOURCE).expect("encode source");
        let raw = format!(
            "```json\n{{\"spec\": {{\"name\": \"Button\", \"variants\": {{\"size\": [\"small\"]}}}}, \"code\": {code}}}\n```"
        );
        let mut session = ReviewSession::new();
        session
            .generate_with(&CannedGenerator(raw), "a button")
            .expect("generate");
        assert_eq!(session.state(), ReviewState::Generated);
        assert_eq!(session.source(), Some(SOURCE));
        assert_eq!(session.spec().expect("spec").name, "Button");
    }

    #[test]
    fn json_dir_store_writes_slugged_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = validated();
        select_all(&mut session);
        session.preview_selection().expect("preview");
        let mut store = JsonDirStore::new(temp.path().join("themes"));
        let location = session.commit(&mut store).expect("commit");
        assert!(location.ends_with("primary-button.json"));
        let saved: SavedComponent =
            serde_json::from_str(&std::fs::read_to_string(&location).expect("read")).expect("json");
        assert_eq!(saved.report.overall_match, 100);
    }
}
