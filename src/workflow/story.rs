//! Story data model.
//!
//! Story references, statuses, story types, cited facts and the story
//! artifact itself, together with its markdown rendering and parsing.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder text used when a consulted category yields no content.
pub const NO_GUIDANCE: &str = "No specific guidance found in architecture docs";

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^# Story (\d+)\.(\d+):\s*(.*)$").expect("valid title regex"));
static AC_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s+(.*)$").expect("valid acceptance criteria regex"));
static AC_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(AC:\s*([\d,\s]+)\)$").expect("valid AC link regex"));
static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)\s*\[Source: ([^\]#]+?)(?:#([^\]]+))?\]$").expect("valid citation regex")
});

// ============================================================================
// Story references
// ============================================================================

/// Identifies a story by its epic and story ordinals, both starting at 1.
///
/// Ordered by epic first, then story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryRef {
    epic: u32,
    story: u32,
}

/// Error parsing a `StoryRef` from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid story reference '{0}' (expected <epic>.<story>, both >= 1)")]
pub struct ParseStoryRefError(pub String);

impl StoryRef {
    /// Create a reference. Returns `None` if either ordinal is zero.
    pub fn new(epic: u32, story: u32) -> Option<Self> {
        (epic >= 1 && story >= 1).then_some(Self { epic, story })
    }

    /// The very first story of a project.
    pub const fn first() -> Self {
        Self { epic: 1, story: 1 }
    }

    /// Epic ordinal.
    pub fn epic(self) -> u32 {
        self.epic
    }

    /// Story ordinal within the epic.
    pub fn story(self) -> u32 {
        self.story
    }

    /// The following story in the same epic.
    pub fn next_in_epic(self) -> Self {
        Self { epic: self.epic, story: self.story.saturating_add(1) }
    }

    /// The first story of the following epic.
    pub fn first_of_next_epic(self) -> Self {
        Self { epic: self.epic.saturating_add(1), story: 1 }
    }
}

impl fmt::Display for StoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.epic, self.story)
    }
}

impl FromStr for StoryRef {
    type Err = ParseStoryRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseStoryRefError(s.to_string());
        let (epic, story) = s.trim().split_once('.').ok_or_else(err)?;
        let epic = epic.trim().parse().map_err(|_| err())?;
        let story = story.trim().parse().map_err(|_| err())?;
        Self::new(epic, story).ok_or_else(err)
    }
}

impl TryFrom<String> for StoryRef {
    type Error = ParseStoryRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StoryRef> for String {
    fn from(value: StoryRef) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Status
// ============================================================================

/// Story status. Progresses Draft -> Approved -> InProgress -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoryStatus {
    Draft,
    Approved,
    InProgress,
    Done,
}

/// Errors for status tokens and transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Not one of the four persisted status tokens.
    #[error("unrecognized status token '{0}'")]
    UnknownToken(String),

    /// Status may only move forward.
    #[error("cannot move story status backward from {from} to {to}")]
    Backward { from: StoryStatus, to: StoryStatus },
}

impl StoryStatus {
    /// All statuses in progression order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Approved, Self::InProgress, Self::Done];

    /// The literal token persisted in artifacts.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Approved => "Approved",
            Self::InProgress => "InProgress",
            Self::Done => "Done",
        }
    }

    /// Whether the story is finished.
    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    /// Move forward to `next`. Staying in place is allowed.
    pub fn advance_to(self, next: Self) -> Result<Self, StatusError> {
        if next < self {
            return Err(StatusError::Backward { from: self, to: next });
        }
        Ok(next)
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().trim_start_matches("**").trim_end_matches("**").trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == token)
            .ok_or_else(|| StatusError::UnknownToken(token.to_string()))
    }
}

// ============================================================================
// Story types
// ============================================================================

/// Story classification. Declaration order is the fixed rendering order.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StoryType {
    Generic,
    Gameplay,
    UI,
    Backend,
    Graphics,
    Audio,
}

impl StoryType {
    /// All story types in rendering order.
    pub const ALL: [Self; 6] =
        [Self::Generic, Self::Gameplay, Self::UI, Self::Backend, Self::Graphics, Self::Audio];

    /// Display name, also used as the Dev Notes subsection heading.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "Generic",
            Self::Gameplay => "Gameplay",
            Self::UI => "UI",
            Self::Backend => "Backend",
            Self::Graphics => "Graphics",
            Self::Audio => "Audio",
        }
    }

    /// Architecture documents consulted for this story type.
    pub fn documents(self) -> &'static [&'static str] {
        match self {
            Self::Generic => {
                &["tech-stack", "project-structure", "coding-standards", "testing-conventions"]
            }
            Self::Gameplay => &[
                "systems-architecture",
                "component-details",
                "physics-config",
                "input-system",
                "state-machines",
                "data-models",
            ],
            Self::UI => {
                &["ui-architecture", "ui-components", "ui-state-management", "scene-management"]
            }
            Self::Backend => &[
                "data-models",
                "persistence",
                "save-system",
                "analytics",
                "multiplayer-architecture",
            ],
            Self::Graphics => &[
                "rendering-pipeline",
                "shader-guidelines",
                "sprite-management",
                "particle-systems",
            ],
            Self::Audio => &["audio-architecture", "audio-mixing", "sound-banks"],
        }
    }
}

impl fmt::Display for StoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().to_lowercase() == lower)
            .ok_or_else(|| format!("unknown story type '{}'", s.trim()))
    }
}

// ============================================================================
// Citations
// ============================================================================

/// Where a fact was read from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentLocator {
    /// Document identifier (e.g. `tech-stack`)
    pub document_id: String,

    /// Section anchor, or `None` for the whole document
    pub section_anchor: Option<String>,
}

impl DocumentLocator {
    /// Locator for a section of a document.
    pub fn new(document_id: impl Into<String>, section_anchor: Option<String>) -> Self {
        Self { document_id: document_id.into(), section_anchor }
    }

    /// Render as `[Source: {documentId}#{sectionAnchor}]`.
    pub fn citation(&self) -> String {
        match &self.section_anchor {
            Some(anchor) => format!("[Source: {}#{}]", self.document_id, anchor),
            None => format!("[Source: {}]", self.document_id),
        }
    }
}

/// A fact extracted from the architecture documents.
///
/// The source is absent only for the no-guidance placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedFact {
    category: StoryType,
    text: String,
    source: Option<DocumentLocator>,
}

impl CitedFact {
    /// A fact read from `source`.
    pub fn cited(category: StoryType, text: impl Into<String>, source: DocumentLocator) -> Self {
        Self { category, text: text.into(), source: Some(source) }
    }

    /// The placeholder emitted when a category has nothing relevant.
    pub fn no_guidance(category: StoryType) -> Self {
        Self { category, text: NO_GUIDANCE.to_string(), source: None }
    }

    pub fn category(&self) -> StoryType {
        self.category
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Option<&DocumentLocator> {
        self.source.as_ref()
    }

    /// Whether this is the no-guidance placeholder.
    pub fn is_no_guidance(&self) -> bool {
        self.source.is_none() && self.text == NO_GUIDANCE
    }

    /// Either cited, or exactly the placeholder text.
    pub fn is_well_formed(&self) -> bool {
        self.source.is_some() || self.text == NO_GUIDANCE
    }

    /// Render as a markdown list item ending in the citation.
    fn to_markdown(&self) -> String {
        let mut md = String::from("- ");
        for (i, line) in self.text.lines().enumerate() {
            if i > 0 {
                md.push_str("\n  ");
            }
            md.push_str(line);
        }
        if let Some(source) = &self.source {
            md.push(' ');
            md.push_str(&source.citation());
        }
        md.push('\n');
        md
    }

    fn from_markdown(category: StoryType, lines: &[String]) -> Self {
        let mut text = lines.join("\n");
        let last = lines.last().map(String::as_str).unwrap_or_default();
        if let Some(caps) = CITATION_RE.captures(last) {
            let head = caps.get(1).map_or("", |m| m.as_str());
            text = lines[..lines.len() - 1]
                .iter()
                .map(String::as_str)
                .chain([head])
                .collect::<Vec<_>>()
                .join("\n");
            let anchor = caps.get(3).map(|m| m.as_str().to_string());
            let locator = DocumentLocator::new(&caps[2], anchor);
            return Self::cited(category, text, locator);
        }
        Self { category, text, source: None }
    }
}

/// Whether a category has at least one fact, counting facts read from any
/// of its documents even when they are filed under another category.
pub fn category_covered(category: StoryType, facts: &[CitedFact]) -> bool {
    facts.iter().any(|fact| {
        fact.category == category
            || fact
                .source
                .as_ref()
                .is_some_and(|s| category.documents().contains(&s.document_id.as_str()))
    })
}

// ============================================================================
// Story artifact
// ============================================================================

/// A task in the story's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// What to do
    pub description: String,

    /// Linked acceptance criteria (1-based)
    pub acceptance_criteria: Vec<usize>,

    /// Subtasks
    pub subtasks: Vec<String>,

    /// Whether the task is checked off
    pub done: bool,
}

impl Task {
    /// Create an unchecked task linked to the given criteria.
    pub fn new(description: impl Into<String>, acceptance_criteria: Vec<usize>) -> Self {
        Self {
            description: description.into(),
            acceptance_criteria,
            subtasks: Vec::new(),
            done: false,
        }
    }

    /// Add subtasks.
    pub fn with_subtasks(mut self, subtasks: Vec<String>) -> Self {
        self.subtasks = subtasks;
        self
    }

    fn to_markdown(&self) -> String {
        let mut md = format!("- [{}] {}", checkbox(self.done), self.description);
        if !self.acceptance_criteria.is_empty() {
            let links: Vec<String> =
                self.acceptance_criteria.iter().map(ToString::to_string).collect();
            md.push_str(&format!(" (AC: {})", links.join(", ")));
        }
        md.push('\n');
        for subtask in &self.subtasks {
            md.push_str(&format!("  - [ ] {subtask}\n"));
        }
        md
    }
}

/// One row of the change log table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub date: String,
    pub version: String,
    pub description: String,
    pub author: String,
}

/// Notes appended by whoever implements the story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevAgentRecord {
    pub agent_model: Option<String>,
    pub debug_log: Vec<String>,
    pub completion_notes: Vec<String>,
    pub file_list: Vec<String>,
}

/// Errors reading a rendered story back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryParseError {
    /// The `# Story E.S: Title` header is missing.
    #[error("story header '# Story <epic>.<story>: <title>' not found")]
    MissingHeader,

    /// The status section is missing or empty.
    #[error("story has no status")]
    MissingStatus,

    /// Bad status token.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Dev Notes heading that is not a story type.
    #[error("{0}")]
    UnknownCategory(String),
}

/// A drafted story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryArtifact {
    reference: StoryRef,
    status: StoryStatus,
    title: String,
    statement: String,
    acceptance_criteria: Vec<String>,
    tasks: Vec<Task>,
    categories: Vec<StoryType>,
    facts: Vec<CitedFact>,
    change_log: Vec<ChangeLogEntry>,
    dev_record: DevAgentRecord,
}

impl StoryArtifact {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        reference: StoryRef,
        title: String,
        statement: String,
        acceptance_criteria: Vec<String>,
        tasks: Vec<Task>,
        categories: Vec<StoryType>,
        facts: Vec<CitedFact>,
        change_log: Vec<ChangeLogEntry>,
    ) -> Self {
        Self {
            reference,
            status: StoryStatus::Draft,
            title,
            statement,
            acceptance_criteria,
            tasks,
            categories,
            facts,
            change_log,
            dev_record: DevAgentRecord::default(),
        }
    }

    pub fn reference(&self) -> StoryRef {
        self.reference
    }

    pub fn status(&self) -> StoryStatus {
        self.status
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn acceptance_criteria(&self) -> &[String] {
        &self.acceptance_criteria
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Story types consulted while gathering context.
    pub fn categories(&self) -> &[StoryType] {
        &self.categories
    }

    pub fn facts(&self) -> &[CitedFact] {
        &self.facts
    }

    pub fn change_log(&self) -> &[ChangeLogEntry] {
        &self.change_log
    }

    pub fn dev_record(&self) -> &DevAgentRecord {
        &self.dev_record
    }

    /// Facts filed under one category, in order.
    pub fn facts_for(&self, category: StoryType) -> impl Iterator<Item = &CitedFact> {
        self.facts.iter().filter(move |f| f.category == category)
    }

    /// Move the status forward.
    pub fn advance_status(&mut self, next: StoryStatus) -> Result<(), StatusError> {
        self.status = self.status.advance_to(next)?;
        Ok(())
    }

    /// Record the model that implemented the story.
    pub fn set_agent_model(&mut self, model: impl Into<String>) {
        self.dev_record.agent_model = Some(model.into());
    }

    pub fn append_debug_log(&mut self, entry: impl Into<String>) {
        self.dev_record.debug_log.push(entry.into());
    }

    pub fn append_completion_note(&mut self, note: impl Into<String>) {
        self.dev_record.completion_notes.push(note.into());
    }

    pub fn append_file(&mut self, path: impl Into<String>) {
        self.dev_record.file_list.push(path.into());
    }

    /// Render the full story document.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# Story {}: {}\n\n", self.reference, self.title);

        md.push_str("## Status\n\n");
        md.push_str(&format!("{}\n\n", self.status));

        md.push_str("## Story\n\n");
        if self.statement.is_empty() {
            md.push_str("_No story statement provided._\n\n");
        } else {
            md.push_str(&format!("{}\n\n", self.statement));
        }

        md.push_str("## Acceptance Criteria\n\n");
        if self.acceptance_criteria.is_empty() {
            md.push_str("_No acceptance criteria defined._\n");
        }
        for (i, ac) in self.acceptance_criteria.iter().enumerate() {
            md.push_str(&format!("{}. {ac}\n", i + 1));
        }
        md.push('\n');

        md.push_str("## Tasks / Subtasks\n\n");
        if self.tasks.is_empty() {
            md.push_str("_No tasks defined._\n");
        }
        for task in &self.tasks {
            md.push_str(&task.to_markdown());
        }
        md.push('\n');

        md.push_str("## Dev Notes\n\n");
        if self.categories.is_empty() {
            md.push_str("_No technical context gathered._\n\n");
        } else {
            let names: Vec<&str> = self.categories.iter().map(|c| c.as_str()).collect();
            md.push_str(&format!("**Story Types:** {}\n\n", names.join(", ")));
        }
        for category in &self.categories {
            md.push_str(&format!("### {category}\n\n"));
            let mut any = false;
            for fact in self.facts_for(*category) {
                md.push_str(&fact.to_markdown());
                any = true;
            }
            if !any {
                if category_covered(*category, &self.facts) {
                    md.push_str("_Shared sources are cited under an earlier category._\n");
                } else {
                    md.push_str("_No facts recorded._\n");
                }
            }
            md.push('\n');
        }

        md.push_str("## Change Log\n\n");
        md.push_str("| Date | Version | Description | Author |\n");
        md.push_str("|------|---------|-------------|--------|\n");
        for entry in &self.change_log {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                entry.date, entry.version, entry.description, entry.author
            ));
        }
        md.push('\n');

        md.push_str("## Dev Agent Record\n\n");
        md.push_str("### Agent Model Used\n\n");
        match &self.dev_record.agent_model {
            Some(model) => md.push_str(&format!("{model}\n\n")),
            None => md.push_str("_Not yet recorded._\n\n"),
        }
        push_list(&mut md, "Debug Log References", &self.dev_record.debug_log);
        push_list(&mut md, "Completion Notes List", &self.dev_record.completion_notes);
        push_list(&mut md, "File List", &self.dev_record.file_list);

        md.truncate(md.trim_end().len());
        md.push('\n');
        md
    }

    /// Read a rendered story back.
    pub fn parse(content: &str) -> Result<Self, StoryParseError> {
        let mut lines = content.lines();
        let header = lines.by_ref().map(str::trim_end).find(|l| !l.trim().is_empty());
        let caps = header.and_then(|h| TITLE_RE.captures(h)).ok_or(StoryParseError::MissingHeader)?;
        let reference = StoryRef::new(caps[1].parse().unwrap_or(0), caps[2].parse().unwrap_or(0))
            .ok_or(StoryParseError::MissingHeader)?;
        let title = caps[3].trim().to_string();

        let mut status = None;
        let mut statement: Vec<&str> = Vec::new();
        let mut acceptance_criteria = Vec::new();
        let mut tasks: Vec<Task> = Vec::new();
        let mut categories = Vec::new();
        let mut facts = Vec::new();
        let mut change_log = Vec::new();
        let mut dev_record = DevAgentRecord::default();

        let mut section = String::new();
        let mut subsection = String::new();
        let mut category: Option<StoryType> = None;
        let mut fact_lines: Vec<String> = Vec::new();

        let flush_fact =
            |category: Option<StoryType>, lines: &mut Vec<String>, facts: &mut Vec<CitedFact>| {
                if let (Some(cat), false) = (category, lines.is_empty()) {
                    facts.push(CitedFact::from_markdown(cat, lines));
                }
                lines.clear();
            };

        for raw in lines {
            let line = raw.trim_end();

            if let Some(heading) = line.strip_prefix("## ") {
                flush_fact(category, &mut fact_lines, &mut facts);
                section = heading.trim().to_lowercase();
                subsection.clear();
                category = None;
                continue;
            }
            if let Some(heading) = line.strip_prefix("### ") {
                flush_fact(category, &mut fact_lines, &mut facts);
                subsection = heading.trim().to_string();
                if section == "dev notes" {
                    category = Some(subsection.parse().map_err(StoryParseError::UnknownCategory)?);
                }
                continue;
            }

            match section.as_str() {
                "status" => {
                    if status.is_none() && !line.trim().is_empty() {
                        status = Some(line.parse::<StoryStatus>()?);
                    }
                }
                "story" => {
                    if !is_placeholder(line) {
                        statement.push(line);
                    }
                }
                "acceptance criteria" => {
                    if let Some(caps) = AC_ITEM_RE.captures(line) {
                        acceptance_criteria.push(caps[1].to_string());
                    }
                }
                "tasks / subtasks" => {
                    if let Some(rest) = line.strip_prefix("  - [") {
                        if let Some(task) = tasks.last_mut() {
                            task.subtasks.push(rest.get(3..).unwrap_or_default().to_string());
                        }
                    } else if let Some(rest) = line.strip_prefix("- [") {
                        tasks.push(parse_task(rest));
                    }
                }
                "dev notes" => {
                    if let Some(types) = line.strip_prefix("**Story Types:** ") {
                        for name in types.split(',') {
                            let category =
                                name.parse().map_err(StoryParseError::UnknownCategory)?;
                            categories.push(category);
                        }
                    } else if category.is_some() {
                        if let Some(first) = line.strip_prefix("- ") {
                            flush_fact(category, &mut fact_lines, &mut facts);
                            fact_lines.push(first.to_string());
                        } else if let Some(cont) = raw.strip_prefix("  ") {
                            if !fact_lines.is_empty() {
                                fact_lines.push(cont.trim_end().to_string());
                            }
                        }
                    }
                }
                "change log" => {
                    if let Some(entry) = parse_change_row(line) {
                        change_log.push(entry);
                    }
                }
                "dev agent record" => {
                    if is_placeholder(line) || line.trim().is_empty() {
                        continue;
                    }
                    let item = line.strip_prefix("- ").map(str::to_string);
                    match subsection.as_str() {
                        "Agent Model Used" => {
                            dev_record.agent_model = Some(line.trim().to_string());
                        }
                        "Debug Log References" => dev_record.debug_log.extend(item),
                        "Completion Notes List" => dev_record.completion_notes.extend(item),
                        "File List" => dev_record.file_list.extend(item),
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        flush_fact(category, &mut fact_lines, &mut facts);

        Ok(Self {
            reference,
            status: status.ok_or(StoryParseError::MissingStatus)?,
            title,
            statement: statement.join("\n").trim().to_string(),
            acceptance_criteria,
            tasks,
            categories,
            facts,
            change_log,
            dev_record,
        })
    }
}

fn checkbox(done: bool) -> char {
    if done {
        'x'
    } else {
        ' '
    }
}

/// Filler lines written for empty sections.
const PLACEHOLDERS: [&str; 8] = [
    "_No story statement provided._",
    "_No acceptance criteria defined._",
    "_No tasks defined._",
    "_No technical context gathered._",
    "_Shared sources are cited under an earlier category._",
    "_No facts recorded._",
    "_Not yet recorded._",
    "_None._",
];

fn is_placeholder(line: &str) -> bool {
    PLACEHOLDERS.contains(&line.trim())
}

fn push_list(md: &mut String, heading: &str, items: &[String]) {
    md.push_str(&format!("### {heading}\n\n"));
    if items.is_empty() {
        md.push_str("_None._\n");
    }
    for item in items {
        md.push_str(&format!("- {item}\n"));
    }
    md.push('\n');
}

/// Parse the part of a task line after `- [`.
fn parse_task(rest: &str) -> Task {
    let done = rest.starts_with('x') || rest.starts_with('X');
    let mut description = rest.get(3..).unwrap_or_default().to_string();
    let mut links = Vec::new();
    if let Some(caps) = AC_LINK_RE.captures(&description) {
        links = caps[1].split(',').filter_map(|n| n.trim().parse().ok()).collect();
        let start = caps.get(0).map_or(description.len(), |m| m.start());
        description.truncate(start);
    }
    Task { description, acceptance_criteria: links, subtasks: Vec::new(), done }
}

fn parse_change_row(line: &str) -> Option<ChangeLogEntry> {
    let line = line.trim();
    if !line.starts_with('|') || line.starts_with("|--") || line.starts_with("| Date ") {
        return None;
    }
    let cells: Vec<&str> = line.trim_matches('|').split('|').map(str::trim).collect();
    if cells.len() != 4 {
        return None;
    }
    Some(ChangeLogEntry {
        date: cells[0].to_string(),
        version: cells[1].to_string(),
        description: cells[2].to_string(),
        author: cells[3].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoryArtifact {
        StoryArtifact::new(
            StoryRef::new(1, 2).unwrap(),
            "Player Movement".to_string(),
            "As a player, I want to move `PlayerController` so that I can explore.".to_string(),
            vec!["Player moves with WASD".to_string(), "Movement respects collisions".to_string()],
            vec![
                Task::new("Implement input handling", vec![1])
                    .with_subtasks(vec!["Map WASD actions".to_string()]),
                Task::new("Write tests", vec![1, 2]),
            ],
            vec![StoryType::Generic, StoryType::Gameplay, StoryType::Audio],
            vec![
                CitedFact::cited(
                    StoryType::Generic,
                    "Use GDScript 2.0 for `PlayerController`.",
                    DocumentLocator::new("tech-stack", Some("languages".to_string())),
                ),
                CitedFact::cited(
                    StoryType::Gameplay,
                    "```gdscript\nfunc _physics_process(delta):\n    move_and_slide()\n```",
                    DocumentLocator::new("physics-config", None),
                ),
                CitedFact::no_guidance(StoryType::Audio),
            ],
            vec![ChangeLogEntry {
                date: "2026-01-05".to_string(),
                version: "1.0".to_string(),
                description: "Initial draft".to_string(),
                author: "storyforge".to_string(),
            }],
        )
    }

    #[test]
    fn test_story_ref_order() {
        let a = StoryRef::new(1, 9).unwrap();
        let b = StoryRef::new(2, 1).unwrap();
        let c = StoryRef::new(2, 3).unwrap();
        assert!(a < b && b < c);
        assert_eq!(StoryRef::new(0, 1), None);
        assert_eq!(StoryRef::new(1, 0), None);
    }

    #[test]
    fn test_story_ref_parse() {
        assert_eq!("3.14".parse::<StoryRef>().unwrap(), StoryRef::new(3, 14).unwrap());
        assert!("3".parse::<StoryRef>().is_err());
        assert!("0.1".parse::<StoryRef>().is_err());
        assert!("a.b".parse::<StoryRef>().is_err());
    }

    #[test]
    fn test_status_tokens() {
        for status in StoryStatus::ALL {
            assert_eq!(status.as_str().parse::<StoryStatus>().unwrap(), status);
        }
        assert_eq!("**Done**".parse::<StoryStatus>().unwrap(), StoryStatus::Done);
        assert!("In Progress".parse::<StoryStatus>().is_err());
    }

    #[test]
    fn test_status_only_advances() {
        assert_eq!(StoryStatus::Draft.advance_to(StoryStatus::Approved), Ok(StoryStatus::Approved));
        assert!(StoryStatus::Done.advance_to(StoryStatus::InProgress).is_err());
    }

    #[test]
    fn test_artifact_status_and_dev_record() {
        let mut artifact = sample();
        assert!(artifact.advance_status(StoryStatus::Approved).is_ok());
        assert_eq!(artifact.status(), StoryStatus::Approved);
        assert!(artifact.advance_status(StoryStatus::Draft).is_err());
        assert_eq!(artifact.status(), StoryStatus::Approved);

        artifact.set_agent_model("test-model");
        artifact.append_debug_log("collision check failed once");
        artifact.append_debug_log("fixed layer mask");
        let record = artifact.dev_record();
        assert_eq!(record.agent_model.as_deref(), Some("test-model"));
        assert_eq!(record.debug_log.len(), 2);
    }

    #[test]
    fn test_citation_rendering() {
        let with_anchor = DocumentLocator::new("tech-stack", Some("languages".to_string()));
        assert_eq!(with_anchor.citation(), "[Source: tech-stack#languages]");
        let without = DocumentLocator::new("tech-stack", None);
        assert_eq!(without.citation(), "[Source: tech-stack]");
    }

    #[test]
    fn test_no_guidance_fact() {
        let fact = CitedFact::no_guidance(StoryType::Audio);
        assert!(fact.is_no_guidance());
        assert!(fact.is_well_formed());
        assert_eq!(fact.text(), "No specific guidance found in architecture docs");
    }

    #[test]
    fn test_category_documents_overlap() {
        assert!(StoryType::Gameplay.documents().contains(&"data-models"));
        assert!(StoryType::Backend.documents().contains(&"data-models"));
        assert_eq!(StoryType::Generic.documents().len(), 4);
    }

    #[test]
    fn test_render_contains_sections() {
        let md = sample().to_markdown();
        assert!(md.starts_with("# Story 1.2: Player Movement\n"));
        assert!(md.contains("## Status\n\nDraft\n"));
        assert!(md.contains("- [ ] Write tests (AC: 1, 2)\n"));
        assert!(md.contains("[Source: tech-stack#languages]"));
        assert!(md.contains("    move_and_slide()\n  ``` [Source: physics-config]"));
        assert!(md.contains("### Audio\n\n- No specific guidance found in architecture docs\n"));
        assert!(md.contains("| 2026-01-05 | 1.0 | Initial draft | storyforge |"));
        assert!(md.contains("### File List\n\n_None._"));
    }

    #[test]
    fn test_render_parse_roundtrip() {
        let mut artifact = sample();
        artifact.set_agent_model("test-model");
        artifact.append_completion_note("Movement implemented");
        artifact.append_file("scripts/player_controller.gd");

        let parsed = StoryArtifact::parse(&artifact.to_markdown()).unwrap();
        assert_eq!(parsed, artifact);
    }

    #[test]
    fn test_parse_keeps_italic_statement_lines() {
        let md =
            "# Story 1.1: X\n\n## Status\n\nDraft\n\n## Story\n\nAs a player.\n_Emphasis note_\n";
        let artifact = StoryArtifact::parse(md).unwrap();
        assert_eq!(artifact.statement(), "As a player.\n_Emphasis note_");

        let mut empty = sample();
        empty.statement = String::new();
        let parsed = StoryArtifact::parse(&empty.to_markdown()).unwrap();
        assert_eq!(parsed.statement(), "");
    }

    #[test]
    fn test_parse_requires_header() {
        assert_eq!(
            StoryArtifact::parse("## Status\n\nDraft\n"),
            Err(StoryParseError::MissingHeader)
        );
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        let err = StoryArtifact::parse("# Story 1.1: X\n\n## Status\n\nFinished\n").unwrap_err();
        assert!(matches!(err, StoryParseError::Status(StatusError::UnknownToken(_))));
    }

    #[test]
    fn test_uncited_text_parses_without_source() {
        let md = "# Story 1.1: X\n\n## Status\n\nDraft\n\n## Dev Notes\n\n\
                  **Story Types:** Generic\n\n### Generic\n\n- Made up claim\n";
        let artifact = StoryArtifact::parse(md).unwrap();
        assert_eq!(artifact.facts().len(), 1);
        assert!(!artifact.facts()[0].is_well_formed());
    }
}
