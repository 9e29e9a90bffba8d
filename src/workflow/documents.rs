//! Filesystem-backed document store.
//!
//! Architecture documents live in one directory, either as `<id>.md`
//! (monolithic, `##` headings are sections) or as `<id>/` holding an
//! `index.md` plus one `<anchor>.md` per section. Epics live in another
//! directory as `epic-<n>.md` with `## Story <n>.<m>: <Title>` headings.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use super::store::{DocumentStore, EpicStory, StoreError};
use super::story::{StoryRef, StoryType};

static STORY_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^##\s+Story\s+(\d+)\.(\d+):?\s*(.*)$").expect("valid story heading regex")
});

/// Document store reading markdown files from disk.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    /// Architecture documents directory
    architecture_dir: PathBuf,

    /// Epic listings directory
    epics_dir: PathBuf,
}

impl FsDocumentStore {
    /// Create a store over the given directories.
    pub fn new(architecture_dir: impl Into<PathBuf>, epics_dir: impl Into<PathBuf>) -> Self {
        Self { architecture_dir: architecture_dir.into(), epics_dir: epics_dir.into() }
    }

    fn monolithic_path(&self, document_id: &str) -> PathBuf {
        self.architecture_dir.join(format!("{document_id}.md"))
    }

    fn shard_dir(&self, document_id: &str) -> PathBuf {
        self.architecture_dir.join(document_id)
    }

    fn epic_path(&self, epic: u32) -> PathBuf {
        self.epics_dir.join(format!("epic-{epic}.md"))
    }

    fn layout(&self, document_id: &str) -> Result<Layout, StoreError> {
        let shard_dir = self.shard_dir(document_id);
        if shard_dir.join("index.md").is_file() {
            return Ok(Layout::Sharded(shard_dir));
        }
        let path = self.monolithic_path(document_id);
        if path.is_file() {
            return Ok(Layout::Monolithic(path));
        }
        Err(StoreError::DocumentNotFound(document_id.to_string()))
    }
}

enum Layout {
    Monolithic(PathBuf),
    Sharded(PathBuf),
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list_documents(&self, category: StoryType) -> Result<Vec<String>, StoreError> {
        Ok(category
            .documents()
            .iter()
            .filter(|id| self.layout(id).is_ok())
            .map(|id| (*id).to_string())
            .collect())
    }

    async fn list_sections(&self, document_id: &str) -> Result<Vec<String>, StoreError> {
        match self.layout(document_id)? {
            Layout::Monolithic(path) => {
                let content = tokio::fs::read_to_string(&path).await?;
                Ok(split_sections(&content).into_iter().map(|(anchor, _)| anchor).collect())
            }
            Layout::Sharded(dir) => Ok(shard_anchors(&dir)),
        }
    }

    async fn read_section(
        &self,
        document_id: &str,
        anchor: Option<&str>,
    ) -> Result<String, StoreError> {
        let not_found = |anchor: &str| StoreError::SectionNotFound {
            document_id: document_id.to_string(),
            anchor: anchor.to_string(),
        };

        match (self.layout(document_id)?, anchor) {
            (Layout::Monolithic(path), None) => Ok(tokio::fs::read_to_string(&path).await?),
            (Layout::Monolithic(path), Some(anchor)) => {
                let content = tokio::fs::read_to_string(&path).await?;
                split_sections(&content)
                    .into_iter()
                    .find(|(a, _)| a == anchor)
                    .map(|(_, body)| body)
                    .ok_or_else(|| not_found(anchor))
            }
            (Layout::Sharded(dir), None) => {
                Ok(tokio::fs::read_to_string(dir.join("index.md")).await?)
            }
            (Layout::Sharded(dir), Some(anchor)) => {
                if !shard_anchors(&dir).iter().any(|a| a == anchor) {
                    return Err(not_found(anchor));
                }
                Ok(tokio::fs::read_to_string(dir.join(format!("{anchor}.md"))).await?)
            }
        }
    }

    async fn is_sharded(&self, document_id: &str) -> Result<bool, StoreError> {
        Ok(matches!(self.layout(document_id)?, Layout::Sharded(_)))
    }

    async fn list_epic_stories(&self, epic: u32) -> Result<Vec<EpicStory>, StoreError> {
        let path = self.epic_path(epic);
        if !path.is_file() {
            return Err(StoreError::EpicNotFound(epic));
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(parse_epic(epic, &content))
    }
}

/// Section files of a sharded document, sorted by name.
fn shard_anchors(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            if path.extension().and_then(|x| x.to_str()) != Some("md") {
                return None;
            }
            let stem = path.file_stem()?.to_str()?;
            (stem != "index").then(|| stem.to_string())
        })
        .collect()
}

/// Split a monolithic document into `(anchor, body)` pairs on `##` headings.
///
/// Headings inside fenced code are ignored. Repeated anchors get a numeric
/// suffix, as markdown renderers do. Text before the first `##` heading
/// becomes its own section, anchored on the `#` title (or `overview` when
/// there is none). A document with no `##` headings has no sections.
pub fn split_sections(content: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut title: Option<String> = None;
    let mut preamble = String::new();
    let mut in_fence = false;

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }

        if !in_fence && line.starts_with("## ") {
            if sections.is_empty() && !preamble.trim().is_empty() {
                let anchor = title.as_deref().map(slugify).filter(|a| !a.is_empty());
                sections.push((anchor.unwrap_or_else(|| "overview".to_string()), preamble.clone()));
            }
            let base = slugify(line.trim_start_matches("## "));
            let mut anchor = base.clone();
            let mut n = 1;
            while sections.iter().any(|(a, _)| *a == anchor) {
                anchor = format!("{base}-{n}");
                n += 1;
            }
            sections.push((anchor, String::new()));
            continue;
        }

        match sections.last_mut() {
            Some((_, body)) => {
                body.push_str(line);
                body.push('\n');
            }
            None if !in_fence && title.is_none() && line.starts_with("# ") => {
                title = Some(line.trim_start_matches("# ").to_string());
            }
            None => {
                preamble.push_str(line);
                preamble.push('\n');
            }
        }
    }

    sections
}

/// Parse the stories of an epic listing.
pub fn parse_epic(epic: u32, content: &str) -> Vec<EpicStory> {
    let mut stories = Vec::new();
    let mut current: Option<EpicStory> = None;
    let mut statement: Vec<String> = Vec::new();
    let mut in_acceptance = false;

    let mut finish = |story: Option<EpicStory>, statement: &mut Vec<String>| {
        if let Some(mut story) = story {
            story.statement = statement.join("\n").trim().to_string();
            if story.reference.epic() == epic {
                stories.push(story);
            }
        }
        statement.clear();
    };

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("## ") {
            finish(current.take(), &mut statement);
            in_acceptance = false;
            if let Some(caps) = STORY_HEADING_RE.captures(trimmed) {
                let reference = StoryRef::new(
                    caps[1].parse().unwrap_or(0),
                    caps[2].parse().unwrap_or(0),
                );
                current = reference.map(|reference| EpicStory {
                    reference,
                    title: caps[3].trim().to_string(),
                    statement: String::new(),
                    acceptance_criteria: Vec::new(),
                });
            }
            continue;
        }

        let Some(story) = current.as_mut() else { continue };

        if let Some(heading) = trimmed.strip_prefix("### ") {
            in_acceptance = heading.to_lowercase().contains("acceptance criteria");
            continue;
        }

        if in_acceptance {
            if let Some(item) = parse_list_item(trimmed) {
                story.acceptance_criteria.push(item);
            }
        } else {
            statement.push(line.trim_end().to_string());
        }
    }
    finish(current.take(), &mut statement);

    stories
}

// Helper functions

pub(crate) fn parse_list_item(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with("- ") {
        Some(line.trim_start_matches("- ").trim_start_matches("[ ] ").to_string())
    } else if line.starts_with("* ") {
        Some(line.trim_start_matches("* ").trim_start_matches("[ ] ").to_string())
    } else if line.chars().next().is_some_and(|c| c.is_ascii_digit()) && line.contains(". ") {
        line.split_once(". ").map(|(_, rest)| rest.to_string())
    } else {
        None
    }
}

pub(crate) fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
