//! Interfaces to the document store and the story repository.
//!
//! Both are external collaborators; the workflow only talks to them through
//! these traits. Filesystem and in-memory implementations live alongside.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::WorkflowResult;
use super::story::{StoryArtifact, StoryRef, StoryStatus, StoryType};

/// A story as listed in its epic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicStory {
    /// Story reference
    pub reference: StoryRef,

    /// Story title
    pub title: String,

    /// Free text describing the story (user story statement, notes)
    pub statement: String,

    /// Acceptance criteria, in order
    pub acceptance_criteria: Vec<String>,
}

impl EpicStory {
    /// All requirement text for the story, used for classification and scope.
    pub fn requirement_text(&self) -> String {
        let mut text = format!("{}\n{}\n", self.title, self.statement);
        for ac in &self.acceptance_criteria {
            text.push_str(ac);
            text.push('\n');
        }
        text
    }
}

/// Errors reported by a document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist at all.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// The document exists but has no such section.
    #[error("Section '{anchor}' not found in document '{document_id}'")]
    SectionNotFound { document_id: String, anchor: String },

    /// No listing exists for the epic.
    #[error("Epic {0} not found")]
    EpicNotFound(u32),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read access to architecture documents and epic listings.
///
/// A document is either monolithic or sharded into an index plus one child
/// per section; callers see the same section view either way.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents of the category's set that this store holds.
    async fn list_documents(&self, category: StoryType) -> Result<Vec<String>, StoreError>;

    /// Section anchors of a document, in document order.
    async fn list_sections(&self, document_id: &str) -> Result<Vec<String>, StoreError>;

    /// Text of one section, or of the whole document when `anchor` is `None`.
    async fn read_section(
        &self,
        document_id: &str,
        anchor: Option<&str>,
    ) -> Result<String, StoreError>;

    /// Whether the document is stored as index plus section files.
    async fn is_sharded(&self, document_id: &str) -> Result<bool, StoreError>;

    /// Stories listed in an epic, in order.
    async fn list_epic_stories(&self, epic: u32) -> Result<Vec<EpicStory>, StoreError>;
}

/// Storage for drafted stories.
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// Every stored story with its status.
    async fn list_story_refs(&self) -> WorkflowResult<Vec<(StoryRef, StoryStatus)>>;

    /// Persist a new artifact, returning where it was written.
    async fn write_artifact(&self, artifact: &StoryArtifact) -> WorkflowResult<String>;
}
