//! In-memory document store and story repository.
//!
//! Useful for embedding the workflow in other tools and for tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{WorkflowError, WorkflowResult};
use super::store::{DocumentStore, EpicStory, StoreError, StoryRepository};
use super::story::{StoryArtifact, StoryRef, StoryStatus, StoryType};

#[derive(Debug, Clone)]
struct MemoryDocument {
    sharded: bool,
    index: String,
    sections: Vec<(String, String)>,
}

/// Document store holding everything in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: BTreeMap<String, MemoryDocument>,
    epics: BTreeMap<u32, Vec<EpicStory>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a monolithic document made of `(anchor, text)` sections.
    pub fn with_document(mut self, id: &str, sections: &[(&str, &str)]) -> Self {
        self.insert(id, false, String::new(), sections);
        self
    }

    /// Add a sharded document with an index and `(anchor, text)` children.
    pub fn with_sharded_document(
        mut self,
        id: &str,
        index: &str,
        sections: &[(&str, &str)],
    ) -> Self {
        self.insert(id, true, index.to_string(), sections);
        self
    }

    /// Add an epic listing.
    pub fn with_epic(mut self, epic: u32, stories: Vec<EpicStory>) -> Self {
        self.epics.insert(epic, stories);
        self
    }

    fn insert(&mut self, id: &str, sharded: bool, index: String, sections: &[(&str, &str)]) {
        let sections =
            sections.iter().map(|(a, t)| ((*a).to_string(), (*t).to_string())).collect();
        self.documents.insert(id.to_string(), MemoryDocument { sharded, index, sections });
    }

    fn document(&self, id: &str) -> Result<&MemoryDocument, StoreError> {
        self.documents.get(id).ok_or_else(|| StoreError::DocumentNotFound(id.to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_documents(&self, category: StoryType) -> Result<Vec<String>, StoreError> {
        Ok(category
            .documents()
            .iter()
            .filter(|id| self.documents.contains_key(**id))
            .map(|id| (*id).to_string())
            .collect())
    }

    async fn list_sections(&self, document_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.document(document_id)?.sections.iter().map(|(a, _)| a.clone()).collect())
    }

    async fn read_section(
        &self,
        document_id: &str,
        anchor: Option<&str>,
    ) -> Result<String, StoreError> {
        let doc = self.document(document_id)?;
        match anchor {
            None if doc.sharded => Ok(doc.index.clone()),
            None => Ok(doc.sections.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join("\n")),
            Some(anchor) => doc
                .sections
                .iter()
                .find(|(a, _)| a == anchor)
                .map(|(_, t)| t.clone())
                .ok_or_else(|| StoreError::SectionNotFound {
                    document_id: document_id.to_string(),
                    anchor: anchor.to_string(),
                }),
        }
    }

    async fn is_sharded(&self, document_id: &str) -> Result<bool, StoreError> {
        Ok(self.document(document_id)?.sharded)
    }

    async fn list_epic_stories(&self, epic: u32) -> Result<Vec<EpicStory>, StoreError> {
        self.epics.get(&epic).cloned().ok_or(StoreError::EpicNotFound(epic))
    }
}

/// Story repository holding everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryStoryRepository {
    stories: Mutex<BTreeMap<StoryRef, StoryStatus>>,
    written: Mutex<Vec<StoryArtifact>>,
    unavailable: bool,
}

impl InMemoryStoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository that fails every listing.
    pub fn unavailable() -> Self {
        Self { unavailable: true, ..Self::default() }
    }

    /// Seed an existing story.
    pub fn with_story(self, reference: StoryRef, status: StoryStatus) -> Self {
        self.stories.lock().insert(reference, status);
        self
    }

    /// Artifacts written so far.
    pub fn written(&self) -> Vec<StoryArtifact> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl StoryRepository for InMemoryStoryRepository {
    async fn list_story_refs(&self) -> WorkflowResult<Vec<(StoryRef, StoryStatus)>> {
        if self.unavailable {
            return Err(WorkflowError::RepositoryUnavailable {
                location: "memory".to_string(),
                reason: "repository marked unavailable".to_string(),
            });
        }
        Ok(self.stories.lock().iter().map(|(r, s)| (*r, *s)).collect())
    }

    async fn write_artifact(&self, artifact: &StoryArtifact) -> WorkflowResult<String> {
        let location = format!("memory://{}", artifact.reference());
        let mut stories = self.stories.lock();
        if stories.contains_key(&artifact.reference()) {
            return Err(WorkflowError::WriteFailed {
                story: artifact.reference(),
                location,
                reason: "story already exists".to_string(),
            });
        }
        stories.insert(artifact.reference(), artifact.status());
        self.written.lock().push(artifact.clone());
        Ok(location)
    }
}
