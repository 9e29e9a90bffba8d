//! Filesystem-backed story repository.
//!
//! Stories are stored as `<epic>.<story>.story.md` in a single directory.

use std::path::PathBuf;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncWriteExt;

use super::error::{WorkflowError, WorkflowResult};
use super::store::StoryRepository;
use super::story::{StoryArtifact, StoryRef, StoryStatus};

static STORY_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\.story\.md$").expect("valid story file regex"));

/// Story repository over a directory of markdown files.
#[derive(Debug, Clone)]
pub struct FsStoryRepository {
    dir: PathBuf,
}

impl FsStoryRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File name for a story.
    pub fn file_name(reference: StoryRef) -> String {
        format!("{reference}.story.md")
    }

    /// Full path for a story.
    pub fn path_for(&self, reference: StoryRef) -> PathBuf {
        self.dir.join(Self::file_name(reference))
    }

    fn unavailable(&self, reason: impl ToString) -> WorkflowError {
        WorkflowError::RepositoryUnavailable {
            location: self.dir.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl StoryRepository for FsStoryRepository {
    async fn list_story_refs(&self) -> WorkflowResult<Vec<(StoryRef, StoryStatus)>> {
        if !self.dir.is_dir() {
            return Err(self.unavailable("stories directory does not exist"));
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| self.unavailable(e))?;
        let mut stories = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| self.unavailable(e))? {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(caps) = STORY_FILE_RE.captures(&name) else { continue };
            let Some(reference) =
                StoryRef::new(caps[1].parse().unwrap_or(0), caps[2].parse().unwrap_or(0))
            else {
                continue;
            };

            let path = entry.path();
            let content =
                tokio::fs::read_to_string(&path).await.map_err(|e| self.unavailable(e))?;
            let artifact = StoryArtifact::parse(&content).map_err(|e| {
                WorkflowError::MalformedStory {
                    location: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            tracing::debug!(story = %reference, status = %artifact.status(), "Found story");
            stories.push((reference, artifact.status()));
        }

        stories.sort_by_key(|(r, _)| *r);
        Ok(stories)
    }

    async fn write_artifact(&self, artifact: &StoryArtifact) -> WorkflowResult<String> {
        let path = self.path_for(artifact.reference());
        let location = path.display().to_string();
        let write_failed = |reason: String| WorkflowError::WriteFailed {
            story: artifact.reference(),
            location: location.clone(),
            reason,
        };

        if !self.dir.is_dir() {
            return Err(write_failed("stories directory does not exist".to_string()));
        }

        // create_new keeps an existing story from being replaced
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let written = match file.write_all(artifact.to_markdown().as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                tracing::warn!(
                    path = %location,
                    error = %cleanup,
                    "Failed to remove partial story"
                );
            }
            return Err(write_failed(e.to_string()));
        }

        tracing::info!(story = %artifact.reference(), path = %location, "Wrote story");
        Ok(location)
    }
}
