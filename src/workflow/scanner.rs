//! Progress scanner.
//!
//! Finds the most advanced story in the repository.

use super::error::WorkflowResult;
use super::store::StoryRepository;
use super::story::{StoryRef, StoryStatus};

/// The highest story found and its status.
pub type Progress = (StoryRef, StoryStatus);

/// Return the story with the highest `(epic, story)` and its status, or
/// `None` for an empty repository.
pub async fn scan(repository: &dyn StoryRepository) -> WorkflowResult<Option<Progress>> {
    let stories = repository.list_story_refs().await?;
    let latest = stories.into_iter().max_by_key(|(reference, _)| *reference);

    match &latest {
        Some((reference, status)) => {
            tracing::debug!(story = %reference, status = %status, "Latest story");
        }
        None => tracing::debug!("Story repository is empty"),
    }

    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::memory::InMemoryStoryRepository;
    use crate::workflow::WorkflowError;

    fn r(epic: u32, story: u32) -> StoryRef {
        StoryRef::new(epic, story).unwrap()
    }

    #[tokio::test]
    async fn test_scan_empty() {
        let repo = InMemoryStoryRepository::new();
        assert_eq!(scan(&repo).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_picks_highest() {
        let repo = InMemoryStoryRepository::new()
            .with_story(r(1, 9), StoryStatus::Done)
            .with_story(r(2, 1), StoryStatus::InProgress)
            .with_story(r(1, 10), StoryStatus::Done);
        assert_eq!(scan(&repo).await.unwrap(), Some((r(2, 1), StoryStatus::InProgress)));
    }

    #[tokio::test]
    async fn test_scan_unavailable() {
        let repo = InMemoryStoryRepository::unavailable();
        let err = scan(&repo).await.unwrap_err();
        assert!(matches!(err, WorkflowError::RepositoryUnavailable { .. }));
    }
}
