//! Workflow error types.

use thiserror::Error;

use super::assembler::AssemblyError;
use super::sequencer::SequenceError;
use super::story::{StoryRef, StoryType};

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that abort a story drafting run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The story repository cannot be listed.
    #[error("Story repository unavailable at {location}: {reason}")]
    RepositoryUnavailable { location: String, reason: String },

    /// A document required by a category does not exist.
    #[error("Missing source document '{document_id}' required for {category} stories")]
    MissingSourceDocument { category: StoryType, document_id: String },

    /// A document exists but could not be read.
    #[error("Failed to read document '{document_id}': {reason}")]
    DocumentRead { document_id: String, reason: String },

    /// The epic listing could not be read.
    #[error("Epic {epic} unavailable: {reason}")]
    EpicUnavailable { epic: u32, reason: String },

    /// The resolved story is not listed in its epic.
    #[error("Story {0} is not defined in its epic")]
    StoryNotInEpic(StoryRef),

    /// A stored story could not be parsed.
    #[error("Malformed story at {location}: {reason}")]
    MalformedStory { location: String, reason: String },

    /// Writing the artifact failed.
    #[error("Failed to write story {story} to {location}: {reason}")]
    WriteFailed { story: StoryRef, location: String, reason: String },

    /// Invalid sequencing decision.
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// The assembled artifact broke a structural invariant.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// No decision could be obtained for a suspended sequencer.
    #[error("Decision unavailable: {0}")]
    Decision(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
