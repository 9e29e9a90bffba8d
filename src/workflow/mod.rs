//! Story drafting workflow.
//!
//! Drafts the next story of a project from its epics and architecture
//! documents.
//!
//! ## Stages
//!
//! - `scan` - Finds the latest story and its status
//! - `Sequencer` - Decides which story comes next, suspending for a
//!   `Decision` when the latest story is incomplete or closes its epic
//! - `Classifier` / `StoryScope` - Pick the document categories and subjects
//! - `aggregate` - Collects cited facts from the architecture documents
//! - `StoryAssembler` - Builds the story artifact
//! - `validate` - Runs the draft checklist
//!
//! `StoryWorkflow` runs all of them in order.
//!
//! ## Storage
//!
//! - `DocumentStore` - Architecture documents and epic listings
//!   (`FsDocumentStore`, `InMemoryDocumentStore`)
//! - `StoryRepository` - Drafted stories (`FsStoryRepository`,
//!   `InMemoryStoryRepository`)

mod assembler;
mod checklist;
mod classify;
mod context;
mod documents;
mod error;
mod executor;
mod memory;
mod repository;
mod scanner;
mod sequencer;
mod store;
mod story;

pub use assembler::{plan_tasks, AssemblyError, StoryAssembler, StoryDraft};
pub use checklist::{validate, ChecklistReport, Rule, RuleResult, Ruleset};
pub use classify::{Classification, Classifier, StoryScope};
pub use context::{aggregate, relevant_content, AggregatedContext, MissingDocument};
pub use documents::{parse_epic, split_sections, FsDocumentStore};
pub use error::{WorkflowError, WorkflowResult};
pub use executor::{DraftOptions, DraftOutcome, DraftedStory, StoryWorkflow};
pub use memory::{InMemoryDocumentStore, InMemoryStoryRepository};
pub use repository::FsStoryRepository;
pub use scanner::{scan, Progress};
pub use sequencer::{
    Decision, DecisionPrompt, DecisionSource, ScriptedDecisions, SequenceError, Sequencer,
    SequencerState,
};
pub use store::{DocumentStore, EpicStory, StoreError, StoryRepository};
pub use story::{
    category_covered, ChangeLogEntry, CitedFact, DevAgentRecord, DocumentLocator,
    ParseStoryRefError, StatusError, StoryArtifact, StoryParseError, StoryRef, StoryStatus,
    StoryType, Task, NO_GUIDANCE,
};
