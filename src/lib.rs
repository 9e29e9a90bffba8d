//! # Storyforge
//!
//! Drafts the next development story of a project from its epics and
//! architecture documents.
//!
//! Storyforge finds the latest story, decides which one comes next, gathers
//! the architecture guidance relevant to it with a citation for every fact,
//! and writes a story file ready for implementation.
//!
//! ## Features
//!
//! - **Sequencing**: Never silently skips past an incomplete story or the end of an epic
//! - **Cited Dev Notes**: Every fact points back to `[Source: doc#section]`
//! - **Sharded Docs**: Reads both single-file and sharded architecture documents
//! - **Checklist**: Validates each draft against a fixed set of rules
//!
//! ## Quick Start
//!
//! ```bash
//! # Set up docs/ and a local config
//! storyforge init
//!
//! # Draft the next story
//! storyforge draft
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::format_push_string)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::trivially_copy_pass_by_ref)]

pub mod core;
pub mod workflow;

// Re-export commonly used types
pub use core::Config;
pub use workflow::{
    DraftOptions, DraftOutcome, StoryArtifact, StoryRef, StoryStatus, StoryType, StoryWorkflow,
    WorkflowError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "storyforge";
