//! Story sequencer.
//!
//! Decides which story to draft next. Two situations need an outside
//! decision and suspend the sequencer until one is supplied:
//!
//! - the latest story is not `Done` (override or abort)
//! - the latest story closes its epic (advance, pick a story, or cancel)
//!
//! The sequencer never crosses an epic boundary on its own.

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use super::error::{WorkflowError, WorkflowResult};
use super::scanner::Progress;
use super::story::{StoryRef, StoryStatus};

/// Sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequencerState {
    /// Nothing decided yet
    Start,
    /// Latest story is incomplete; needs an explicit override
    AwaitingOverrideConfirmation { last: StoryRef, status: StoryStatus },
    /// Latest story closes its epic; needs an explicit choice
    AwaitingEpicAdvanceChoice { last: StoryRef },
    /// Next story decided
    Resolved(StoryRef),
    /// Caller chose not to draft anything
    Cancelled,
}

impl SequencerState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Cancelled)
    }

    /// The decided story, if resolved.
    pub fn resolved(&self) -> Option<StoryRef> {
        match self {
            Self::Resolved(reference) => Some(*reference),
            _ => None,
        }
    }

    /// What the caller must decide, if the sequencer is suspended.
    pub fn prompt(&self) -> Option<DecisionPrompt> {
        match *self {
            Self::AwaitingOverrideConfirmation { last, status } => {
                Some(DecisionPrompt::IncompleteStoryOverrideRequired { last, status })
            }
            Self::AwaitingEpicAdvanceChoice { last } => Some(DecisionPrompt::EpicComplete { last }),
            _ => None,
        }
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("starting"),
            Self::AwaitingOverrideConfirmation { last, .. } => {
                write!(f, "awaiting override confirmation for story {last}")
            }
            Self::AwaitingEpicAdvanceChoice { last } => {
                write!(f, "awaiting epic advance choice after story {last}")
            }
            Self::Resolved(reference) => write!(f, "resolved to story {reference}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A question put to the caller while the sequencer is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionPrompt {
    /// The latest story is not done.
    IncompleteStoryOverrideRequired { last: StoryRef, status: StoryStatus },
    /// The latest story was the last one of its epic.
    EpicComplete { last: StoryRef },
}

impl fmt::Display for DecisionPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteStoryOverrideRequired { last, status } => write!(
                f,
                "Story {last} is {status}, not Done. Draft story {} anyway?",
                last.next_in_epic()
            ),
            Self::EpicComplete { last } => write!(
                f,
                "Story {last} completes epic {}. \
                 Continue with epic {}, pick a specific story, or cancel?",
                last.epic(),
                last.epic() + 1
            ),
        }
    }
}

/// A decision resolving a suspended sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Draft the next story despite the incomplete one
    ConfirmOverride,
    /// Do not draft past the incomplete story
    DeclineOverride,
    /// Start the next epic
    NextEpic,
    /// Draft this exact story
    SpecificStory(StoryRef),
    /// Stop without drafting
    Cancel,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmOverride => f.write_str("confirm override"),
            Self::DeclineOverride => f.write_str("decline override"),
            Self::NextEpic => f.write_str("next epic"),
            Self::SpecificStory(reference) => write!(f, "specific story {reference}"),
            Self::Cancel => f.write_str("cancel"),
        }
    }
}

/// Sequencing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// The decision does not apply to the current state.
    #[error("Decision '{decision}' is not valid while {state}")]
    InvalidDecision { state: SequencerState, decision: Decision },

    /// A specific story would skip an entire epic.
    #[error("Story {requested} is beyond epic {max_epic}")]
    EpicOutOfRange { requested: StoryRef, max_epic: u32 },

    /// `start` was called twice.
    #[error("Sequencer already started")]
    AlreadyStarted,
}

/// State machine choosing the next story.
#[derive(Debug, Clone)]
pub struct Sequencer {
    state: SequencerState,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { state: SequencerState::Start }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Leave `Start` given the scanner result and the stories listed in the
    /// latest story's epic.
    pub fn start(
        &mut self,
        progress: Option<Progress>,
        epic_listing: &[StoryRef],
    ) -> Result<SequencerState, SequenceError> {
        if self.state != SequencerState::Start {
            return Err(SequenceError::AlreadyStarted);
        }

        self.state = match progress {
            None => SequencerState::Resolved(StoryRef::first()),
            Some((last, status)) if !status.is_done() => {
                SequencerState::AwaitingOverrideConfirmation { last, status }
            }
            Some((last, _)) => {
                let later_in_epic =
                    epic_listing.iter().any(|r| r.epic() == last.epic() && *r > last);
                if later_in_epic {
                    SequencerState::Resolved(last.next_in_epic())
                } else {
                    SequencerState::AwaitingEpicAdvanceChoice { last }
                }
            }
        };

        tracing::debug!(state = %self.state, "Sequencer started");
        Ok(self.state)
    }

    /// Apply a caller decision to a suspended sequencer.
    ///
    /// An invalid decision leaves the state unchanged.
    pub fn decide(&mut self, decision: Decision) -> Result<SequencerState, SequenceError> {
        let invalid = || SequenceError::InvalidDecision { state: self.state, decision };

        let next = match (self.state, decision) {
            (
                SequencerState::AwaitingOverrideConfirmation { last, .. },
                Decision::ConfirmOverride,
            ) => {
                SequencerState::Resolved(last.next_in_epic())
            }
            (SequencerState::AwaitingOverrideConfirmation { .. }, Decision::DeclineOverride) => {
                SequencerState::Cancelled
            }
            (SequencerState::AwaitingEpicAdvanceChoice { last }, Decision::NextEpic) => {
                SequencerState::Resolved(last.first_of_next_epic())
            }
            (
                SequencerState::AwaitingEpicAdvanceChoice { last },
                Decision::SpecificStory(requested),
            ) => {
                let max_epic = last.epic().saturating_add(1);
                if requested.epic() > max_epic {
                    return Err(SequenceError::EpicOutOfRange { requested, max_epic });
                }
                SequencerState::Resolved(requested)
            }
            (SequencerState::AwaitingEpicAdvanceChoice { .. }, Decision::Cancel) => {
                SequencerState::Cancelled
            }
            _ => return Err(invalid()),
        };

        tracing::debug!(%decision, state = %next, "Sequencer decision applied");
        self.state = next;
        Ok(next)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Supplies decisions for suspended sequencer states.
///
/// Implementations may block for as long as they need; timeouts are theirs
/// to impose.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    async fn decide(&self, prompt: &DecisionPrompt) -> WorkflowResult<Decision>;
}

/// Decision source replaying a fixed list of decisions.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    decisions: Mutex<VecDeque<Decision>>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self { decisions: Mutex::new(decisions.into_iter().collect()) }
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn decide(&self, prompt: &DecisionPrompt) -> WorkflowResult<Decision> {
        self.decisions
            .lock()
            .pop_front()
            .ok_or_else(|| WorkflowError::Decision(format!("no decision available for: {prompt}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(epic: u32, story: u32) -> StoryRef {
        StoryRef::new(epic, story).unwrap()
    }

    #[test]
    fn test_empty_repository_resolves_first_story() {
        let mut seq = Sequencer::new();
        assert_eq!(seq.start(None, &[]).unwrap(), SequencerState::Resolved(r(1, 1)));
        assert!(seq.state().is_terminal());
    }

    #[test]
    fn test_done_story_advances_within_epic() {
        let mut seq = Sequencer::new();
        let listing = [r(1, 1), r(1, 2), r(1, 3)];
        let state = seq.start(Some((r(1, 2), StoryStatus::Done)), &listing).unwrap();
        assert_eq!(state, SequencerState::Resolved(r(1, 3)));
    }

    #[test]
    fn test_incomplete_story_requires_override() {
        let mut seq = Sequencer::new();
        let state =
            seq.start(Some((r(2, 1), StoryStatus::InProgress)), &[r(2, 1), r(2, 2)]).unwrap();
        assert_eq!(
            state,
            SequencerState::AwaitingOverrideConfirmation {
                last: r(2, 1),
                status: StoryStatus::InProgress,
            }
        );
        assert_eq!(
            seq.decide(Decision::ConfirmOverride).unwrap(),
            SequencerState::Resolved(r(2, 2))
        );
    }

    #[test]
    fn test_declined_override_cancels() {
        let mut seq = Sequencer::new();
        seq.start(Some((r(2, 1), StoryStatus::Draft)), &[]).unwrap();
        assert_eq!(seq.decide(Decision::DeclineOverride).unwrap(), SequencerState::Cancelled);
    }

    #[test]
    fn test_epic_boundary_requires_choice() {
        let mut seq = Sequencer::new();
        let listing = [r(1, 1), r(1, 2), r(1, 3)];
        let state = seq.start(Some((r(1, 3), StoryStatus::Done)), &listing).unwrap();
        assert_eq!(state, SequencerState::AwaitingEpicAdvanceChoice { last: r(1, 3) });
        assert_eq!(seq.decide(Decision::NextEpic).unwrap(), SequencerState::Resolved(r(2, 1)));
    }

    #[test]
    fn test_specific_story_choice() {
        let mut seq = Sequencer::new();
        seq.start(Some((r(1, 3), StoryStatus::Done)), &[r(1, 3)]).unwrap();
        assert_eq!(
            seq.decide(Decision::SpecificStory(r(2, 4))).unwrap(),
            SequencerState::Resolved(r(2, 4))
        );
    }

    #[test]
    fn test_specific_story_cannot_skip_epic() {
        let mut seq = Sequencer::new();
        seq.start(Some((r(1, 3), StoryStatus::Done)), &[r(1, 3)]).unwrap();
        let err = seq.decide(Decision::SpecificStory(r(3, 1))).unwrap_err();
        assert_eq!(err, SequenceError::EpicOutOfRange { requested: r(3, 1), max_epic: 2 });
        assert_eq!(seq.state(), SequencerState::AwaitingEpicAdvanceChoice { last: r(1, 3) });
    }

    #[test]
    fn test_invalid_decision_keeps_state() {
        let mut seq = Sequencer::new();
        seq.start(Some((r(1, 1), StoryStatus::Approved)), &[]).unwrap();
        assert!(matches!(
            seq.decide(Decision::NextEpic),
            Err(SequenceError::InvalidDecision { .. })
        ));
        assert!(matches!(seq.state(), SequencerState::AwaitingOverrideConfirmation { .. }));
    }

    #[test]
    fn test_start_twice_fails() {
        let mut seq = Sequencer::new();
        seq.start(None, &[]).unwrap();
        assert_eq!(seq.start(None, &[]), Err(SequenceError::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_scripted_decisions_run_out() {
        let source = ScriptedDecisions::new([Decision::NextEpic]);
        let prompt = DecisionPrompt::EpicComplete { last: r(1, 1) };
        assert_eq!(source.decide(&prompt).await.unwrap(), Decision::NextEpic);
        assert!(source.decide(&prompt).await.is_err());
    }
}
