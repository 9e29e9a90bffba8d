//! Story drafting workflow.
//!
//! Runs the stages in order: scan the repository, sequence the next story,
//! classify and scope it, aggregate context, assemble, validate, write.

use std::sync::Arc;

use serde::Serialize;

use super::assembler::{StoryAssembler, StoryDraft};
use super::checklist::{validate, ChecklistReport, Ruleset};
use super::classify::{Classification, Classifier, StoryScope};
use super::context::{aggregate, AggregatedContext};
use super::error::{WorkflowError, WorkflowResult};
use super::scanner::{scan, Progress};
use super::sequencer::{DecisionSource, Sequencer, SequencerState};
use super::store::{DocumentStore, EpicStory, StoreError, StoryRepository};
use super::story::{StoryArtifact, StoryRef, StoryType};

/// Per-run drafting options.
#[derive(Debug, Clone)]
pub struct DraftOptions {
    /// Story types to consult in addition to the classified ones
    pub story_types: Vec<StoryType>,

    /// Extra scope terms
    pub scope_terms: Vec<String>,

    /// Assemble and validate, but do not write
    pub dry_run: bool,

    /// Change log date
    pub date: String,
}

impl Default for DraftOptions {
    fn default() -> Self {
        Self {
            story_types: Vec::new(),
            scope_terms: Vec::new(),
            dry_run: false,
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// A drafted story and its checklist.
#[derive(Debug, Clone, Serialize)]
pub struct DraftedStory {
    pub artifact: StoryArtifact,
    pub report: ChecklistReport,

    /// Where the story was written; `None` on a dry run
    pub location: Option<String>,
}

/// Result of a drafting run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DraftOutcome {
    Drafted(Box<DraftedStory>),
    Cancelled,
}

/// Orchestrates a drafting run over a document store and story repository.
pub struct StoryWorkflow {
    documents: Arc<dyn DocumentStore>,
    repository: Arc<dyn StoryRepository>,
    classifier: Classifier,
    assembler: StoryAssembler,
    ruleset: Ruleset,
}

impl StoryWorkflow {
    pub fn new(documents: Arc<dyn DocumentStore>, repository: Arc<dyn StoryRepository>) -> Self {
        Self {
            documents,
            repository,
            classifier: Classifier::new(),
            assembler: StoryAssembler::default(),
            ruleset: Ruleset::standard(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_assembler(mut self, assembler: StoryAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.ruleset = ruleset;
        self
    }

    /// Latest story and its status.
    pub async fn progress(&self) -> WorkflowResult<Option<Progress>> {
        scan(self.repository.as_ref()).await
    }

    /// Scan the repository and start a sequencer on the result. The
    /// sequencer is either resolved or waiting for a decision.
    pub async fn sequence(&self) -> WorkflowResult<(Option<Progress>, Sequencer)> {
        let progress = self.progress().await?;

        let listing = match progress {
            Some((last, status)) if status.is_done() => self.epic_listing(last.epic()).await?,
            _ => Vec::new(),
        };

        let mut sequencer = Sequencer::new();
        sequencer.start(progress, &listing)?;
        Ok((progress, sequencer))
    }

    /// Decide which story comes next, asking `decisions` whenever the
    /// sequencer needs a choice. `None` means the run was cancelled.
    pub async fn resolve_next(
        &self,
        decisions: &dyn DecisionSource,
    ) -> WorkflowResult<Option<StoryRef>> {
        let (_, mut sequencer) = self.sequence().await?;

        let mut state = sequencer.state();
        while let Some(prompt) = state.prompt() {
            tracing::info!(%prompt, "Waiting for decision");
            let decision = decisions.decide(&prompt).await?;
            state = sequencer.decide(decision)?;
        }

        match state {
            SequencerState::Resolved(reference) => {
                tracing::info!(story = %reference, "Next story resolved");
                Ok(Some(reference))
            }
            _ => {
                tracing::info!("Story sequencing cancelled");
                Ok(None)
            }
        }
    }

    /// Full run: resolve the next story and draft it.
    pub async fn draft_next(
        &self,
        decisions: &dyn DecisionSource,
        options: &DraftOptions,
    ) -> WorkflowResult<DraftOutcome> {
        match self.resolve_next(decisions).await? {
            Some(reference) => {
                let drafted = self.draft_story(reference, options).await?;
                Ok(DraftOutcome::Drafted(Box::new(drafted)))
            }
            None => Ok(DraftOutcome::Cancelled),
        }
    }

    /// Draft a specific story.
    pub async fn draft_story(
        &self,
        reference: StoryRef,
        options: &DraftOptions,
    ) -> WorkflowResult<DraftedStory> {
        let (story, context) = self.gather(reference, options).await?;

        if let Some(first) = context.missing.first() {
            for missing in &context.missing {
                tracing::error!(
                    story = %reference,
                    category = %missing.category,
                    document = %missing.document_id,
                    "Cannot draft without source document"
                );
            }
            return Err(first.to_error());
        }

        let draft = StoryDraft::from_epic(&story, context.categories, context.facts);
        let artifact = self.assembler.assemble(draft, &options.date)?;
        let report = validate(&artifact, &self.ruleset);

        let (passed, total) = report.score();
        tracing::info!(story = %reference, passed, total, "Checklist evaluated");

        let location = if options.dry_run {
            tracing::info!(story = %reference, "Dry run, story not written");
            None
        } else {
            Some(self.repository.write_artifact(&artifact).await?)
        };

        Ok(DraftedStory { artifact, report, location })
    }

    /// Load a story from its epic and aggregate its context, without
    /// assembling anything.
    pub async fn gather(
        &self,
        reference: StoryRef,
        options: &DraftOptions,
    ) -> WorkflowResult<(EpicStory, AggregatedContext)> {
        let story = self
            .epic_stories(reference.epic())
            .await?
            .into_iter()
            .find(|s| s.reference == reference)
            .ok_or(WorkflowError::StoryNotInEpic(reference))?;

        let text = story.requirement_text();
        let classified = self.classifier.classify(&text);
        let requested = options.story_types.iter().copied();
        let classification = Classification::from_types(classified.types().chain(requested));
        let scope = StoryScope::from_text(&text).extend(options.scope_terms.iter().cloned());
        if scope.is_empty() {
            tracing::warn!(
                story = %reference,
                "No scope terms found, Dev Notes will be placeholders"
            );
        }

        let context = aggregate(reference, &classification, &scope, self.documents.as_ref()).await?;
        Ok((story, context))
    }

    async fn epic_stories(&self, epic: u32) -> WorkflowResult<Vec<EpicStory>> {
        self.documents.list_epic_stories(epic).await.map_err(|e| match e {
            StoreError::EpicNotFound(_) => {
                WorkflowError::EpicUnavailable { epic, reason: "epic not found".to_string() }
            }
            other => WorkflowError::EpicUnavailable { epic, reason: other.to_string() },
        })
    }

    async fn epic_listing(&self, epic: u32) -> WorkflowResult<Vec<StoryRef>> {
        Ok(self.epic_stories(epic).await?.into_iter().map(|s| s.reference).collect())
    }
}
