//! Context aggregation.
//!
//! Gathers the architecture content relevant to a story. Each consulted
//! category maps to a fixed set of documents; every section of those
//! documents is filtered down to the paragraphs that mention the story's
//! scope, and whatever survives is cited back to its document and section.
//!
//! Documents are fetched concurrently and merged in a fixed order, so the
//! same inputs always produce the same facts.

use futures::future::join_all;
use serde::Serialize;

use super::classify::{Classification, StoryScope};
use super::error::{WorkflowError, WorkflowResult};
use super::store::{DocumentStore, StoreError};
use super::story::{category_covered, CitedFact, DocumentLocator, StoryRef, StoryType};

/// A document a category needs but the store does not have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDocument {
    pub category: StoryType,
    pub document_id: String,
}

impl MissingDocument {
    pub fn to_error(&self) -> WorkflowError {
        WorkflowError::MissingSourceDocument {
            category: self.category,
            document_id: self.document_id.clone(),
        }
    }
}

/// Result of aggregating context for one story.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedContext {
    /// Categories consulted, in fixed order
    pub categories: Vec<StoryType>,

    /// Facts grouped by category, in fixed order
    pub facts: Vec<CitedFact>,

    /// Required documents that do not exist
    pub missing: Vec<MissingDocument>,
}

impl AggregatedContext {
    /// Whether every required document was found.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Missing documents for one category.
    pub fn missing_for(&self, category: StoryType) -> impl Iterator<Item = &MissingDocument> {
        self.missing.iter().filter(move |m| m.category == category)
    }
}

/// Relevant content of one section.
struct SectionFacts {
    anchor: Option<String>,
    text: String,
}

enum Fetched {
    Found(Vec<SectionFacts>),
    Missing,
}

/// Gather cited facts for a story.
pub async fn aggregate(
    story_ref: StoryRef,
    classification: &Classification,
    scope: &StoryScope,
    store: &dyn DocumentStore,
) -> WorkflowResult<AggregatedContext> {
    let categories = classification.to_vec();

    // Which documents to fetch, and which category each one is filed under
    let mut planned: Vec<(StoryType, &'static str)> = Vec::new();
    let mut missing = Vec::new();

    for &category in &categories {
        let present = store
            .list_documents(category)
            .await
            .map_err(|e| read_error(category.as_str(), e))?;
        for &document_id in category.documents() {
            if !present.iter().any(|p| p == document_id) {
                tracing::warn!(
                    story = %story_ref,
                    %category,
                    document = document_id,
                    "Missing source document"
                );
                missing.push(MissingDocument { category, document_id: document_id.to_string() });
            } else if !planned.iter().any(|(_, d)| *d == document_id) {
                planned.push((category, document_id));
            }
        }
    }

    let fetched =
        join_all(planned.iter().map(|(_, document_id)| fetch_document(store, document_id, scope)))
            .await;

    let mut by_category: Vec<(StoryType, Vec<CitedFact>)> =
        categories.iter().map(|c| (*c, Vec::new())).collect();

    for ((category, document_id), result) in planned.iter().zip(fetched) {
        let sections = match result? {
            Fetched::Found(sections) => sections,
            Fetched::Missing => {
                missing.push(MissingDocument {
                    category: *category,
                    document_id: document_id.to_string(),
                });
                continue;
            }
        };
        if let Some((_, facts)) = by_category.iter_mut().find(|(c, _)| c == category) {
            facts.extend(sections.into_iter().map(|s| {
                CitedFact::cited(*category, s.text, DocumentLocator::new(*document_id, s.anchor))
            }));
        }
    }

    let gathered: Vec<CitedFact> =
        by_category.iter().flat_map(|(_, f)| f.iter().cloned()).collect();
    for (category, facts) in &mut by_category {
        let blocked = missing.iter().any(|m| m.category == *category);
        if !blocked && !category_covered(*category, &gathered) {
            facts.push(CitedFact::no_guidance(*category));
        }
    }

    let facts: Vec<CitedFact> = by_category.into_iter().flat_map(|(_, f)| f).collect();
    tracing::info!(
        story = %story_ref,
        facts = facts.len(),
        missing = missing.len(),
        "Aggregated story context"
    );

    Ok(AggregatedContext { categories, facts, missing })
}

async fn fetch_document(
    store: &dyn DocumentStore,
    document_id: &str,
    scope: &StoryScope,
) -> WorkflowResult<Fetched> {
    match fetch_sections(store, document_id, scope).await {
        Ok(sections) => Ok(Fetched::Found(sections)),
        Err(StoreError::DocumentNotFound(_)) => Ok(Fetched::Missing),
        Err(e) => Err(read_error(document_id, e)),
    }
}

async fn fetch_sections(
    store: &dyn DocumentStore,
    document_id: &str,
    scope: &StoryScope,
) -> Result<Vec<SectionFacts>, StoreError> {
    let sharded = store.is_sharded(document_id).await?;
    let anchors = store.list_sections(document_id).await?;
    tracing::debug!(document = document_id, sharded, sections = anchors.len(), "Reading document");

    let mut sections = Vec::new();
    if anchors.is_empty() {
        let text = store.read_section(document_id, None).await?;
        if let Some(text) = relevant_content(&text, scope) {
            sections.push(SectionFacts { anchor: None, text });
        }
        return Ok(sections);
    }

    for anchor in anchors {
        let text = store.read_section(document_id, Some(&anchor)).await?;
        if let Some(text) = relevant_content(&text, scope) {
            sections.push(SectionFacts { anchor: Some(anchor), text });
        }
    }
    Ok(sections)
}

fn read_error(document_id: &str, error: StoreError) -> WorkflowError {
    WorkflowError::DocumentRead { document_id: document_id.to_string(), reason: error.to_string() }
}

/// Keep only the blocks of `text` that mention the scope.
///
/// Blocks are paragraphs, with fenced code kept whole. Headings and blank
/// lines are dropped.
pub fn relevant_content(text: &str, scope: &StoryScope) -> Option<String> {
    let kept: Vec<String> =
        split_blocks(text).into_iter().filter(|block| scope.matches(block)).collect();
    (!kept.is_empty()).then(|| kept.join("\n"))
}

fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    let flush = |current: &mut Vec<&str>, blocks: &mut Vec<String>| {
        if !current.is_empty() {
            blocks.push(current.join("\n"));
            current.clear();
        }
    };

    for line in text.lines() {
        let line = line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            if in_fence {
                current.push(line);
                flush(&mut current, &mut blocks);
            } else {
                flush(&mut current, &mut blocks);
                current.push(line);
            }
            in_fence = !in_fence;
            continue;
        }

        if in_fence {
            if !trimmed.is_empty() {
                current.push(line);
            }
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            flush(&mut current, &mut blocks);
            continue;
        }

        current.push(line);
    }
    flush(&mut current, &mut blocks);

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::memory::InMemoryDocumentStore;
    use crate::workflow::story::NO_GUIDANCE;

    fn scope() -> StoryScope {
        StoryScope::with_terms(["PlayerController".to_string()])
    }

    fn generic_store() -> InMemoryDocumentStore {
        InMemoryDocumentStore::new()
            .with_document(
                "tech-stack",
                &[(
                    "languages",
                    "GDScript everywhere.\n\n`PlayerController` uses static typing.\n",
                )],
            )
            .with_document("project-structure", &[("layout", "Scenes live in scenes/.\n")])
            .with_sharded_document(
                "coding-standards",
                "# Coding Standards\n",
                &[("naming", "PlayerController methods use snake_case.\n")],
            )
            .with_document("testing-conventions", &[("gut", "Use GUT for unit tests.\n")])
    }

    #[test]
    fn test_relevant_content_filters_paragraphs() {
        let text = "Intro.\n\n### Details\n\n\
                    The PlayerController moves.\nIt uses physics.\n\nOther text.\n";
        assert_eq!(
            relevant_content(text, &scope()).as_deref(),
            Some("The PlayerController moves.\nIt uses physics.")
        );
    }

    #[test]
    fn test_relevant_content_keeps_code_whole() {
        let text = "```gdscript\nclass_name PlayerController\n\nfunc _ready():\n    pass\n```\n";
        assert_eq!(
            relevant_content(text, &scope()).as_deref(),
            Some("```gdscript\nclass_name PlayerController\nfunc _ready():\n    pass\n```")
        );
    }

    #[test]
    fn test_relevant_content_none_when_unrelated() {
        assert_eq!(relevant_content("Nothing relevant here.", &scope()), None);
    }

    #[tokio::test]
    async fn test_generic_facts_are_cited() {
        let store = generic_store();
        let ctx = aggregate(StoryRef::first(), &Classification::generic(), &scope(), &store)
            .await
            .unwrap();

        assert!(ctx.is_complete());
        assert_eq!(ctx.facts.len(), 2);
        assert_eq!(ctx.facts[0].text(), "`PlayerController` uses static typing.");
        assert_eq!(
            ctx.facts[0].source().unwrap().citation(),
            "[Source: tech-stack#languages]"
        );
        assert_eq!(
            ctx.facts[1].source().unwrap().citation(),
            "[Source: coding-standards#naming]"
        );
    }

    #[tokio::test]
    async fn test_unmatched_category_gets_placeholder() {
        let store = generic_store()
            .with_document("audio-architecture", &[("buses", "Master bus only.\n")])
            .with_document("audio-mixing", &[("levels", "Normalize to -14 LUFS.\n")])
            .with_document("sound-banks", &[("banks", "One bank per level.\n")]);
        let classification = Classification::from_types([StoryType::Audio]);
        let ctx = aggregate(StoryRef::first(), &classification, &scope(), &store).await.unwrap();

        let audio: Vec<&CitedFact> =
            ctx.facts.iter().filter(|f| f.category() == StoryType::Audio).collect();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].text(), NO_GUIDANCE);
        assert!(audio[0].source().is_none());
    }

    #[tokio::test]
    async fn test_missing_document_is_reported() {
        let store = InMemoryDocumentStore::new()
            .with_document("tech-stack", &[("languages", "PlayerController in GDScript.\n")]);
        let ctx = aggregate(StoryRef::first(), &Classification::generic(), &scope(), &store)
            .await
            .unwrap();

        let missing: Vec<&str> = ctx.missing.iter().map(|m| m.document_id.as_str()).collect();
        assert_eq!(missing, vec!["project-structure", "coding-standards", "testing-conventions"]);
        assert_eq!(ctx.facts.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_document_fetched_once() {
        let model = "`PlayerController` state is serialized as a Resource.\n";
        let store = generic_store()
            .with_document("systems-architecture", &[("overview", "x\n")])
            .with_document("component-details", &[("parts", "x\n")])
            .with_document("physics-config", &[("layers", "x\n")])
            .with_document("input-system", &[("actions", "x\n")])
            .with_document("state-machines", &[("states", "x\n")])
            .with_document("data-models", &[("player", model)])
            .with_document("persistence", &[("format", "x\n")])
            .with_document("save-system", &[("slots", "x\n")])
            .with_document("analytics", &[("events", "x\n")])
            .with_document("multiplayer-architecture", &[("sync", "x\n")]);
        let classification = Classification::from_types([StoryType::Gameplay, StoryType::Backend]);
        let ctx = aggregate(StoryRef::first(), &classification, &scope(), &store).await.unwrap();

        let data_model_facts: Vec<&CitedFact> = ctx
            .facts
            .iter()
            .filter(|f| f.source().is_some_and(|s| s.document_id == "data-models"))
            .collect();
        assert_eq!(data_model_facts.len(), 1);
        assert_eq!(data_model_facts[0].category(), StoryType::Gameplay);
        // Backend is covered through the shared document, so no placeholder
        assert!(ctx.facts.iter().all(|f| !f.is_no_guidance()));
    }
}
