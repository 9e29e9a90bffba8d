//! Story assembly.
//!
//! Turns an epic's story entry plus aggregated context into a draft story
//! artifact. Assembly is pure: the date and author are inputs, and the same
//! inputs always produce the same artifact.

use thiserror::Error;

use super::store::EpicStory;
use super::story::{ChangeLogEntry, CitedFact, StoryArtifact, StoryRef, StoryType, Task};

/// Structural problems found while assembling a story.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    /// A fact has neither a citation nor the placeholder text.
    #[error("Fact under {category} has no source citation: {text}")]
    UncitedFact { category: StoryType, text: String },

    /// A fact is filed under a category the story does not consult.
    #[error("Fact filed under {category}, which this story does not consult")]
    UnconsultedCategory { category: StoryType },

    /// A task links to an acceptance criterion that does not exist.
    #[error("Task '{task}' references acceptance criterion {index}, but the story has {count}")]
    DanglingCriterion { task: String, index: usize, count: usize },
}

/// Everything a story is assembled from.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    pub reference: StoryRef,
    pub title: String,
    pub statement: String,
    pub acceptance_criteria: Vec<String>,
    pub tasks: Vec<Task>,
    pub categories: Vec<StoryType>,
    pub facts: Vec<CitedFact>,
}

impl StoryDraft {
    /// Draft from an epic entry, with tasks planned from its criteria.
    pub fn from_epic(story: &EpicStory, categories: Vec<StoryType>, facts: Vec<CitedFact>) -> Self {
        let acceptance_criteria: Vec<String> = story
            .acceptance_criteria
            .iter()
            .filter(|ac| !ac.trim().is_empty())
            .cloned()
            .collect();
        Self {
            reference: story.reference,
            title: story.title.clone(),
            statement: story.statement.clone(),
            tasks: plan_tasks(&acceptance_criteria),
            acceptance_criteria,
            categories,
            facts,
        }
    }
}

/// Builds story artifacts.
#[derive(Debug, Clone)]
pub struct StoryAssembler {
    author: String,
}

impl StoryAssembler {
    pub fn new(author: impl Into<String>) -> Self {
        Self { author: author.into() }
    }

    /// Assemble a draft into an artifact dated `date`.
    pub fn assemble(&self, draft: StoryDraft, date: &str) -> Result<StoryArtifact, AssemblyError> {
        let title = collapse_whitespace(&draft.title);
        let statement = draft.statement.trim().to_string();
        let acceptance_criteria: Vec<String> = draft
            .acceptance_criteria
            .iter()
            .map(|ac| collapse_whitespace(ac))
            .filter(|ac| !ac.is_empty())
            .collect();

        let mut categories = draft.categories;
        categories.sort();
        categories.dedup();

        for task in &draft.tasks {
            if let Some(&index) = task
                .acceptance_criteria
                .iter()
                .find(|&&i| i == 0 || i > acceptance_criteria.len())
            {
                return Err(AssemblyError::DanglingCriterion {
                    task: task.description.clone(),
                    index,
                    count: acceptance_criteria.len(),
                });
            }
        }

        for fact in &draft.facts {
            if !fact.is_well_formed() {
                return Err(AssemblyError::UncitedFact {
                    category: fact.category(),
                    text: fact.text().to_string(),
                });
            }
            if !categories.contains(&fact.category()) {
                return Err(AssemblyError::UnconsultedCategory { category: fact.category() });
            }
        }

        // Stable, so facts keep their document order within a category
        let mut facts = draft.facts;
        facts.sort_by_key(CitedFact::category);

        let change_log = vec![ChangeLogEntry {
            date: date.to_string(),
            version: "1.0".to_string(),
            description: "Initial draft".to_string(),
            author: self.author.clone(),
        }];

        tracing::debug!(
            story = %draft.reference,
            criteria = acceptance_criteria.len(),
            tasks = draft.tasks.len(),
            facts = facts.len(),
            "Assembled story"
        );

        Ok(StoryArtifact::new(
            draft.reference,
            title,
            statement,
            acceptance_criteria,
            draft.tasks,
            categories,
            facts,
            change_log,
        ))
    }
}

impl Default for StoryAssembler {
    fn default() -> Self {
        Self::new("storyforge")
    }
}

/// One task per acceptance criterion, then a testing task covering all of them.
pub fn plan_tasks(acceptance_criteria: &[String]) -> Vec<Task> {
    let mut tasks: Vec<Task> = acceptance_criteria
        .iter()
        .enumerate()
        .map(|(i, ac)| {
            let ac = collapse_whitespace(ac);
            Task::new(format!("Implement: {ac}"), vec![i + 1]).with_subtasks(subtasks_for(&ac))
        })
        .collect();

    if !tasks.is_empty() {
        let all: Vec<usize> = tasks.iter().flat_map(|t| t.acceptance_criteria.clone()).collect();
        tasks.push(
            Task::new("Write tests covering the acceptance criteria", all).with_subtasks(vec![
                "Unit tests for new logic".to_string(),
                "Verify each criterion manually in a running build".to_string(),
            ]),
        );
    }
    tasks
}

fn subtasks_for(criterion: &str) -> Vec<String> {
    let lower = criterion.to_lowercase();
    let mut steps = Vec::new();

    if lower.contains("scene") || lower.contains("node") {
        steps.push("Create or update the scene and node setup".to_string());
    }
    if lower.contains("input") || lower.contains("key") || lower.contains("button") {
        steps.push("Register the input actions".to_string());
    }
    if lower.contains("save") || lower.contains("load") || lower.contains("persist") {
        steps.push("Extend the persisted data model".to_string());
    }
    if lower.contains("sound") || lower.contains("audio") || lower.contains("music") {
        steps.push("Hook up audio playback".to_string());
    }
    if lower.contains("menu") || lower.contains("hud") || lower.contains("screen") {
        steps.push("Build the UI layout".to_string());
    }
    if steps.is_empty() {
        steps.push("Implement the behavior".to_string());
    }
    steps.push("Check against the Dev Notes".to_string());
    steps
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::story::{DocumentLocator, StoryStatus};

    fn draft() -> StoryDraft {
        let epic = EpicStory {
            reference: StoryRef::new(1, 2).unwrap(),
            title: "  Player   movement ".to_string(),
            statement: "As a player, I want to move.".to_string(),
            acceptance_criteria: vec!["Arrow keys move the player".to_string(), "  ".to_string()],
        };
        StoryDraft::from_epic(
            &epic,
            vec![StoryType::Gameplay, StoryType::Generic],
            vec![
                CitedFact::cited(
                    StoryType::Gameplay,
                    "Use CharacterBody2D",
                    DocumentLocator::new("systems-architecture", Some("player".to_string())),
                ),
                CitedFact::cited(
                    StoryType::Generic,
                    "GDScript 4",
                    DocumentLocator::new("tech-stack", None),
                ),
            ],
        )
    }

    #[test]
    fn test_assemble_normalizes_and_orders() {
        let artifact = StoryAssembler::new("sm").assemble(draft(), "2024-05-01").unwrap();

        assert_eq!(artifact.status(), StoryStatus::Draft);
        assert_eq!(artifact.title(), "Player movement");
        assert_eq!(artifact.acceptance_criteria(), ["Arrow keys move the player"]);
        assert_eq!(artifact.categories(), [StoryType::Generic, StoryType::Gameplay]);
        assert_eq!(artifact.facts()[0].category(), StoryType::Generic);
        assert_eq!(artifact.change_log()[0].date, "2024-05-01");
        assert_eq!(artifact.change_log()[0].author, "sm");
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = StoryAssembler::default();
        let a = assembler.assemble(draft(), "2024-05-01").unwrap();
        let b = assembler.assemble(draft(), "2024-05-01").unwrap();
        assert_eq!(a.to_markdown(), b.to_markdown());
    }

    #[test]
    fn test_rejects_fact_from_unconsulted_category() {
        let mut d = draft();
        d.facts.push(CitedFact::no_guidance(StoryType::Audio));
        let err = StoryAssembler::default().assemble(d, "2024-05-01").unwrap_err();
        assert_eq!(err, AssemblyError::UnconsultedCategory { category: StoryType::Audio });
    }

    #[test]
    fn test_rejects_dangling_criterion() {
        let mut d = draft();
        d.tasks.push(Task::new("Extra", vec![3]));
        let err = StoryAssembler::default().assemble(d, "2024-05-01").unwrap_err();
        assert!(matches!(err, AssemblyError::DanglingCriterion { index: 3, .. }));
    }

    #[test]
    fn test_plan_tasks() {
        let tasks = plan_tasks(&[
            "Pressing jump plays a sound".to_string(),
            "Progress is saved on exit".to_string(),
        ]);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].acceptance_criteria, vec![1]);
        assert!(tasks[0].subtasks.contains(&"Hook up audio playback".to_string()));
        assert!(tasks[1].subtasks.contains(&"Extend the persisted data model".to_string()));
        assert_eq!(tasks[2].acceptance_criteria, vec![1, 2]);
    }

    #[test]
    fn test_plan_tasks_empty() {
        assert!(plan_tasks(&[]).is_empty());
    }
}
