//! Draft checklist.
//!
//! A fixed set of rules run against a drafted story. Failures are reported,
//! never raised; the caller decides what to do with them.

use serde::Serialize;

use super::story::{category_covered, StoryArtifact, StoryStatus, StoryType};

/// Outcome of a single rule: pass or fail, with evidence either way.
type Check = fn(&StoryArtifact) -> (bool, String);

/// A named checklist rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    check: Check,
}

impl Rule {
    pub fn run(&self, artifact: &StoryArtifact) -> RuleResult {
        let (passed, evidence) = (self.check)(artifact);
        RuleResult { rule_id: self.id.to_string(), passed, evidence }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("id", &self.id).finish()
    }
}

/// An ordered set of rules.
#[derive(Debug, Clone)]
pub struct Ruleset {
    rules: Vec<Rule>,
}

impl Ruleset {
    /// The standard draft checklist.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Rule {
                    id: "status-draft",
                    description: "Story starts in Draft",
                    check: status_draft,
                },
                Rule {
                    id: "title-present",
                    description: "Story has a title",
                    check: title_present,
                },
                Rule {
                    id: "story-statement-present",
                    description: "Story has a statement",
                    check: statement_present,
                },
                Rule {
                    id: "acceptance-criteria-present",
                    description: "At least one acceptance criterion",
                    check: criteria_present,
                },
                Rule {
                    id: "tasks-present",
                    description: "At least one task",
                    check: tasks_present,
                },
                Rule {
                    id: "tasks-reference-ac",
                    description: "Every task links to an acceptance criterion",
                    check: tasks_reference_ac,
                },
                Rule {
                    id: "ac-links-valid",
                    description: "Task links point at existing criteria",
                    check: ac_links_valid,
                },
                Rule {
                    id: "ac-covered",
                    description: "Every criterion is addressed by a task",
                    check: ac_covered,
                },
                Rule {
                    id: "category-coverage",
                    description: "Every consulted category has facts or a placeholder",
                    check: category_coverage,
                },
                Rule {
                    id: "facts-cited",
                    description: "Every fact carries a citation",
                    check: facts_cited,
                },
            ],
        }
    }

    /// Drop rules by id. Unknown ids are ignored.
    pub fn without<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        self.rules.retain(|rule| !ids.iter().any(|id| id.as_ref() == rule.id));
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id).collect()
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::standard()
    }
}

/// Result of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub passed: bool,
    pub evidence: String,
}

/// Results of all rules, in ruleset order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistReport {
    pub results: Vec<RuleResult>,
}

impl ChecklistReport {
    /// Whether every rule passed.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn get(&self, rule_id: &str) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }

    /// `(passed, total)`.
    pub fn score(&self) -> (usize, usize) {
        (self.results.iter().filter(|r| r.passed).count(), self.results.len())
    }

    /// Render as a markdown checklist.
    pub fn to_markdown(&self) -> String {
        let (passed, total) = self.score();
        let mut md = format!("## Checklist ({passed}/{total})\n\n");
        for result in &self.results {
            md.push_str(&format!(
                "- [{}] {}: {}\n",
                if result.passed { "x" } else { " " },
                result.rule_id,
                result.evidence
            ));
        }
        md
    }
}

/// Run every rule against the artifact.
pub fn validate(artifact: &StoryArtifact, ruleset: &Ruleset) -> ChecklistReport {
    let results: Vec<RuleResult> = ruleset.rules.iter().map(|rule| rule.run(artifact)).collect();
    for failure in results.iter().filter(|r| !r.passed) {
        tracing::debug!(
            story = %artifact.reference(),
            rule = %failure.rule_id,
            evidence = %failure.evidence,
            "Checklist rule failed"
        );
    }
    ChecklistReport { results }
}

// ============================================================================
// Rules
// ============================================================================

fn status_draft(artifact: &StoryArtifact) -> (bool, String) {
    (artifact.status() == StoryStatus::Draft, format!("status is {}", artifact.status()))
}

fn title_present(artifact: &StoryArtifact) -> (bool, String) {
    if artifact.title().trim().is_empty() {
        (false, "title is empty".to_string())
    } else {
        (true, format!("title '{}'", artifact.title()))
    }
}

fn statement_present(artifact: &StoryArtifact) -> (bool, String) {
    if artifact.statement().trim().is_empty() {
        (false, "no story statement".to_string())
    } else {
        (true, "story statement present".to_string())
    }
}

fn criteria_present(artifact: &StoryArtifact) -> (bool, String) {
    let count = artifact.acceptance_criteria().len();
    (count > 0, format!("{count} acceptance criteria"))
}

fn tasks_present(artifact: &StoryArtifact) -> (bool, String) {
    let count = artifact.tasks().len();
    (count > 0, format!("{count} tasks"))
}

fn tasks_reference_ac(artifact: &StoryArtifact) -> (bool, String) {
    let unlinked: Vec<&str> = artifact
        .tasks()
        .iter()
        .filter(|t| t.acceptance_criteria.is_empty())
        .map(|t| t.description.as_str())
        .collect();
    if unlinked.is_empty() {
        (true, "all tasks link to criteria".to_string())
    } else {
        (false, format!("unlinked tasks: {}", unlinked.join("; ")))
    }
}

fn ac_links_valid(artifact: &StoryArtifact) -> (bool, String) {
    let count = artifact.acceptance_criteria().len();
    let mut invalid: Vec<usize> = artifact
        .tasks()
        .iter()
        .flat_map(|t| t.acceptance_criteria.iter().copied())
        .filter(|&i| i == 0 || i > count)
        .collect();
    invalid.sort_unstable();
    invalid.dedup();
    if invalid.is_empty() {
        (true, format!("all links within 1..={count}"))
    } else {
        (false, format!("links to missing criteria: {}", join_numbers(&invalid)))
    }
}

fn ac_covered(artifact: &StoryArtifact) -> (bool, String) {
    let uncovered: Vec<usize> = (1..=artifact.acceptance_criteria().len())
        .filter(|i| !artifact.tasks().iter().any(|t| t.acceptance_criteria.contains(i)))
        .collect();
    if uncovered.is_empty() {
        (true, "every criterion has a task".to_string())
    } else {
        (false, format!("criteria without tasks: {}", join_numbers(&uncovered)))
    }
}

fn category_coverage(artifact: &StoryArtifact) -> (bool, String) {
    if !artifact.categories().contains(&StoryType::Generic) {
        return (false, "Generic category was not consulted".to_string());
    }
    let uncovered: Vec<&str> = artifact
        .categories()
        .iter()
        .filter(|c| !category_covered(**c, artifact.facts()))
        .map(|c| c.as_str())
        .collect();
    if uncovered.is_empty() {
        let names: Vec<&str> = artifact.categories().iter().map(|c| c.as_str()).collect();
        (true, format!("covered: {}", names.join(", ")))
    } else {
        (false, format!("no facts for: {}", uncovered.join(", ")))
    }
}

fn facts_cited(artifact: &StoryArtifact) -> (bool, String) {
    let uncited = artifact.facts().iter().filter(|f| !f.is_well_formed()).count();
    let total = artifact.facts().len();
    if uncited == 0 {
        (true, format!("{total} facts cited or marked as no guidance"))
    } else {
        (false, format!("{uncited} of {total} facts lack a citation"))
    }
}

fn join_numbers(numbers: &[usize]) -> String {
    numbers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
