//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test.
fn storyforge() -> Command {
    Command::cargo_bin("storyforge").unwrap()
}

/// A project with generic docs and a two-story epic.
fn project() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".storyforge.toml")
        .write_str("[general]\nauthor = \"tester\"\ninteractive = false\n")
        .unwrap();

    let arch = temp.child("docs/architecture");
    arch.child("tech-stack.md")
        .write_str("## Engine\n\nGodot 4 loads `TitleScreen` first.\n")
        .unwrap();
    arch.child("project-structure.md").write_str("TitleScreen lives in scenes/ui.\n").unwrap();
    arch.child("coding-standards.md").write_str("## Naming\n\nPascalCase scene names.\n").unwrap();
    arch.child("testing-conventions.md").write_str("## GUT\n\nUse GUT.\n").unwrap();

    temp.child("docs/epics/epic-1.md")
        .write_str(
            "# Epic 1\n\n## Story 1.1: Boot\n\nShow the `TitleScreen` on launch.\n\n\
             ### Acceptance Criteria\n\n- `TitleScreen` appears first\n\n\
             ## Story 1.2: Credits\n\nShow credits.\n",
        )
        .unwrap();
    temp.child("docs/stories").create_dir_all().unwrap();
    temp
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    storyforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Draft the next development story"));
}

#[test]
fn test_version_flag() {
    storyforge()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_draft_help_lists_decision_flags() {
    storyforge()
        .args(["draft", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--override"))
        .stdout(predicate::str::contains("--next-epic"))
        .stdout(predicate::str::contains("--dry-run"));
}

// ============================================================================
// Init & Config Tests
// ============================================================================

#[test]
fn test_init_creates_layout() {
    let temp = assert_fs::TempDir::new().unwrap();

    storyforge().arg("init").current_dir(temp.path()).assert().success();

    temp.child("docs/architecture").assert(predicate::path::is_dir());
    temp.child("docs/epics").assert(predicate::path::is_dir());
    temp.child("docs/stories").assert(predicate::path::is_dir());
    temp.child(".storyforge.toml").assert(predicate::str::contains("[paths]"));
}

#[test]
fn test_config_shows_local_settings() {
    let temp = project();
    storyforge()
        .arg("config")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("author = \"tester\""));
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    storyforge()
        .args(["--config", "nope.toml", "status"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

// ============================================================================
// Workflow Tests
// ============================================================================

#[test]
fn test_status_on_empty_project() {
    let temp = project();
    storyforge()
        .arg("status")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No stories yet"))
        .stdout(predicate::str::contains("Next story:   1.1"));
}

#[test]
fn test_draft_writes_story() {
    let temp = project();

    storyforge()
        .arg("draft")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Drafted story 1.1"));

    let story = temp.child("docs/stories/1.1.story.md");
    story.assert(predicate::str::contains("# Story 1.1: Boot"));
    story.assert(predicate::str::contains("[Source: tech-stack#engine]"));
    story.assert(predicate::str::contains("| tester |"));

    storyforge()
        .args(["validate", "docs/stories/1.1.story.md"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(10/10)"));
}

#[test]
fn test_dry_run_json_writes_nothing() {
    let temp = project();

    storyforge()
        .args(["draft", "--dry-run", "--format", "json"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\": \"drafted\""));

    temp.child("docs/stories/1.1.story.md").assert(predicate::path::missing());
}

#[test]
fn test_incomplete_story_requires_decision() {
    let temp = project();
    temp.child("docs/stories/1.1.story.md")
        .write_str("# Story 1.1: Boot\n\n## Status\n\nInProgress\n")
        .unwrap();

    storyforge()
        .args(["draft", "--no-input"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--override"));

    storyforge()
        .args(["draft", "--cancel"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled"));

    storyforge()
        .args(["next", "--override"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1.2"));
}

#[test]
fn test_interactive_override_prompt() {
    let temp = project();
    temp.child(".storyforge.toml").write_str("[general]\ninteractive = true\n").unwrap();
    temp.child("docs/stories/1.1.story.md")
        .write_str("# Story 1.1: Boot\n\n## Status\n\nInProgress\n")
        .unwrap();

    storyforge()
        .arg("next")
        .current_dir(temp.path())
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Draft story 1.2 anyway? [y/N] "))
        .stdout(predicate::str::contains("anyway?.").not())
        .stdout(predicate::str::contains("Cancelled"));

    storyforge()
        .arg("next")
        .current_dir(temp.path())
        .write_stdin("y\n")
        .assert()
        .success()
        .stdout(predicate::str::ends_with("[y/N] 1.2\n"));
}

#[test]
fn test_validate_reports_failures() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("story.md").write_str("# Story 2.1: Bare\n\n## Status\n\nDraft\n").unwrap();

    storyforge()
        .args(["validate", "story.md"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("- [ ] acceptance-criteria-present"));
}

#[test]
fn test_completions() {
    storyforge()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("storyforge"));
}
