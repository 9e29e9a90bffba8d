//! Storyforge - drafts the next development story of a project.
//!
//! Reads epics and architecture documents, decides which story comes next
//! and writes it with cited Dev Notes.

#![allow(clippy::single_match_else)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storyforge::core::{Config, LOCAL_CONFIG};
use storyforge::workflow::{
    validate, Decision, DecisionPrompt, DecisionSource, DraftOptions, DraftOutcome,
    FsDocumentStore, FsStoryRepository, SequencerState, StoryArtifact, StoryRef, StoryType,
    StoryWorkflow, WorkflowError, WorkflowResult,
};

/// Draft the next development story from epics and architecture docs
#[derive(Parser)]
#[command(name = "storyforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the docs layout and a local config
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show the latest story and what comes next (default)
    Status {
        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decide the next story without drafting it
    Next {
        #[command(flatten)]
        decisions: DecisionArgs,
    },

    /// Draft the next story
    Draft {
        #[command(flatten)]
        decisions: DecisionArgs,

        /// Also consult these story types (comma separated)
        #[arg(long = "type", value_delimiter = ',')]
        types: Vec<StoryType>,

        /// Extra scope terms for picking relevant doc content
        #[arg(long)]
        term: Vec<String>,

        /// Assemble and validate without writing
        #[arg(short, long)]
        dry_run: bool,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the checklist against an existing story file
    Validate {
        /// Story file
        path: PathBuf,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Answers for the sequencer's questions, given up front.
#[derive(Args, Debug, Clone, Default)]
struct DecisionArgs {
    /// Draft the next story even though the latest one is not Done
    #[arg(long = "override")]
    allow_override: bool,

    /// When the epic is complete, continue with the next epic
    #[arg(long, conflicts_with = "story")]
    next_epic: bool,

    /// When the epic is complete, continue with this story (E.S)
    #[arg(long)]
    story: Option<StoryRef>,

    /// Answer every question with "no"
    #[arg(long, conflicts_with_all = ["allow_override", "next_epic", "story"])]
    cancel: bool,

    /// Never prompt; fail when a decision is needed and not given
    #[arg(long)]
    no_input: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    let config_path = cli.config.as_deref();

    // Handle commands
    match cli.command {
        None => cmd_status(config_path, "text")?,
        Some(Commands::Init { path, force }) => {
            cmd_init(config_path, &path, force)?;
        }
        Some(Commands::Status { format }) => {
            cmd_status(config_path, &format)?;
        }
        Some(Commands::Next { decisions }) => {
            cmd_next(config_path, decisions)?;
        }
        Some(Commands::Draft { decisions, types, term, dry_run, format }) => {
            let options = DraftOptions {
                story_types: types,
                scope_terms: term,
                dry_run,
                ..DraftOptions::default()
            };
            cmd_draft(config_path, decisions, &options, &format)?;
        }
        Some(Commands::Validate { path, format }) => {
            cmd_validate(config_path, &path, &format)?;
        }
        Some(Commands::Config { path }) => {
            cmd_config(config_path, path)?;
        }
        Some(Commands::Completions { shell }) => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

fn build_workflow(config: &Config) -> StoryWorkflow {
    let paths = &config.paths;
    let documents = FsDocumentStore::new(&paths.architecture_dir, &paths.epics_dir);
    let repository = FsStoryRepository::new(&paths.stories_dir);

    StoryWorkflow::new(Arc::new(documents), Arc::new(repository))
        .with_classifier(config.classifier())
        .with_assembler(config.assembler())
        .with_ruleset(config.ruleset())
}

fn print_structured<T: Serialize>(value: &T, format: &str) -> Result<bool> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        "yaml" => print!("{}", serde_yaml::to_string(value)?),
        "text" => return Ok(false),
        other => anyhow::bail!("Unknown format: {other}. Supported: text, json, yaml"),
    }
    Ok(true)
}

/// Create the docs layout and a local config.
fn cmd_init(config_path: Option<&Path>, path: &Path, force: bool) -> Result<()> {
    let config = Config::load_with(config_path)?;
    let paths = config.paths.resolve(path);

    for dir in [&paths.architecture_dir, &paths.epics_dir, &paths.stories_dir] {
        std::fs::create_dir_all(dir)?;
        println!("Created {}", dir.display());
    }

    let local = path.join(LOCAL_CONFIG);
    if local.exists() && !force {
        println!("{} already exists (use --force to overwrite)", local.display());
    } else {
        config.save_to(&local)?;
        println!("Wrote {}", local.display());
    }

    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    latest: Option<StoryRef>,
    latest_status: Option<String>,
    next: SequencerState,
}

/// Show the latest story and what comes next.
fn cmd_status(config_path: Option<&Path>, format: &str) -> Result<()> {
    let config = Config::load_with(config_path)?;
    let workflow = build_workflow(&config);

    let rt = tokio::runtime::Runtime::new()?;
    let (progress, sequencer) = rt.block_on(workflow.sequence())?;

    let report = StatusReport {
        latest: progress.map(|(r, _)| r),
        latest_status: progress.map(|(_, s)| s.to_string()),
        next: sequencer.state(),
    };
    if print_structured(&report, format)? {
        return Ok(());
    }

    match progress {
        Some((reference, status)) => println!("Latest story: {reference} ({status})"),
        None => println!("No stories yet"),
    }
    match sequencer.state() {
        SequencerState::Resolved(next) => println!("Next story:   {next}"),
        state => match state.prompt() {
            Some(prompt) => println!("Needs a decision: {prompt}"),
            None => println!("Next story:   none"),
        },
    }

    Ok(())
}

/// Decide the next story.
fn cmd_next(config_path: Option<&Path>, decisions: DecisionArgs) -> Result<()> {
    let config = Config::load_with(config_path)?;
    let workflow = build_workflow(&config);
    let source = CliDecisions::new(decisions, config.general.interactive);

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(workflow.resolve_next(&source))? {
        Some(reference) => println!("{reference}"),
        None => println!("Cancelled"),
    }

    Ok(())
}

/// Draft the next story.
fn cmd_draft(
    config_path: Option<&Path>,
    decisions: DecisionArgs,
    options: &DraftOptions,
    format: &str,
) -> Result<()> {
    let config = Config::load_with(config_path)?;
    let workflow = build_workflow(&config);
    let source = CliDecisions::new(decisions, config.general.interactive);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(workflow.draft_next(&source, options))?;

    if print_structured(&outcome, format)? {
        return Ok(());
    }

    match outcome {
        DraftOutcome::Cancelled => println!("Cancelled"),
        DraftOutcome::Drafted(drafted) => {
            match &drafted.location {
                Some(location) => {
                    println!("Drafted story {} at {location}", drafted.artifact.reference());
                }
                None => {
                    println!("[DRY RUN] Would write story {}:\n", drafted.artifact.reference());
                    println!("{}", drafted.artifact.to_markdown());
                }
            }
            println!();
            print!("{}", drafted.report.to_markdown());
        }
    }

    Ok(())
}

/// Run the checklist against a story file.
fn cmd_validate(config_path: Option<&Path>, path: &Path, format: &str) -> Result<()> {
    let config = Config::load_with(config_path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let artifact = StoryArtifact::parse(&content)
        .map_err(|e| anyhow::anyhow!("Malformed story {}: {e}", path.display()))?;

    let report = validate(&artifact, &config.ruleset());
    if !print_structured(&report, format)? {
        print!("{}", report.to_markdown());
    }

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Show configuration.
fn cmd_config(config_path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load_with(config_path)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "storyforge", &mut io::stdout());
}

/// Decisions from command-line flags, falling back to stdin prompts.
struct CliDecisions {
    args: DecisionArgs,
    interactive: bool,
}

impl CliDecisions {
    fn new(args: DecisionArgs, interactive: bool) -> Self {
        let interactive = interactive && !args.no_input;
        Self { args, interactive }
    }

    fn preset(&self, prompt: &DecisionPrompt) -> Option<Decision> {
        match prompt {
            DecisionPrompt::IncompleteStoryOverrideRequired { .. } => {
                if self.args.allow_override {
                    Some(Decision::ConfirmOverride)
                } else if self.args.cancel {
                    Some(Decision::DeclineOverride)
                } else {
                    None
                }
            }
            DecisionPrompt::EpicComplete { .. } => {
                if let Some(story) = self.args.story {
                    Some(Decision::SpecificStory(story))
                } else if self.args.next_epic {
                    Some(Decision::NextEpic)
                } else if self.args.cancel {
                    Some(Decision::Cancel)
                } else {
                    None
                }
            }
        }
    }

    fn ask(prompt: &DecisionPrompt) -> io::Result<Decision> {
        let mut input = String::new();
        match prompt {
            DecisionPrompt::IncompleteStoryOverrideRequired { .. } => {
                print!("{prompt} [y/N] ");
                io::stdout().flush()?;
                io::stdin().read_line(&mut input)?;

                if input.trim().eq_ignore_ascii_case("y") {
                    Ok(Decision::ConfirmOverride)
                } else {
                    Ok(Decision::DeclineOverride)
                }
            }
            DecisionPrompt::EpicComplete { .. } => loop {
                print!("{prompt} [n/E.S/c] ");
                io::stdout().flush()?;
                input.clear();
                if io::stdin().read_line(&mut input)? == 0 {
                    return Ok(Decision::Cancel);
                }

                let answer = input.trim();
                if answer.eq_ignore_ascii_case("n") {
                    return Ok(Decision::NextEpic);
                }
                if answer.is_empty() || answer.eq_ignore_ascii_case("c") {
                    return Ok(Decision::Cancel);
                }
                match answer.parse::<StoryRef>() {
                    Ok(story) => return Ok(Decision::SpecificStory(story)),
                    Err(e) => println!("{e}"),
                }
            },
        }
    }
}

#[async_trait]
impl DecisionSource for CliDecisions {
    async fn decide(&self, prompt: &DecisionPrompt) -> WorkflowResult<Decision> {
        if let Some(decision) = self.preset(prompt) {
            return Ok(decision);
        }
        if !self.interactive {
            let hint = match prompt {
                DecisionPrompt::IncompleteStoryOverrideRequired { .. } => "--override or --cancel",
                DecisionPrompt::EpicComplete { .. } => "--next-epic, --story E.S or --cancel",
            };
            return Err(WorkflowError::Decision(format!("{prompt}; pass {hint}")));
        }
        Ok(Self::ask(prompt)?)
    }
}
