//! Story classification and scope extraction.
//!
//! Classification picks which document categories a story consults, from
//! keywords in the epic text. Scope is the set of subjects (node, script and
//! asset names) the story mentions; only document content naming one of
//! them is considered relevant.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::story::StoryType;

static BACKTICK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid regex"));
static CAMEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+\b").expect("valid regex"));
static SNAKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").expect("valid regex"));
static ASSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b[\w-]+\.(?:gd|cs|tscn|tres|gdshader|shader",
        r"|png|jpg|ogg|wav|mp3|json|cfg|prefab|asset|mat|unity)\b",
    ))
    .expect("valid regex")
});

/// The set of story types a story belongs to. Always includes `Generic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification(BTreeSet<StoryType>);

impl Classification {
    /// Only the baseline category.
    pub fn generic() -> Self {
        Self(BTreeSet::from([StoryType::Generic]))
    }

    /// The given types plus `Generic`.
    pub fn from_types(types: impl IntoIterator<Item = StoryType>) -> Self {
        let mut set: BTreeSet<StoryType> = types.into_iter().collect();
        set.insert(StoryType::Generic);
        Self(set)
    }

    pub fn contains(&self, story_type: StoryType) -> bool {
        self.0.contains(&story_type)
    }

    /// Types in fixed category order.
    pub fn types(&self) -> impl Iterator<Item = StoryType> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<StoryType> {
        self.types().collect()
    }
}

/// Keyword classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: BTreeMap<StoryType, Vec<String>>,
}

impl Classifier {
    /// Classifier with the built-in keyword lists.
    pub fn new() -> Self {
        let mut keywords = BTreeMap::new();
        let defaults: [(StoryType, &[&str]); 5] = [
            (
                StoryType::Gameplay,
                &[
                    "gameplay", "player", "enemy", "movement", "physics", "collision", "input",
                    "combat", "level", "mechanic", "jump", "state machine",
                ],
            ),
            (
                StoryType::UI,
                &["ui", "menu", "hud", "button", "screen", "dialog", "interface", "settings"],
            ),
            (
                StoryType::Backend,
                &[
                    "save", "load", "persist", "persistence", "database", "server", "network",
                    "multiplayer", "analytics", "leaderboard", "api",
                ],
            ),
            (
                StoryType::Graphics,
                &[
                    "sprite", "shader", "render", "rendering", "particle", "animation", "visual",
                    "texture", "lighting", "vfx",
                ],
            ),
            (StoryType::Audio, &["audio", "sound", "music", "sfx", "volume", "mixer"]),
        ];
        for (story_type, words) in defaults {
            keywords.insert(story_type, words.iter().map(|w| (*w).to_string()).collect());
        }
        Self { keywords }
    }

    /// Add keywords for a story type.
    pub fn with_keywords(mut self, story_type: StoryType, words: &[String]) -> Self {
        if story_type != StoryType::Generic {
            self.keywords.entry(story_type).or_default().extend(words.iter().cloned());
        }
        self
    }

    /// Classify requirement text.
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let matched = self
            .keywords
            .iter()
            .filter(|(_, words)| words.iter().any(|w| contains_word(&lower, &w.to_lowercase())))
            .map(|(story_type, _)| *story_type);
        let classification = Classification::from_types(matched);
        tracing::debug!(types = ?classification.to_vec(), "Classified story");
        classification
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Subjects a story is about.
#[derive(Debug, Clone, Serialize)]
pub struct StoryScope {
    terms: BTreeSet<String>,
    #[serde(skip)]
    matcher: Option<Regex>,
}

impl StoryScope {
    /// Extract subject terms from requirement text.
    pub fn from_text(text: &str) -> Self {
        let mut terms = BTreeSet::new();
        for caps in BACKTICK_RE.captures_iter(text) {
            terms.insert(caps[1].trim().to_string());
        }
        for re in [&*CAMEL_RE, &*SNAKE_RE, &*ASSET_RE] {
            for m in re.find_iter(text) {
                terms.insert(m.as_str().to_string());
            }
        }
        Self::with_terms(terms)
    }

    /// Scope over an explicit set of terms.
    pub fn with_terms(terms: impl IntoIterator<Item = String>) -> Self {
        let terms: BTreeSet<String> =
            terms.into_iter().map(|t| t.trim().to_string()).filter(|t| t.len() > 1).collect();
        let matcher = build_matcher(&terms);
        Self { terms, matcher }
    }

    /// Add more terms.
    pub fn extend(self, extra: impl IntoIterator<Item = String>) -> Self {
        Self::with_terms(self.terms.into_iter().chain(extra))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether the text mentions any scope term.
    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(text),
            None => {
                let lower = text.to_lowercase();
                self.terms.iter().any(|t| lower.contains(&t.to_lowercase()))
            }
        }
    }
}

fn build_matcher(terms: &BTreeSet<String>) -> Option<Regex> {
    if terms.is_empty() {
        return None;
    }
    let mut sorted: Vec<&String> = terms.iter().collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let alternatives: Vec<String> = sorted
        .into_iter()
        .map(|term| {
            let starts_word = term.chars().next().is_some_and(is_word_char);
            let ends_word = term.chars().last().is_some_and(is_word_char);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                regex::escape(term),
                if ends_word { r"\b" } else { "" }
            )
        })
        .collect();

    match Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "Scope matcher too large, using substring matching");
            None
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whole-word containment on already lowercased text.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}
