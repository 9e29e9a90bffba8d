//! Configuration management for Storyforge.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::workflow::{Classifier, Ruleset, StoryAssembler, StoryType};

/// Local configuration file name.
pub const LOCAL_CONFIG: &str = ".storyforge.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Where documents and stories live
    pub paths: PathsConfig,

    /// Extra classification keywords
    pub classification: ClassificationConfig,

    /// Checklist settings
    pub checklist: ChecklistConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Author recorded in the change log
    pub author: String,

    /// Whether to prompt on stdin when the sequencer needs a decision
    pub interactive: bool,
}

/// Directory layout, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Architecture documents
    pub architecture_dir: PathBuf,

    /// Epic files (`epic-<n>.md`)
    pub epics_dir: PathBuf,

    /// Drafted stories
    pub stories_dir: PathBuf,
}

/// Keywords added to the built-in classifier lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub gameplay: Vec<String>,
    pub ui: Vec<String>,
    pub backend: Vec<String>,
    pub graphics: Vec<String>,
    pub audio: Vec<String>,
}

/// Checklist settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistConfig {
    /// Rule ids to skip
    pub skip: Vec<String>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.storyforge.toml` in current directory
    /// 2. `~/.config/storyforge/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load from an explicit path when given, otherwise from the default
    /// locations.
    pub fn load_with(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load_from_file(path)
            }
            None => Self::load(),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("storyforge"))
    }

    /// Classifier with the configured extra keywords.
    pub fn classifier(&self) -> Classifier {
        let c = &self.classification;
        Classifier::new()
            .with_keywords(StoryType::Gameplay, &c.gameplay)
            .with_keywords(StoryType::UI, &c.ui)
            .with_keywords(StoryType::Backend, &c.backend)
            .with_keywords(StoryType::Graphics, &c.graphics)
            .with_keywords(StoryType::Audio, &c.audio)
    }

    /// Standard checklist minus skipped rules.
    pub fn ruleset(&self) -> Ruleset {
        Ruleset::standard().without(&self.checklist.skip)
    }

    pub fn assembler(&self) -> StoryAssembler {
        StoryAssembler::new(self.general.author.clone())
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { author: "storyforge".to_string(), interactive: true }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            architecture_dir: PathBuf::from("docs/architecture"),
            epics_dir: PathBuf::from("docs/epics"),
            stories_dir: PathBuf::from("docs/stories"),
        }
    }
}

impl PathsConfig {
    /// Paths resolved against a project root.
    pub fn resolve(&self, root: &Path) -> Self {
        Self {
            architecture_dir: root.join(&self.architecture_dir),
            epics_dir: root.join(&self.epics_dir),
            stories_dir: root.join(&self.stories_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.author, "storyforge");
        assert!(config.general.interactive);
        assert_eq!(config.paths.stories_dir, PathBuf::from("docs/stories"));
        assert!(config.checklist.skip.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[paths]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            author = "Bob"

            [paths]
            stories_dir = "stories"

            [classification]
            audio = ["footstep"]

            [checklist]
            skip = ["story-statement-present"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.author, "Bob");
        assert!(config.general.interactive);
        assert_eq!(config.paths.stories_dir, PathBuf::from("stories"));
        assert_eq!(config.paths.epics_dir, PathBuf::from("docs/epics"));
        assert!(config.classifier().classify("Footstep sounds").contains(StoryType::Audio));
        assert_eq!(config.ruleset().rules().len(), 9);
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[general]\ninteractive = false\n").unwrap();

        let config = Config::load_with(Some(&path)).unwrap();
        assert!(!config.general.interactive);
        assert!(Config::load_with(Some(&temp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_save_to_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(LOCAL_CONFIG);
        let mut config = Config::default();
        config.general.author = "Ada".to_string();
        config.checklist.skip = vec!["facts-cited".to_string()];

        config.save_to(&path).unwrap();
        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.general.author, "Ada");
        assert_eq!(loaded.checklist.skip, vec!["facts-cited"]);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[general\n").unwrap();
        assert!(Config::load_from_file(&path).is_err());
    }

    #[test]
    fn test_paths_resolve() {
        let paths = PathsConfig::default().resolve(Path::new("/project"));
        assert_eq!(paths.epics_dir, PathBuf::from("/project/docs/epics"));
    }
}
