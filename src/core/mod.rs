//! Core types for Storyforge.
//!
//! Configuration shared by the library and the binary.

mod config;

pub use config::{
    ChecklistConfig, ClassificationConfig, Config, GeneralConfig, PathsConfig, LOCAL_CONFIG,
};
