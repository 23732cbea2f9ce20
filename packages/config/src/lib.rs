// ABOUTME: Configuration for the Draftly sandbox runtime and AI generation
// ABOUTME: Environment variable names plus typed settings loaded from the environment

pub mod constants;
pub mod settings;

pub use settings::{AiSettings, CommandSpec, ConfigError, RuntimeSettings};
