// ABOUTME: AI code generation for Draftly
// ABOUTME: Anthropic completion client, prompt construction and the generate pipeline

pub mod generator;
pub mod prompts;
pub mod service;

pub use generator::{CodeGenerator, GenerationError, GenerationOutcome};
pub use prompts::build_code_prompt;
pub use service::{Completion, CompletionClient, CompletionError, CompletionResult, Usage};
