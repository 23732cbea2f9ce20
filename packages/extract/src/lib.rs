// ABOUTME: Recovers a canonical generation result from untrusted model output
// ABOUTME: Ordered repair cascade, files-shape normalization, validation and salvage

mod cascade;
pub mod normalize;
mod repair;
pub mod types;

pub use cascade::{extract, stage_names};
pub use normalize::{normalize_files, FilesShape};
pub use types::{ExtractionError, GenerationResult, ResponseSample, PARTIAL_PARSE_ERROR};
