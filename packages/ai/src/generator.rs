// ABOUTME: Code generation pipeline from user request to merged project files
// ABOUTME: Runs prompt construction, the completion call and response extraction

use crate::prompts::{build_code_prompt, SYSTEM_PROMPT};
use crate::service::{CompletionClient, CompletionError};
use draftly_core::FileMap;
use draftly_extract::{extract, ExtractionError, GenerationResult};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Could not generate valid project files: {0}")]
    Extraction(#[from] ExtractionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Files were recovered; `files` is the current project with them applied
    Complete {
        result: GenerationResult,
        files: FileMap,
    },
    /// Only the description survived; there is nothing to mount
    Partial { description: String },
}

pub struct CodeGenerator {
    client: CompletionClient,
}

impl CodeGenerator {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    pub async fn generate(
        &self,
        current: &FileMap,
        request: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        let prompt = build_code_prompt(current, request);
        let completion = self.client.complete(&prompt, Some(SYSTEM_PROMPT)).await?;

        let result = extract(&completion.text).map_err(|e| {
            if let Some(sample) = e.sample() {
                error!(
                    "Extraction failed for {} char response from {}: {}",
                    sample.length, completion.model, sample.preview
                );
            }
            e
        })?;

        if result.is_partial() {
            warn!("Generation returned a description without files");
            return Ok(GenerationOutcome::Partial {
                description: result.description,
            });
        }

        let files = current.merged(&result.files);
        info!(
            "Generated {} files ({} new) with {}",
            result.files.len(),
            result.generated_files.len(),
            completion.model
        );
        Ok(GenerationOutcome::Complete { result, files })
    }
}
