use draftly_core::FileMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker stored in `GenerationResult::error` for salvage results
pub const PARTIAL_PARSE_ERROR: &str = "partially parsed";

/// Number of characters kept in a diagnostic preview of the raw response
const PREVIEW_CHARS: usize = 500;

/// Canonical outcome of a code-generation completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub description: String,
    pub files: FileMap,
    #[serde(default, alias = "generatedFiles")]
    pub generated_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    /// True for a salvage result: a description is available but no files
    pub fn is_partial(&self) -> bool {
        self.files.is_empty()
    }
}

/// Size and leading text of a response that could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseSample {
    pub length: usize,
    pub preview: String,
}

impl ResponseSample {
    pub fn of(raw: &str) -> Self {
        Self {
            length: raw.chars().count(),
            preview: raw.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Response is empty")]
    EmptyResponse,

    #[error("Response parsed but failed validation: {reason}")]
    Invalid {
        reason: String,
        sample: ResponseSample,
    },

    #[error("No valid JSON object found in response ({} chars)", .sample.length)]
    NoValidJson { sample: ResponseSample },
}

impl ExtractionError {
    pub fn sample(&self) -> Option<&ResponseSample> {
        match self {
            ExtractionError::EmptyResponse => None,
            ExtractionError::Invalid { sample, .. } | ExtractionError::NoValidJson { sample } => {
                Some(sample)
            }
        }
    }
}
