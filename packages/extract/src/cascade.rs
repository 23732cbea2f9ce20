// ABOUTME: Ordered extraction cascade over raw model output
// ABOUTME: Each stage is a pure function tried in sequence; first accepted result wins

use crate::normalize::{build_result, looks_like_payload};
use crate::repair;
use crate::types::{ExtractionError, GenerationResult, ResponseSample, PARTIAL_PARSE_ERROR};
use draftly_core::FileMap;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Result of running one stage against the raw text
pub(crate) enum StageOutcome {
    /// A payload parsed and passed validation
    Accepted(GenerationResult),
    /// A payload parsed but failed validation
    Rejected(String),
    /// Nothing payload-shaped parsed
    NoCandidate,
}

pub(crate) struct Stage {
    pub name: &'static str,
    pub run: fn(&str) -> StageOutcome,
}

/// Strategies in the order they are attempted
pub(crate) const STAGES: &[Stage] = &[
    Stage {
        name: "direct",
        run: direct_parse,
    },
    Stage {
        name: "cleaned",
        run: cleaned_parse,
    },
    Stage {
        name: "fenced_block",
        run: fenced_block_parse,
    },
    Stage {
        name: "brace_scan",
        run: brace_scan_parse,
    },
];

/// Names of the full-parse stages, in order
pub fn stage_names() -> Vec<&'static str> {
    STAGES.iter().map(|stage| stage.name).collect()
}

/// Recover a generation result from raw model output.
///
/// Stages run strictly in order. When every stage fails and no payload-shaped
/// JSON parsed at all, a salvage result carrying only the description may be
/// returned; callers must check [`GenerationResult::is_partial`] before
/// treating the files as usable.
pub fn extract(raw: &str) -> Result<GenerationResult, ExtractionError> {
    if raw.trim().is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let mut rejection: Option<(&'static str, String)> = None;

    for stage in STAGES {
        match (stage.run)(raw) {
            StageOutcome::Accepted(result) => {
                info!(
                    "Extracted {} files using '{}' stage",
                    result.files.len(),
                    stage.name
                );
                return Ok(result);
            }
            StageOutcome::Rejected(reason) => {
                debug!("Stage '{}' rejected payload: {}", stage.name, reason);
                rejection.get_or_insert((stage.name, reason));
            }
            StageOutcome::NoCandidate => {
                debug!("Stage '{}' found no parsable payload", stage.name);
            }
        }
    }

    let sample = ResponseSample::of(raw);

    if let Some((stage, reason)) = rejection {
        warn!(
            "Generated payload failed validation at '{}' stage: {} ({} chars)",
            stage, reason, sample.length
        );
        return Err(ExtractionError::Invalid { reason, sample });
    }

    if let Some(result) = salvage(raw) {
        warn!(
            "Returning partial result with description only ({} chars)",
            sample.length
        );
        return Ok(result);
    }

    error!(
        "No valid JSON found in response ({} chars). Preview: {}",
        sample.length, sample.preview
    );
    Err(ExtractionError::NoValidJson { sample })
}

fn evaluate(candidate: &str) -> StageOutcome {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if looks_like_payload(&value) => match build_result(&value) {
            Ok(result) => StageOutcome::Accepted(result),
            Err(reason) => StageOutcome::Rejected(reason),
        },
        Ok(_) | Err(_) => StageOutcome::NoCandidate,
    }
}

#[derive(Clone, Copy)]
enum Attempt {
    Raw,
    Cleaned,
}

/// Try each candidate raw and then cleaned; keep the first rejection for diagnostics
fn first_accepted<'a>(candidates: impl IntoIterator<Item = &'a str>) -> StageOutcome {
    let mut rejection = None;

    for candidate in candidates {
        // Cleaning is only paid for when the raw candidate is not accepted
        for attempt in [Attempt::Raw, Attempt::Cleaned] {
            let outcome = match attempt {
                Attempt::Raw => evaluate(candidate),
                Attempt::Cleaned => evaluate(&repair::clean(candidate)),
            };
            match outcome {
                StageOutcome::Accepted(result) => return StageOutcome::Accepted(result),
                StageOutcome::Rejected(reason) => {
                    rejection.get_or_insert(reason);
                }
                StageOutcome::NoCandidate => {}
            }
        }
    }

    rejection
        .map(StageOutcome::Rejected)
        .unwrap_or(StageOutcome::NoCandidate)
}

fn direct_parse(raw: &str) -> StageOutcome {
    evaluate(raw.trim())
}

fn cleaned_parse(raw: &str) -> StageOutcome {
    match repair::outer_object(raw) {
        Some(slice) => evaluate(&repair::clean(slice)),
        None => StageOutcome::NoCandidate,
    }
}

fn fenced_block_parse(raw: &str) -> StageOutcome {
    first_accepted(repair::json_fenced_blocks(raw))
}

fn brace_scan_parse(raw: &str) -> StageOutcome {
    first_accepted(repair::balanced_objects(raw))
}

/// Last resort: keep the description of a payload that never parsed
fn salvage(raw: &str) -> Option<GenerationResult> {
    if !raw.contains('{') || !raw.contains('}') {
        return None;
    }

    let description = repair::description_field(raw)?;
    Some(GenerationResult {
        description,
        files: FileMap::new(),
        generated_files: Vec::new(),
        error: Some(PARTIAL_PARSE_ERROR.to_string()),
    })
}
