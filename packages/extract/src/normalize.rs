//! Normalization of the loosely-typed `files` field and validation of a parsed payload.

use crate::types::GenerationResult;
use draftly_core::{normalize_path, FileMap};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// The shapes a model has been observed to use for `files`
#[derive(Debug)]
pub enum FilesShape<'a> {
    /// `{ "/path": { "code": "..." } }`
    Canonical(&'a Map<String, Value>),
    /// `[ { "filename": "/path", "content": "..." } ]`
    Records(&'a [Value]),
    /// Object whose values are `{ filename, content }` or `{ code }`, mixed
    Legacy(&'a Map<String, Value>),
    Unrecognized,
}

impl<'a> FilesShape<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) if map.values().all(is_code_record) => FilesShape::Canonical(map),
            Value::Object(map) => FilesShape::Legacy(map),
            Value::Array(items) => FilesShape::Records(items),
            _ => FilesShape::Unrecognized,
        }
    }
}

fn is_code_record(value: &Value) -> bool {
    value.get("code").is_some_and(Value::is_string) && value.get("filename").is_none()
}

fn string_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

/// Normalize any recognized `files` shape into a canonical FileMap.
///
/// Entries missing a path or code, or whose path is invalid, are dropped.
/// An unrecognized shape yields an empty map.
pub fn normalize_files(value: &Value) -> FileMap {
    let entries: Vec<(&str, &str)> = match FilesShape::classify(value) {
        FilesShape::Canonical(map) => map
            .iter()
            .filter_map(|(path, record)| Some((path.as_str(), string_field(record, "code")?)))
            .collect(),
        FilesShape::Records(items) => items
            .iter()
            .filter_map(|item| {
                Some((string_field(item, "filename")?, string_field(item, "content")?))
            })
            .collect(),
        FilesShape::Legacy(map) => map
            .iter()
            .filter_map(|(key, record)| {
                match (
                    string_field(record, "filename"),
                    string_field(record, "content"),
                ) {
                    (Some(filename), Some(content)) => Some((filename, content)),
                    _ => Some((key.as_str(), string_field(record, "code")?)),
                }
            })
            .collect(),
        FilesShape::Unrecognized => {
            debug!("Unrecognized files shape, treating as empty");
            Vec::new()
        }
    };

    let mut files = FileMap::new();
    for (path, code) in entries {
        if let Err(e) = files.insert(path, code) {
            warn!("Dropping generated file: {}", e);
        }
    }
    files
}

/// Turn a parsed JSON value into a validated result.
///
/// Valid means: an object with a `description`, a non-null `files` object
/// that is non-empty after normalization and free of path conflicts.
pub(crate) fn build_result(value: &Value) -> Result<GenerationResult, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;

    let description = match object.get("description") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => return Err("missing description field".to_string()),
    };

    let files_value = match object.get("files") {
        Some(value @ (Value::Object(_) | Value::Array(_))) => value,
        Some(Value::Null) | None => return Err("missing files field".to_string()),
        Some(_) => return Err("files field is not an object".to_string()),
    };

    let files = normalize_files(files_value);
    if files.is_empty() {
        return Err("files is empty after normalization".to_string());
    }
    files.check_conflicts().map_err(|e| e.to_string())?;

    let generated_files = object
        .get("generated_files")
        .or_else(|| object.get("generatedFiles"))
        .and_then(Value::as_array)
        .map(|paths| {
            paths
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|path| normalize_path(path).ok())
                .collect()
        })
        .unwrap_or_else(|| files.paths().map(str::to_string).collect());

    Ok(GenerationResult {
        description,
        files,
        generated_files,
        error: None,
    })
}

/// Whether a parsed value is meant to be the generation payload at all
pub(crate) fn looks_like_payload(value: &Value) -> bool {
    value.get("files").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_records_shape_is_rekeyed() {
        let files = normalize_files(&json!([
            { "filename": "/a.js", "content": "x" },
            { "filename": "/missing-content.js" },
            { "content": "no name" }
        ]));

        assert_eq!(files, FileMap::from_entries([("/a.js", "x")]).unwrap());
    }

    #[test]
    fn test_legacy_shape_mixes_records_and_code() {
        let files = normalize_files(&json!({
            "first": { "filename": "/src/a.js", "content": "a" },
            "/src/b.js": { "code": "b" },
            "broken": { "text": "?" }
        }));

        assert_eq!(
            files,
            FileMap::from_entries([("/src/a.js", "a"), ("/src/b.js", "b")]).unwrap()
        );
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let canonical = json!({
            "/src/App.jsx": { "code": "app" },
            "/index.html": { "code": "<html>" }
        });

        let once = normalize_files(&canonical);
        let twice = normalize_files(&serde_json::to_value(&once).unwrap());

        assert_eq!(serde_json::to_value(&once).unwrap(), canonical);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unrecognized_shape_is_empty() {
        assert!(normalize_files(&json!("just a string")).is_empty());
        assert!(normalize_files(&json!(42)).is_empty());
    }

    #[test]
    fn test_invalid_paths_are_dropped() {
        let files = normalize_files(&json!({
            "../escape.js": { "code": "bad" },
            "src/ok.js": { "code": "ok" }
        }));
        assert_eq!(files, FileMap::from_entries([("/src/ok.js", "ok")]).unwrap());
    }

    #[test]
    fn test_build_result_defaults_generated_files() {
        let result = build_result(&json!({
            "description": "d",
            "files": { "/b.js": { "code": "b" }, "/a.js": { "code": "a" } }
        }))
        .unwrap();
        assert_eq!(result.generated_files, vec!["/a.js", "/b.js"]);
    }

    #[test]
    fn test_build_result_accepts_camel_case_generated_files() {
        let result = build_result(&json!({
            "description": "d",
            "files": { "/a.js": { "code": "a" } },
            "generatedFiles": ["a.js"]
        }))
        .unwrap();
        assert_eq!(result.generated_files, vec!["/a.js"]);
    }

    #[test]
    fn test_build_result_rejections() {
        assert!(build_result(&json!([1, 2])).is_err());
        assert!(build_result(&json!({ "files": { "/a": { "code": "" } } })).is_err());
        assert!(build_result(&json!({ "description": "d", "files": null })).is_err());
        assert!(build_result(&json!({ "description": "d", "files": "nope" })).is_err());
        assert!(build_result(&json!({ "description": "d", "files": {} })).is_err());
        assert!(build_result(&json!({
            "description": "d",
            "files": { "/src": { "code": "x" }, "/src/a.js": { "code": "y" } }
        }))
        .is_err());
    }
}
