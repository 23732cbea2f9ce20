// ABOUTME: Canonical project file map keyed by normalized absolute paths
// ABOUTME: Path normalization, shallow merge and ancestor-conflict detection

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileMapError {
    #[error("Invalid file path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path conflict: '{file}' is a file but '{nested}' uses it as a directory")]
    PathConflict { file: String, nested: String },
}

type Result<T> = std::result::Result<T, FileMapError>;

/// Source code of a single project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub code: String,
}

impl FileRecord {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Normalize a project path to the canonical `/dir/file` form.
///
/// Backslashes become `/`, repeated separators and `.` segments collapse, a
/// leading `/` is added and a trailing one dropped. Empty paths and any `..`
/// segment are rejected so a path can never escape the project root.
pub fn normalize_path(raw: &str) -> Result<String> {
    let unified = raw.trim().replace('\\', "/");
    let mut segments = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(FileMapError::InvalidPath {
                    path: raw.to_string(),
                    reason: "path traversal sequences ('..') are not allowed".to_string(),
                })
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(FileMapError::InvalidPath {
            path: raw.to_string(),
            reason: "path does not name a file".to_string(),
        });
    }

    Ok(format!("/{}", segments.join("/")))
}

/// Mapping of normalized absolute path to file contents.
///
/// Serializes exactly as `{ "/path": { "code": "..." } }`. Deserialization
/// normalizes every key, so maps read from disk or the network obey the same
/// path rules as maps built in code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, FileRecord>",
    into = "BTreeMap<String, FileRecord>"
)]
pub struct FileMap {
    entries: BTreeMap<String, FileRecord>,
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(path, code)` pairs, normalizing every path
    pub fn from_entries<I, P, C>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut map = Self::new();
        for (path, code) in entries {
            map.insert(path.as_ref(), code)?;
        }
        Ok(map)
    }

    /// Insert or replace a file, returning the normalized path it was stored under
    pub fn insert(&mut self, path: &str, code: impl Into<String>) -> Result<String> {
        let normalized = normalize_path(path)?;
        self.entries
            .insert(normalized.clone(), FileRecord::new(code));
        Ok(normalized)
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.entries.get(path)
    }

    pub fn code(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(|record| record.code.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.entries.iter().map(|(path, record)| (path.as_str(), record))
    }

    /// Shallow merge: new paths are added and existing paths replaced.
    /// Nothing is ever removed.
    pub fn merge(&mut self, other: FileMap) {
        self.entries.extend(other.entries);
    }

    /// Merge into a copy, leaving both inputs untouched
    pub fn merged(&self, other: &FileMap) -> FileMap {
        let mut combined = self.clone();
        combined.merge(other.clone());
        combined
    }

    /// Fail if any path is used both as a file and as a directory of another path
    pub fn check_conflicts(&self) -> Result<()> {
        for path in self.entries.keys() {
            for (idx, _) in path.match_indices('/').skip(1) {
                let ancestor = &path[..idx];
                if self.entries.contains_key(ancestor) {
                    return Err(FileMapError::PathConflict {
                        file: ancestor.to_string(),
                        nested: path.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<BTreeMap<String, FileRecord>> for FileMap {
    type Error = FileMapError;

    fn try_from(raw: BTreeMap<String, FileRecord>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (path, record) in raw {
            entries.insert(normalize_path(&path)?, record);
        }
        Ok(Self { entries })
    }
}

impl From<FileMap> for BTreeMap<String, FileRecord> {
    fn from(map: FileMap) -> Self {
        map.entries
    }
}

impl<'a> IntoIterator for &'a FileMap {
    type Item = (&'a String, &'a FileRecord);
    type IntoIter = std::collections::btree_map::Iter<'a, String, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
