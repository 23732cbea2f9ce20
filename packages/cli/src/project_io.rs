use draftly_core::{FileMap, FileMapError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never loaded into a project file map
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", ".next", "build"];

#[derive(Error, Debug)]
pub enum ProjectIoError {
    #[error("Project directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to walk project directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file map JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    FileMap(#[from] FileMapError),
}

pub type Result<T> = std::result::Result<T, ProjectIoError>;

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIPPED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Read every UTF-8 text file under `dir` into a file map keyed by project path
pub fn load_project(dir: &Path) -> Result<FileMap> {
    if !dir.is_dir() {
        return Err(ProjectIoError::NotFound(dir.to_path_buf()));
    }

    let mut files = FileMap::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(dir) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let bytes = fs::read(entry.path()).map_err(|source| ProjectIoError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        match String::from_utf8(bytes) {
            Ok(code) => {
                files.insert(&relative.to_string_lossy(), code)?;
            }
            Err(_) => debug!("Skipping binary file {}", entry.path().display()),
        }
    }

    Ok(files)
}

/// Write a file map below `dir`, creating parent directories as needed
pub fn write_project(dir: &Path, files: &FileMap) -> Result<usize> {
    files.check_conflicts()?;

    let mut written = 0;
    for (path, record) in files.iter() {
        let target = dir.join(path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ProjectIoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, &record.code).map_err(|source| ProjectIoError::Io {
            path: target.clone(),
            source,
        })?;
        written += 1;
    }

    if written == 0 {
        warn!("No files written to {}", dir.display());
    }
    Ok(written)
}

/// Read a `{ "/path": { "code": "..." } }` document from disk
pub fn read_file_map_json(path: &Path) -> Result<FileMap> {
    let content = fs::read_to_string(path).map_err(|source| ProjectIoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ProjectIoError::Json {
        path: path.to_path_buf(),
        source,
    })
}
