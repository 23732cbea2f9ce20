// ABOUTME: Core types shared by the Draftly extraction and sandbox runtime crates
// ABOUTME: Canonical file map, path normalization and the nested mount tree

pub mod files;
pub mod templates;
pub mod tree;

// Re-export main types
pub use files::{normalize_path, FileMap, FileMapError, FileRecord};
pub use tree::{FileSystemTree, FsNode, TreeError};

// Re-export templates
pub use templates::default_project;
