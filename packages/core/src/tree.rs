// ABOUTME: Nested directory/file tree built from a FileMap for sandbox mounting
// ABOUTME: Serializes in the `{ name: { directory | file: { contents } } }` mount format

use crate::files::FileMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Path conflict at '{path}': used as both a file and a directory")]
    Conflict { path: String },
}

/// A single node of the mount tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsNode {
    Directory(BTreeMap<String, FsNode>),
    File { contents: String },
}

/// Root of a virtual file system tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSystemTree {
    root: BTreeMap<String, FsNode>,
}

impl FileSystemTree {
    /// Build the nested tree for every path in `files`.
    ///
    /// Fails when a path component is used both as a file and as a directory.
    pub fn from_file_map(files: &FileMap) -> Result<Self, TreeError> {
        let mut root = BTreeMap::new();

        for (path, record) in files.iter() {
            let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
            let Some((file_name, parents)) = components.split_last() else {
                continue;
            };

            let mut current = &mut root;
            let mut walked = String::new();
            for dir in parents {
                walked.push('/');
                walked.push_str(dir);
                let node = current
                    .entry((*dir).to_string())
                    .or_insert_with(|| FsNode::Directory(BTreeMap::new()));
                current = match node {
                    FsNode::Directory(children) => children,
                    FsNode::File { .. } => return Err(TreeError::Conflict { path: walked }),
                };
            }

            if let Some(FsNode::Directory(_)) = current.get(*file_name) {
                return Err(TreeError::Conflict {
                    path: path.to_string(),
                });
            }
            current.insert(
                (*file_name).to_string(),
                FsNode::File {
                    contents: record.code.clone(),
                },
            );
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &BTreeMap<String, FsNode> {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Flatten back into `(absolute path, contents)` pairs in path order
    pub fn files(&self) -> Vec<(String, &str)> {
        let mut out = Vec::new();
        collect_files(&self.root, "", &mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }
}

fn collect_files<'a>(
    nodes: &'a BTreeMap<String, FsNode>,
    prefix: &str,
    out: &mut Vec<(String, &'a str)>,
) {
    for (name, node) in nodes {
        let path = format!("{}/{}", prefix, name);
        match node {
            FsNode::Directory(children) => collect_files(children, &path, out),
            FsNode::File { contents } => out.push((path, contents.as_str())),
        }
    }
}
