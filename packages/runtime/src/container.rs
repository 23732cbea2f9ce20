// ABOUTME: Capability traits for the isolated environment that hosts a preview
// ABOUTME: Defines boot, mount, spawn and server-ready primitives plus process output types

use async_trait::async_trait;
use draftly_config::CommandSpec;
use draftly_core::FileSystemTree;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Boot error: {0}")]
    Boot(String),

    #[error("Mount error: {0}")]
    Mount(String),

    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Kill error: {0}")]
    Kill(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContainerError>;

/// Emitted once a process inside the container is serving on a reachable port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Stdout,
    Stderr,
}

/// One line of output from a spawned process
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub stream: StreamType,
    pub line: String,
}

impl OutputChunk {
    pub fn new(stream: StreamType, line: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            stream,
            line: line.into(),
        }
    }
}

/// Handles returned by [`Container::spawn`].
///
/// `output` closes once the process's streams are drained; `exit` resolves
/// with the exit code (`-1` when the process was terminated by a signal).
pub struct SpawnedProcess {
    pub process: Arc<dyn ContainerProcess>,
    pub output: mpsc::UnboundedReceiver<OutputChunk>,
    pub exit: oneshot::Receiver<i32>,
}

/// Creates the container. Booting is expensive and must not be re-entered;
/// callers coordinate through the session's boot accessor.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    async fn boot(&self) -> Result<Arc<dyn Container>>;
}

#[async_trait]
pub trait Container: Send + Sync {
    /// Write a tree into the container filesystem, overlaying existing files
    async fn mount(&self, tree: &FileSystemTree) -> Result<()>;

    /// Start a command in the container's project directory
    async fn spawn(&self, command: &CommandSpec) -> Result<SpawnedProcess>;

    /// Listen for "port became reachable" notifications
    fn subscribe_server_ready(&self) -> broadcast::Receiver<ServerReady>;
}

#[async_trait]
pub trait ContainerProcess: Send + Sync {
    fn id(&self) -> Option<u32>;

    /// Terminate the process. Resolves once it has actually exited.
    async fn kill(&self) -> Result<()>;
}
