use crate::container::ServerReady;
use chrono::{DateTime, Utc};
use draftly_core::TreeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Progress of the one-time container boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootState {
    NotStarted,
    Booting,
    Ready,
    Failed,
}

impl BootState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootState::NotStarted => "not_started",
            BootState::Booting => "booting",
            BootState::Ready => "ready",
            BootState::Failed => "failed",
        }
    }
}

/// Run sub-state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPhase {
    #[default]
    Idle,
    Installing,
    Starting,
    Ready,
    Error,
}

impl InstallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallPhase::Idle => "idle",
            InstallPhase::Installing => "installing",
            InstallPhase::Starting => "starting",
            InstallPhase::Ready => "ready",
            InstallPhase::Error => "error",
        }
    }

    /// Phases in which a new `start` is refused
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            InstallPhase::Installing | InstallPhase::Starting | InstallPhase::Ready
        )
    }
}

/// Where the running preview can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewEndpoint {
    pub port: u16,
    pub url: String,
}

impl From<ServerReady> for PreviewEndpoint {
    fn from(ready: ServerReady) -> Self {
        Self {
            port: ready.port,
            url: ready.url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Install,
    DevServer,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeLog {
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub message: String,
}

/// Lifecycle notifications for whoever renders the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    BootStateChanged { state: BootState },
    PhaseChanged { phase: InstallPhase },
    Output { source: LogSource, line: String },
    ServerReady { endpoint: PreviewEndpoint },
    InstallFailed { exit_code: i32 },
    ProcessExited { exit_code: i32 },
    RuntimeCrashed { exit_code: i32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub boot_state: BootState,
    pub install_phase: InstallPhase,
    pub preview: Option<PreviewEndpoint>,
    pub last_error: Option<String>,
    pub dev_server_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Install succeeded and the dev server was spawned
    Started,
    /// A run was already in progress; nothing was spawned
    AlreadyActive(InstallPhase),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Sandbox failed to boot: {0}")]
    BootFailed(String),

    #[error("Dependency installation failed with exit code {exit_code}")]
    InstallFailed { exit_code: i32 },

    #[error("Dev server crashed with exit code {exit_code}")]
    RuntimeCrashed { exit_code: i32 },

    #[error("Preview at {url} is unreachable: {reason}")]
    PreviewUnreachable { url: String, reason: String },

    #[error("Failed to start '{command}': {reason}")]
    ProcessStartFailed { command: String, reason: String },

    #[error("Failed to stop dev server: {0}")]
    ProcessStopFailed(String),

    #[error("Dev server did not become ready within {0:?}")]
    ReadyTimeout(Duration),

    #[error("Failed to mount files: {0}")]
    Mount(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
