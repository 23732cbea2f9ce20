// ABOUTME: Sandbox runtime for Draftly previews
// ABOUTME: Boots an isolated container once per session and manages the install/run lifecycle

pub mod container;
pub mod local;
pub mod ports;
pub mod preview;
pub mod session;
pub mod types;

pub use container::{
    Container, ContainerBackend, ContainerError, ContainerProcess, OutputChunk, ServerReady,
    SpawnedProcess, StreamType,
};
pub use local::{LocalBackend, LocalContainer};
pub use preview::probe_preview;
pub use session::SandboxRuntime;
pub use types::{
    BootState, InstallPhase, LogSource, PreviewEndpoint, RuntimeError, RuntimeEvent, RuntimeLog,
    RuntimeResult, RuntimeStatus, StartOutcome,
};
