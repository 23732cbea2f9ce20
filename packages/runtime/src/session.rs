// ABOUTME: Sandbox session owning the container handle and the dev-server lifecycle
// ABOUTME: Serializes the one-time boot and drives Idle -> Installing -> Starting -> Ready

use crate::container::{
    Container, ContainerBackend, ContainerProcess, OutputChunk, ServerReady, SpawnedProcess,
};
use crate::local::LocalBackend;
use crate::types::*;
use chrono::{DateTime, Utc};
use draftly_config::{CommandSpec, RuntimeSettings};
use draftly_core::{FileMap, FileSystemTree};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Output lines retained for `logs()`
const MAX_LOG_ENTRIES: usize = 1000;

const EVENT_CHANNEL_CAPACITY: usize = 256;

type BootFuture = Shared<BoxFuture<'static, Result<Arc<dyn Container>, String>>>;

enum BootSlot {
    NotStarted,
    Booting { attempt: u64, future: BootFuture },
    Ready(Arc<dyn Container>),
    Failed(String),
}

impl BootSlot {
    fn state(&self) -> BootState {
        match self {
            BootSlot::NotStarted => BootState::NotStarted,
            BootSlot::Booting { .. } => BootState::Booting,
            BootSlot::Ready(_) => BootState::Ready,
            BootSlot::Failed(_) => BootState::Failed,
        }
    }
}

struct BootCell {
    slot: BootSlot,
    attempts: u64,
}

#[derive(Default)]
struct RunState {
    phase: InstallPhase,
    process: Option<Arc<dyn ContainerProcess>>,
    preview: Option<PreviewEndpoint>,
    last_error: Option<RuntimeError>,
    /// Bumped for every dev server spawned; stale exit/ready notifications are ignored
    generation: u64,
}

/// One preview session: a lazily booted container plus the install/run state machine.
///
/// Cloning is cheap and every clone drives the same session. The container
/// and the processes spawned in it are owned exclusively by the session.
#[derive(Clone)]
pub struct SandboxRuntime {
    backend: Arc<dyn ContainerBackend>,
    settings: Arc<RuntimeSettings>,
    boot: Arc<Mutex<BootCell>>,
    run: Arc<RwLock<RunState>>,
    logs: Arc<RwLock<VecDeque<RuntimeLog>>>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl SandboxRuntime {
    pub fn new(backend: Arc<dyn ContainerBackend>, settings: RuntimeSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            settings: Arc::new(settings),
            boot: Arc::new(Mutex::new(BootCell {
                slot: BootSlot::NotStarted,
                attempts: 0,
            })),
            run: Arc::new(RwLock::new(RunState::default())),
            logs: Arc::new(RwLock::new(VecDeque::new())),
            events,
        }
    }

    /// Session backed by local processes in the configured workspace directory
    pub fn local(settings: RuntimeSettings) -> Self {
        let backend = LocalBackend::from_settings(&settings);
        Self::new(Arc::new(backend), settings)
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Get the container, booting it on first use.
    ///
    /// Concurrent callers share one in-flight boot and all resolve to the same
    /// handle. A failed boot is reported to every caller awaiting that attempt
    /// and clears the slot so the next call starts a fresh attempt.
    pub async fn container(&self) -> RuntimeResult<Arc<dyn Container>> {
        let (attempt, boot) = {
            let mut cell = self.boot.lock().await;
            match &cell.slot {
                BootSlot::Ready(container) => return Ok(container.clone()),
                BootSlot::Booting { attempt, future } => (*attempt, future.clone()),
                BootSlot::NotStarted | BootSlot::Failed(_) => {
                    cell.attempts += 1;
                    let attempt = cell.attempts;
                    let backend = self.backend.clone();
                    let future = async move { backend.boot().await.map_err(|e| e.to_string()) }
                        .boxed()
                        .shared();
                    cell.slot = BootSlot::Booting {
                        attempt,
                        future: future.clone(),
                    };
                    info!("Booting sandbox (attempt {})", attempt);
                    self.emit(RuntimeEvent::BootStateChanged {
                        state: BootState::Booting,
                    });
                    (attempt, future)
                }
            }
        };

        let outcome = boot.await;

        {
            let mut cell = self.boot.lock().await;
            let settles = matches!(
                &cell.slot,
                BootSlot::Booting { attempt: current, .. } if *current == attempt
            );
            if settles {
                cell.slot = match &outcome {
                    Ok(container) => {
                        info!("Sandbox booted");
                        BootSlot::Ready(container.clone())
                    }
                    Err(reason) => {
                        error!("Sandbox boot failed: {}", reason);
                        BootSlot::Failed(reason.clone())
                    }
                };
                self.emit(RuntimeEvent::BootStateChanged {
                    state: cell.slot.state(),
                });
            }
        }

        outcome.map_err(RuntimeError::BootFailed)
    }

    pub async fn boot_state(&self) -> BootState {
        self.boot.lock().await.slot.state()
    }

    /// Write a file snapshot into the container, overlaying what is already there
    pub async fn mount(&self, files: &FileMap) -> RuntimeResult<()> {
        let container = self.container().await?;
        self.mount_into(container.as_ref(), files).await
    }

    async fn mount_into(&self, container: &dyn Container, files: &FileMap) -> RuntimeResult<()> {
        let tree = FileSystemTree::from_file_map(files)?;
        container
            .mount(&tree)
            .await
            .map_err(|e| RuntimeError::Mount(e.to_string()))?;
        info!("Mounted {} files into sandbox", tree.file_count());
        Ok(())
    }

    /// Mount `files`, install dependencies and launch the dev server.
    ///
    /// Only an Idle (or Error) session accepts a start; while a run is
    /// installing, starting or ready this returns
    /// [`StartOutcome::AlreadyActive`] without spawning anything. Returns once
    /// the dev server has been spawned; readiness is reported through
    /// [`RuntimeEvent::ServerReady`] or [`wait_until_ready`](Self::wait_until_ready).
    ///
    /// # Errors
    ///
    /// * `RuntimeError::BootFailed` - the container could not be booted
    /// * `RuntimeError::InstallFailed` - the install command exited non-zero
    /// * `RuntimeError::ProcessStartFailed` - a command could not be spawned
    ///
    /// Every error leaves the session in the `Error` phase.
    pub async fn start(&self, files: &FileMap) -> RuntimeResult<StartOutcome> {
        {
            let mut run = self.run.write().await;
            if run.phase.is_active() {
                info!("Start ignored, preview is already {}", run.phase.as_str());
                return Ok(StartOutcome::AlreadyActive(run.phase));
            }
            run.phase = InstallPhase::Installing;
            run.preview = None;
            run.last_error = None;
        }
        self.emit(RuntimeEvent::PhaseChanged {
            phase: InstallPhase::Installing,
        });

        match self.install_and_launch(files).await {
            Ok(()) => Ok(StartOutcome::Started),
            Err(e) => {
                error!("Failed to start preview: {}", e);
                self.add_log(LogSource::System, e.to_string()).await;
                {
                    let mut run = self.run.write().await;
                    run.phase = InstallPhase::Error;
                    run.last_error = Some(e.clone());
                }
                self.emit(RuntimeEvent::PhaseChanged {
                    phase: InstallPhase::Error,
                });
                Err(e)
            }
        }
    }

    async fn install_and_launch(&self, files: &FileMap) -> RuntimeResult<()> {
        let container = self.container().await?;
        self.mount_into(container.as_ref(), files).await?;

        let install_command = &self.settings.install_command;
        let install = self.spawn(container.as_ref(), install_command).await?;
        self.forward_output(LogSource::Install, install.output);

        let exit_code = install.exit.await.unwrap_or(-1);
        if exit_code != 0 {
            warn!("'{}' exited with code {}", install_command, exit_code);
            self.emit(RuntimeEvent::InstallFailed { exit_code });
            return Err(RuntimeError::InstallFailed { exit_code });
        }
        info!("Dependencies installed");

        self.set_phase(InstallPhase::Starting).await;

        // Subscribe before spawning so an early banner is not missed
        let ready = container.subscribe_server_ready();
        let dev = self
            .spawn(container.as_ref(), &self.settings.dev_command)
            .await?;

        let generation = {
            let mut run = self.run.write().await;
            run.generation += 1;
            run.process = Some(dev.process.clone());
            run.generation
        };
        self.forward_output(LogSource::DevServer, dev.output);
        tokio::spawn(self.clone().watch_dev_server(generation, ready, dev.exit));

        Ok(())
    }

    async fn spawn(
        &self,
        container: &dyn Container,
        command: &CommandSpec,
    ) -> RuntimeResult<SpawnedProcess> {
        self.add_log(LogSource::System, format!("$ {}", command)).await;
        container
            .spawn(command)
            .await
            .map_err(|e| RuntimeError::ProcessStartFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })
    }

    fn forward_output(&self, source: LogSource, mut output: mpsc::UnboundedReceiver<OutputChunk>) {
        let runtime = self.clone();
        tokio::spawn(async move {
            while let Some(chunk) = output.recv().await {
                runtime.emit(RuntimeEvent::Output {
                    source,
                    line: chunk.line.clone(),
                });
                runtime.add_log(source, chunk.line).await;
            }
        });
    }

    /// Follows one dev server from spawn to exit
    async fn watch_dev_server(
        self,
        generation: u64,
        mut ready: broadcast::Receiver<ServerReady>,
        mut exit: oneshot::Receiver<i32>,
    ) {
        let early_exit = tokio::select! {
            code = &mut exit => Some(code.unwrap_or(-1)),
            endpoint = next_server_ready(&mut ready) => {
                if let Some(endpoint) = endpoint {
                    self.mark_ready(generation, endpoint).await;
                }
                None
            }
        };
        // One readiness notification per run
        drop(ready);

        let exit_code = match early_exit {
            Some(code) => code,
            None => exit.await.unwrap_or(-1),
        };
        self.handle_exit(generation, exit_code).await;
    }

    async fn mark_ready(&self, generation: u64, endpoint: PreviewEndpoint) {
        {
            let mut run = self.run.write().await;
            if run.generation != generation
                || run.process.is_none()
                || run.phase != InstallPhase::Starting
            {
                debug!("Ignoring stale server-ready for {}", endpoint.url);
                return;
            }
            run.phase = InstallPhase::Ready;
            run.preview = Some(endpoint.clone());
        }

        info!("Preview ready at {}", endpoint.url);
        self.add_log(
            LogSource::System,
            format!("Preview available at {}", endpoint.url),
        )
        .await;
        self.emit(RuntimeEvent::ServerReady { endpoint });
        self.emit(RuntimeEvent::PhaseChanged {
            phase: InstallPhase::Ready,
        });
    }

    async fn handle_exit(&self, generation: u64, exit_code: i32) {
        let was_ready = {
            let mut run = self.run.write().await;
            if run.generation != generation || run.process.is_none() {
                debug!("Dev server exit (code {}) was already handled", exit_code);
                return;
            }
            let was_ready = run.phase == InstallPhase::Ready;
            run.phase = InstallPhase::Idle;
            run.process = None;
            run.preview = None;
            if was_ready {
                run.last_error = Some(RuntimeError::RuntimeCrashed { exit_code });
            }
            was_ready
        };

        warn!("Dev server exited with code {}", exit_code);
        self.add_log(
            LogSource::System,
            format!("Dev server exited with code {}", exit_code),
        )
        .await;
        self.emit(RuntimeEvent::ProcessExited { exit_code });
        if was_ready {
            self.emit(RuntimeEvent::RuntimeCrashed { exit_code });
        }
        self.emit(RuntimeEvent::PhaseChanged {
            phase: InstallPhase::Idle,
        });
    }

    /// Terminate the dev server, if any, and return to Idle.
    ///
    /// Safe to call when nothing is running: the phase is left untouched.
    /// Resolves only after the process has exited.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let process = self.run.write().await.process.take();
        let Some(process) = process else {
            debug!("No dev server running, nothing to stop");
            return Ok(());
        };

        info!("Stopping dev server with PID {:?}", process.id());
        self.add_log(
            LogSource::System,
            format!("Stopping dev server with PID: {:?}", process.id()),
        )
        .await;

        let killed = process.kill().await;
        self.reset_to_idle().await;

        killed.map_err(|e| {
            error!("Failed to stop dev server: {}", e);
            RuntimeError::ProcessStopFailed(e.to_string())
        })
    }

    /// `stop` followed by `start`; the old process has exited before the new install begins
    pub async fn restart(&self, files: &FileMap) -> RuntimeResult<StartOutcome> {
        info!("Restarting preview");
        self.stop().await?;
        self.start(files).await
    }

    /// Best-effort teardown bounded by the configured cleanup timeout
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        let limit = self.settings.cleanup_timeout;
        match tokio::time::timeout(limit, self.stop()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Dev server did not stop within {:?}, abandoning it", limit);
                self.reset_to_idle().await;
                Err(RuntimeError::ProcessStopFailed(format!(
                    "timed out after {:?}",
                    limit
                )))
            }
        }
    }

    async fn reset_to_idle(&self) {
        {
            let mut run = self.run.write().await;
            run.phase = InstallPhase::Idle;
            run.preview = None;
        }
        self.emit(RuntimeEvent::PhaseChanged {
            phase: InstallPhase::Idle,
        });
    }

    /// Wait for the current run to reach Ready.
    ///
    /// Fails early with the install or crash error when the run ends before
    /// the preview becomes reachable.
    pub async fn wait_until_ready(&self, timeout: Duration) -> RuntimeResult<PreviewEndpoint> {
        let mut events = self.subscribe();

        {
            let run = self.run.read().await;
            match (run.phase, &run.preview, &run.last_error) {
                (InstallPhase::Ready, Some(endpoint), _) => return Ok(endpoint.clone()),
                (InstallPhase::Error, _, Some(error)) => return Err(error.clone()),
                _ => {}
            }
        }

        let wait = async {
            loop {
                match events.recv().await {
                    Ok(RuntimeEvent::ServerReady { endpoint }) => return Ok(endpoint),
                    Ok(RuntimeEvent::InstallFailed { exit_code }) => {
                        return Err(RuntimeError::InstallFailed { exit_code })
                    }
                    Ok(RuntimeEvent::ProcessExited { exit_code }) => {
                        return Err(RuntimeError::RuntimeCrashed { exit_code })
                    }
                    Ok(RuntimeEvent::PhaseChanged {
                        phase: InstallPhase::Error,
                    }) => {
                        if let Some(error) = &self.run.read().await.last_error {
                            return Err(error.clone());
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return Err(RuntimeError::ReadyTimeout(timeout)),
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .unwrap_or(Err(RuntimeError::ReadyTimeout(timeout)))
    }

    pub async fn status(&self) -> RuntimeStatus {
        let boot_state = self.boot_state().await;
        let run = self.run.read().await;
        RuntimeStatus {
            boot_state,
            install_phase: run.phase,
            preview: run.preview.clone(),
            last_error: run.last_error.as_ref().map(ToString::to_string),
            dev_server_running: run.process.is_some(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RuntimeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn set_phase(&self, phase: InstallPhase) {
        self.run.write().await.phase = phase;
        self.emit(RuntimeEvent::PhaseChanged { phase });
    }

    async fn add_log(&self, source: LogSource, message: String) {
        let entry = RuntimeLog {
            timestamp: Utc::now(),
            source,
            message,
        };

        let mut logs = self.logs.write().await;
        logs.push_back(entry);
        if logs.len() > MAX_LOG_ENTRIES {
            logs.pop_front();
        }
    }

    /// Captured output, optionally only entries newer than `since`, keeping the last `limit`
    pub async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<RuntimeLog> {
        let logs = self.logs.read().await;
        let mut filtered: Vec<RuntimeLog> = logs
            .iter()
            .filter(|log| since.map_or(true, |since| log.timestamp > since))
            .cloned()
            .collect();

        if let Some(max_count) = limit {
            if filtered.len() > max_count {
                filtered.drain(..filtered.len() - max_count);
            }
        }

        filtered
    }

    pub async fn clear_logs(&self) {
        self.logs.write().await.clear();
        info!("Cleared sandbox logs");
    }
}

async fn next_server_ready(
    ready: &mut broadcast::Receiver<ServerReady>,
) -> Option<PreviewEndpoint> {
    loop {
        match ready.recv().await {
            Ok(server) => return Some(server.into()),
            Err(RecvError::Lagged(skipped)) => {
                debug!("Skipped {} server-ready notifications", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
