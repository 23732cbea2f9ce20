// ABOUTME: Scriptable in-memory container backend for runtime lifecycle tests
// ABOUTME: Lets tests decide when boots fail, when processes exit and when servers become ready

#![allow(dead_code)]

use async_trait::async_trait;
use draftly_config::{CommandSpec, RuntimeSettings};
use draftly_core::{FileMap, FileSystemTree};
use draftly_runtime::container::Result;
use draftly_runtime::{
    Container, ContainerBackend, ContainerError, ContainerProcess, InstallPhase, OutputChunk,
    RuntimeEvent, SandboxRuntime, ServerReady, SpawnedProcess, StreamType,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub struct MockBackend {
    pub container: Arc<MockContainer>,
    boots: AtomicUsize,
    failures_left: AtomicUsize,
    boot_delay: Duration,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Self::failing(0)
    }

    /// Backend whose first `times` boots fail
    pub fn failing(times: usize) -> Arc<Self> {
        Arc::new(Self {
            container: Arc::new(MockContainer::new()),
            boots: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(times),
            boot_delay: Duration::from_millis(20),
        })
    }

    pub fn boot_count(&self) -> usize {
        self.boots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerBackend for MockBackend {
    async fn boot(&self) -> Result<Arc<dyn Container>> {
        self.boots.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.boot_delay).await;

        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(ContainerError::Boot("simulated boot failure".to_string()));
        }

        let container: Arc<dyn Container> = self.container.clone();
        Ok(container)
    }
}

pub struct MockContainer {
    spawned: Mutex<Vec<MockSpawn>>,
    mounts: Mutex<Vec<FileSystemTree>>,
    /// Exit code install processes finish with immediately; `None` keeps them running
    install_exit: Mutex<Option<i32>>,
    hang_on_kill: AtomicBool,
    server_ready: broadcast::Sender<ServerReady>,
}

#[derive(Clone)]
pub struct MockSpawn {
    pub command: CommandSpec,
    pub process: Arc<MockProcess>,
}

impl MockContainer {
    fn new() -> Self {
        let (server_ready, _) = broadcast::channel(8);
        Self {
            spawned: Mutex::new(Vec::new()),
            mounts: Mutex::new(Vec::new()),
            install_exit: Mutex::new(Some(0)),
            hang_on_kill: AtomicBool::new(false),
            server_ready,
        }
    }

    pub fn set_install_exit(&self, code: Option<i32>) {
        *self.install_exit.lock().unwrap() = code;
    }

    /// Processes spawned afterwards never finish when killed
    pub fn set_hang_on_kill(&self, hang: bool) {
        self.hang_on_kill.store(hang, Ordering::SeqCst);
    }

    pub fn announce_ready(&self, port: u16) {
        let _ = self.server_ready.send(ServerReady {
            port,
            url: format!("http://localhost:{}", port),
        });
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }

    pub fn process(&self, index: usize) -> Arc<MockProcess> {
        self.spawned.lock().unwrap()[index].process.clone()
    }

    pub fn installs(&self) -> Vec<MockSpawn> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .filter(|spawn| is_install(&spawn.command))
            .cloned()
            .collect()
    }

    pub fn dev_servers(&self) -> Vec<MockSpawn> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .filter(|spawn| !is_install(&spawn.command))
            .cloned()
            .collect()
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.lock().unwrap().len()
    }

    pub fn last_mount(&self) -> Option<FileSystemTree> {
        self.mounts.lock().unwrap().last().cloned()
    }
}

fn is_install(command: &CommandSpec) -> bool {
    command.args.first().map(String::as_str) == Some("install")
}

#[async_trait]
impl Container for MockContainer {
    async fn mount(&self, tree: &FileSystemTree) -> Result<()> {
        self.mounts.lock().unwrap().push(tree.clone());
        Ok(())
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<SpawnedProcess> {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        let process = {
            let mut spawned = self.spawned.lock().unwrap();
            let process = Arc::new(MockProcess {
                pid: 100 + spawned.len() as u32,
                exit: Mutex::new(Some(exit_tx)),
                output: Mutex::new(Some(output_tx)),
                killed: AtomicBool::new(false),
                hang_on_kill: self.hang_on_kill.load(Ordering::SeqCst),
            });
            spawned.push(MockSpawn {
                command: command.clone(),
                process: process.clone(),
            });
            process
        };

        if is_install(command) {
            process.print("Packages: +42");
            let exit = *self.install_exit.lock().unwrap();
            if let Some(code) = exit {
                process.finish(code);
            }
        }

        Ok(SpawnedProcess {
            process: process.clone(),
            output: output_rx,
            exit: exit_rx,
        })
    }

    fn subscribe_server_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.server_ready.subscribe()
    }
}

pub struct MockProcess {
    pid: u32,
    exit: Mutex<Option<oneshot::Sender<i32>>>,
    output: Mutex<Option<mpsc::UnboundedSender<OutputChunk>>>,
    killed: AtomicBool,
    hang_on_kill: bool,
}

impl MockProcess {
    pub fn print(&self, line: &str) {
        if let Some(output) = self.output.lock().unwrap().as_ref() {
            let _ = output.send(OutputChunk::new(StreamType::Stdout, line));
        }
    }

    /// Exit with `code`; later calls are ignored
    pub fn finish(&self, code: i32) {
        self.output.lock().unwrap().take();
        if let Some(exit) = self.exit.lock().unwrap().take() {
            let _ = exit.send(code);
        }
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerProcess for MockProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn kill(&self) -> Result<()> {
        if self.hang_on_kill {
            std::future::pending::<()>().await;
        }
        self.killed.store(true, Ordering::SeqCst);
        self.finish(-1);
        Ok(())
    }
}

pub fn test_settings() -> RuntimeSettings {
    let mut settings = RuntimeSettings::with_workspace_dir("/nonexistent/draftly-mock");
    settings.cleanup_timeout = Duration::from_millis(200);
    settings
}

pub fn setup() -> (SandboxRuntime, Arc<MockBackend>) {
    let backend = MockBackend::new();
    let runtime = SandboxRuntime::new(backend.clone(), test_settings());
    (runtime, backend)
}

pub fn sample_files() -> FileMap {
    FileMap::from_entries([
        ("/package.json", r#"{"name":"demo"}"#),
        ("/src/App.jsx", "export default function App() { return null; }"),
    ])
    .unwrap()
}

pub async fn wait_for_phase(runtime: &SandboxRuntime, phase: InstallPhase) {
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        if runtime.status().await.install_phase == phase {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for phase {:?}",
            phase
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_spawns(container: &MockContainer, count: usize) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while container.spawn_count() < count {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {} spawns",
            count
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Collect events until one matches `done`, returning everything seen including it
pub async fn events_until<F>(
    events: &mut broadcast::Receiver<RuntimeEvent>,
    done: F,
) -> Vec<RuntimeEvent>
where
    F: Fn(&RuntimeEvent) -> bool,
{
    let mut seen = Vec::new();
    let collect = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let finished = done(&event);
                    seen.push(event);
                    if finished {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    };
    tokio::time::timeout(WAIT_LIMIT, collect)
        .await
        .expect("timed out waiting for event");
    seen
}

pub fn drain_events(events: &mut broadcast::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

pub fn phases(events: &[RuntimeEvent]) -> Vec<InstallPhase> {
    events
        .iter()
        .filter_map(|event| match event {
            RuntimeEvent::PhaseChanged { phase } => Some(*phase),
            _ => None,
        })
        .collect()
}
