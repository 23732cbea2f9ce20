// ABOUTME: Local process backend for the sandbox runtime
// ABOUTME: Boots into a workspace directory and runs commands with tokio::process

use crate::container::{
    Container, ContainerBackend, ContainerError, ContainerProcess, OutputChunk, Result,
    ServerReady, SpawnedProcess, StreamType,
};
use crate::ports::{extract_port_from_log, localhost_url};
use async_trait::async_trait;
use draftly_config::{CommandSpec, RuntimeSettings};
use draftly_core::FileSystemTree;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tracing::{debug, info, warn};

/// How long a process group gets between SIGTERM and SIGKILL
const TERM_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Boots a [`LocalContainer`] rooted at a workspace directory on this machine
#[derive(Debug, Clone)]
pub struct LocalBackend {
    workspace_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.workspace_dir.clone())
    }
}

#[async_trait]
impl ContainerBackend for LocalBackend {
    async fn boot(&self) -> Result<Arc<dyn Container>> {
        fs::create_dir_all(&self.workspace_dir).await.map_err(|e| {
            ContainerError::Boot(format!(
                "cannot create workspace {}: {}",
                self.workspace_dir.display(),
                e
            ))
        })?;

        info!("Booted local sandbox at {}", self.workspace_dir.display());
        Ok(Arc::new(LocalContainer::new(self.workspace_dir.clone())))
    }
}

pub struct LocalContainer {
    root: PathBuf,
    server_ready: broadcast::Sender<ServerReady>,
}

impl LocalContainer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (server_ready, _) = broadcast::channel(16);
        Self {
            root: root.into(),
            server_ready,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Container for LocalContainer {
    async fn mount(&self, tree: &FileSystemTree) -> Result<()> {
        for (path, contents) in tree.files() {
            let target = self.root.join(path.trim_start_matches('/'));
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    ContainerError::Mount(format!("{}: {}", parent.display(), e))
                })?;
            }
            fs::write(&target, contents)
                .await
                .map_err(|e| ContainerError::Mount(format!("{}: {}", path, e)))?;
        }

        debug!(
            "Wrote {} files under {}",
            tree.file_count(),
            self.root.display()
        );
        Ok(())
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<SpawnedProcess> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so wrappers like `npm run dev` stop together with the server they fork
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ContainerError::Spawn(format!("{}: {}", command, e)))?;

        let pid = child.id();
        info!("Spawned '{}' with PID {:?}", command, pid);

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let announced = Arc::new(AtomicBool::new(false));

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(
                stdout,
                StreamType::Stdout,
                output_tx.clone(),
                self.server_ready.clone(),
                announced.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            // Some servers print their banner on stderr
            tokio::spawn(forward_lines(
                stderr,
                StreamType::Stderr,
                output_tx,
                self.server_ready.clone(),
                announced,
            ));
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = watch::channel(false);
        let label = command.to_string();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = kill_rx => terminate(&mut child, &label).await,
            };

            // Members of the group can outlive the leader and keep the port and pipes open
            #[cfg(unix)]
            {
                if let Some(pid) = pid {
                    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
                }
            }

            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!("Failed to wait on '{}': {}", label, e);
                    -1
                }
            };
            debug!("'{}' exited with code {}", label, code);

            let _ = exit_tx.send(code);
            let _ = done_tx.send(true);
        });

        Ok(SpawnedProcess {
            process: Arc::new(LocalProcess {
                pid,
                kill: Mutex::new(Some(kill_tx)),
                done: done_rx,
            }),
            output: output_rx,
            exit: exit_rx,
        })
    }

    fn subscribe_server_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.server_ready.subscribe()
    }
}

/// Stop `child` and everything it forked: SIGTERM to the process group, then
/// SIGKILL once the grace period runs out.
async fn terminate(child: &mut Child, label: &str) -> std::io::Result<std::process::ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        if let Some(pid) = child.id() {
            signal_group(pid, Signal::SIGTERM);
            match tokio::time::timeout(TERM_GRACE_PERIOD, child.wait()).await {
                Ok(status) => return status,
                Err(_) => {
                    warn!(
                        "'{}' did not stop within {:?}, sending SIGKILL",
                        label, TERM_GRACE_PERIOD
                    );
                    signal_group(pid, Signal::SIGKILL);
                    return child.wait().await;
                }
            }
        }
    }

    if let Err(e) = child.start_kill() {
        warn!("Failed to signal '{}': {}", label, e);
    }
    child.wait().await
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), signal) {
        Ok(()) => debug!("Sent {:?} to process group {}", signal, pgid),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to send {:?} to process group {}: {}", signal, pgid, e),
    }
}

async fn forward_lines<R>(
    reader: R,
    stream: StreamType,
    output: mpsc::UnboundedSender<OutputChunk>,
    server_ready: broadcast::Sender<ServerReady>,
    announced: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(port) = extract_port_from_log(&line) {
            if !announced.swap(true, Ordering::SeqCst) {
                info!("Detected dev server on port {}", port);
                let _ = server_ready.send(ServerReady {
                    port,
                    url: localhost_url(port),
                });
            }
        }

        // Keep draining after the receiver is gone so the child never blocks on a full pipe
        let _ = output.send(OutputChunk::new(stream, line));
    }
}

struct LocalProcess {
    pid: Option<u32>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
    done: watch::Receiver<bool>,
}

#[async_trait]
impl ContainerProcess for LocalProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn kill(&self) -> Result<()> {
        if let Some(kill) = self.kill.lock().await.take() {
            let _ = kill.send(());
        }

        let mut done = self.done.clone();
        done.wait_for(|finished| *finished)
            .await
            .map(|_| ())
            .map_err(|_| ContainerError::Kill(format!("lost track of process {:?}", self.pid)))
    }
}
