use anyhow::{Context, Result};
use colored::*;
use draftly_cli::load_project;
use draftly_config::RuntimeSettings;
use draftly_runtime::{probe_preview, LogSource, RuntimeEvent, SandboxRuntime, StartOutcome};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(project: &Path) -> Result<()> {
    let files = load_project(project)
        .with_context(|| format!("Failed to load project from {}", project.display()))?;
    let settings = RuntimeSettings::from_env().context("Invalid runtime configuration")?;
    let ready_timeout = settings.ready_timeout;

    println!(
        "{} {} files into {}",
        "Mounting".blue().bold(),
        files.len(),
        settings.workspace_dir.display()
    );

    let runtime = SandboxRuntime::local(settings);
    let mut events = runtime.subscribe();

    if let StartOutcome::AlreadyActive(phase) = runtime.start(&files).await? {
        warn!("Runtime already {}", phase.as_str());
    }

    let endpoint = tokio::select! {
        ready = runtime.wait_until_ready(ready_timeout) => ready,
        _ = tokio::signal::ctrl_c() => {
            runtime.shutdown().await?;
            return Ok(());
        }
    };
    let endpoint = match endpoint {
        Ok(endpoint) => endpoint,
        Err(e) => {
            print_recent_output(&runtime).await;
            runtime.shutdown().await.ok();
            return Err(e.into());
        }
    };

    match probe_preview(&endpoint.url, PROBE_TIMEOUT).await {
        Ok(status) => println!(
            "{} {} (HTTP {})",
            "Preview ready:".green().bold(),
            endpoint.url,
            status
        ),
        Err(e) => println!(
            "{} {} ({})",
            "Preview started:".yellow().bold(),
            endpoint.url,
            e
        ),
    }
    println!("{}", "Press Ctrl+C to stop".dimmed());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RuntimeEvent::Output {
                    source: LogSource::DevServer,
                    line,
                }) => println!("{}", line.dimmed()),
                Ok(RuntimeEvent::ProcessExited { exit_code }) => {
                    if let Some(error) = runtime.status().await.last_error {
                        anyhow::bail!(error);
                    }
                    println!("{}", format!("Dev server exited with code {}", exit_code).yellow());
                    return Ok(());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} runtime events", skipped),
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("{}", "Stopping dev server...".blue());
    runtime.shutdown().await?;
    Ok(())
}

async fn print_recent_output(runtime: &SandboxRuntime) {
    let logs = runtime.logs(None, Some(20)).await;
    for log in logs {
        eprintln!("{}", log.message.dimmed());
    }
}
