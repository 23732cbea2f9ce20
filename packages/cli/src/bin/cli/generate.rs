use anyhow::{Context, Result};
use colored::*;
use draftly_ai::{CodeGenerator, CompletionClient, GenerationOutcome};
use draftly_cli::{load_project, write_project};
use draftly_core::default_project;
use std::path::PathBuf;
use tracing::info;

use super::print_file_list;

pub async fn run(request: &str, project: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let current = match &project {
        Some(dir) => load_project(dir)
            .with_context(|| format!("Failed to load project from {}", dir.display()))?,
        None => default_project(),
    };
    info!("Generating against {} existing files", current.len());

    let client = CompletionClient::from_env().context("Invalid AI configuration")?;
    let generator = CodeGenerator::new(client);

    println!("{}", "Generating...".blue().bold());
    match generator.generate(&current, request).await? {
        GenerationOutcome::Complete { result, files } => {
            println!("{}", result.description.bold());
            if !result.generated_files.is_empty() {
                println!("{}", "New files:".dimmed());
                for path in &result.generated_files {
                    println!("  {}", path.green());
                }
            }
            println!("{}", "Changed files:".dimmed());
            print_file_list(&result.files);

            let target = out.or(project);
            match target {
                Some(dir) => {
                    let written = write_project(&dir, &files)
                        .with_context(|| format!("Failed to write project to {}", dir.display()))?;
                    println!("{} Wrote {} files to {}", "✓".green(), written, dir.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&files)?),
            }
        }
        GenerationOutcome::Partial { description } => {
            eprintln!(
                "{} Response was truncated; no files were changed",
                "Warning:".yellow().bold()
            );
            println!("{}", description);
        }
    }

    Ok(())
}
