use anyhow::{Context, Result};
use colored::*;
use draftly_cli::write_project;
use draftly_core::default_project;
use std::path::PathBuf;

pub fn run(out: Option<PathBuf>) -> Result<()> {
    let files = default_project();

    match out {
        Some(dir) => {
            let written = write_project(&dir, &files)
                .with_context(|| format!("Failed to write template to {}", dir.display()))?;
            println!(
                "{} Wrote {} files to {}",
                "✓".green(),
                written,
                dir.display()
            );
        }
        None => {
            let json = serde_json::to_string_pretty(&files)?;
            println!("{}", json);
        }
    }

    Ok(())
}
