use anyhow::{Context, Result};
use colored::*;
use draftly_cli::write_project;
use draftly_extract::{extract, ExtractionError};
use std::io::Read;
use std::path::PathBuf;
use std::{fs, io};

use super::print_file_list;

pub fn run(input: Option<PathBuf>, write: Option<PathBuf>) -> Result<()> {
    let raw = match &input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read response from stdin")?;
            buf
        }
    };

    let result = match extract(&raw) {
        Ok(result) => result,
        Err(e) => {
            report_sample(&e);
            return Err(e.into());
        }
    };

    if result.is_partial() {
        eprintln!(
            "{} Response was truncated; only the description could be recovered",
            "Warning:".yellow().bold()
        );
    }

    match write {
        Some(dir) => {
            let written = write_project(&dir, &result.files)
                .with_context(|| format!("Failed to write files to {}", dir.display()))?;
            println!("{}", result.description.bold());
            print_file_list(&result.files);
            println!("{} Wrote {} files to {}", "✓".green(), written, dir.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

fn report_sample(error: &ExtractionError) {
    if let Some(sample) = error.sample() {
        eprintln!(
            "{}",
            format!("Response length: {} chars", sample.length).dimmed()
        );
        eprintln!("{}", sample.preview.dimmed());
    }
}
