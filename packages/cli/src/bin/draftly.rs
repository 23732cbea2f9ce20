use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;

mod cli;

#[derive(Parser)]
#[command(name = "draftly")]
#[command(about = "Draftly CLI - generate web projects and preview them in a sandbox")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a generation result from a raw model response
    Extract {
        /// File holding the raw response (stdin when omitted)
        input: Option<PathBuf>,
        /// Write the extracted files below this directory
        #[arg(short, long)]
        write: Option<PathBuf>,
    },
    /// Generate or modify a project from a natural-language request
    Generate {
        /// What to build or change
        request: String,
        /// Existing project directory (starter template when omitted)
        #[arg(short, long)]
        project: Option<PathBuf>,
        /// Output directory for the merged project
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Install and run a project, then serve its preview until Ctrl+C
    Preview {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },
    /// Print or write the starter project template
    Template {
        /// Write the template below this directory instead of printing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    draftly_cli::logging::init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Extract { input, write } => cli::extract::run(input, write),
        Commands::Generate {
            request,
            project,
            out,
        } => cli::generate::run(&request, project, out).await,
        Commands::Preview { project } => cli::preview::run(&project).await,
        Commands::Template { out } => cli::template::run(out),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
