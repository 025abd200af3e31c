//! umlpress CLI - Markdown with `PlantUML` diagrams to PDF.
//!
//! Provides commands for:
//! - `build`: Render diagrams, rewrite the document and compile the PDF
//! - `list`: Show the diagram blocks of a document and their render targets

mod commands;
mod error;
mod logging;
mod output;

use clap::{Parser, Subcommand};

use commands::{BuildArgs, ListArgs};
use output::Output;

/// umlpress - Markdown with `PlantUML` diagrams to PDF.
#[derive(Parser)]
#[command(name = "umlpress", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render diagrams and build the PDF.
    Build(BuildArgs),
    /// List diagram blocks and their render targets.
    List(ListArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let result = match cli.command {
        Commands::Build(args) => args.execute(),
        Commands::List(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
