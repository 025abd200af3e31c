//! `umlpress list` command implementation.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use umlpress_builder::BuildSettings;
use umlpress_config::{CliSettings, Config};
use umlpress_diagrams::extract_blocks;

use crate::error::CliError;
use crate::logging;
use crate::output::Output;

/// Arguments for the list command.
#[derive(Args)]
pub(crate) struct ListArgs {
    /// Markdown document to inspect (overrides config).
    #[arg(env = "UMLPRESS_INPUT")]
    input: Option<PathBuf>,

    /// Markdown document, as a flag; wins over the positional argument.
    #[arg(long = "input", value_name = "INPUT")]
    input_flag: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover umlpress.toml).
    #[arg(short, long, env = "UMLPRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Show logs on stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl ListArgs {
    /// Print every diagram block with its render target and cache state.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        logging::init(self.verbose, None)?;

        let cli_settings = CliSettings {
            input: self.input_flag.or(self.input),
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let settings = BuildSettings::from_config(&config)?;

        let text = fs::read_to_string(&settings.input)?;
        let blocks = extract_blocks(&text);
        if blocks.is_empty() {
            output.info(&format!("No diagrams in {}", settings.input.display()));
            return Ok(());
        }

        output.highlight(&format!(
            "{} diagram(s) in {}",
            blocks.len(),
            settings.input.display()
        ));
        let dispatch = settings.dispatch_settings();
        for block in &blocks {
            let (job, warnings) = dispatch.prepare_job(block);
            let state = if job.target.exists() { "cached" } else { "pending" };
            output.info(&format!(
                "{:>4}  line {:<6}{:<8}{state:<9}{}",
                block.index,
                block.line,
                block.kind.as_str(),
                job.target.display()
            ));
            for warning in warnings {
                output.warning(&format!("      {warning}"));
            }
        }
        Ok(())
    }
}
