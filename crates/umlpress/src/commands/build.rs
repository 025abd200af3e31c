//! `umlpress build` command implementation.

use std::path::PathBuf;

use clap::Args;
use umlpress_builder::DocumentBuilder;
use umlpress_config::{CliSettings, Config};

use super::ensure_project_dir;
use crate::error::CliError;
use crate::logging;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Markdown document to convert (overrides config).
    #[arg(env = "UMLPRESS_INPUT")]
    input: Option<PathBuf>,

    /// Markdown document, as a flag; wins over the positional argument.
    #[arg(long = "input", value_name = "INPUT")]
    input_flag: Option<PathBuf>,

    /// PDF output path (default: input with `.pdf` extension).
    #[arg(short, long, env = "UMLPRESS_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for rendered diagrams (default: .umlpress/diagrams/).
    #[arg(long, env = "UMLPRESS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Number of diagrams rendered concurrently.
    #[arg(short = 'j', long, env = "UMLPRESS_WORKERS")]
    workers: Option<usize>,

    /// `PlantUML` command line, e.g. "java -jar plantuml.jar".
    #[arg(long, env = "UMLPRESS_PLANTUML")]
    plantuml: Option<String>,

    /// Pandoc executable.
    #[arg(long, env = "UMLPRESS_PANDOC")]
    pandoc: Option<String>,

    /// Diagram image format.
    #[arg(long, env = "UMLPRESS_FORMAT", value_parser = ["png", "svg"])]
    format: Option<String>,

    /// Log file (default: .umlpress/build.log).
    #[arg(long, env = "UMLPRESS_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Only write the intermediate Markdown, skip PDF generation.
    #[arg(long)]
    no_pdf: bool,

    /// Path to configuration file (default: auto-discover umlpress.toml).
    #[arg(short, long, env = "UMLPRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Show progress logs on stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl BuildArgs {
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            input: self.input_flag.clone().or_else(|| self.input.clone()),
            output: self.output.clone(),
            output_dir: self.output_dir.clone(),
            log_file: self.log_file.clone(),
            workers: self.workers,
            plantuml: self.plantuml.clone(),
            pandoc: self.pandoc.clone(),
            format: self.format.clone(),
        }
    }

    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or the build fails, or if any
    /// diagram failed to render.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;
        let document = &config.document_resolved;
        ensure_project_dir(&document.project_dir)?;
        logging::init(self.verbose, Some(&document.log_file))?;
        tracing::info!(
            config = ?config.config_path,
            log_file = %document.log_file.display(),
            "Build started"
        );

        let builder = DocumentBuilder::from_config(&config)?.skip_pdf(self.no_pdf);
        let settings = builder.settings();
        output.highlight(&format!("Building {}", settings.input.display()));
        output.detail(&format!(
            "Diagrams: {} ({} workers, {})",
            settings.diagrams.output_dir.display(),
            settings.diagrams.workers,
            settings.diagrams.format.as_str()
        ));

        let report = builder.build()?;

        for warning in &report.warnings {
            output.warning(warning);
        }
        output.info(&format!(
            "Diagrams: {} found, {} rendered, {} cached, {} failed",
            report.diagrams, report.rendered, report.cached, report.failed
        ));
        for failure in &report.failures {
            output.error(&format!("  {failure}"));
        }
        output.detail(&format!("Intermediate: {}", report.intermediate.display()));

        if let Some(pdf) = &report.pdf {
            output.success(&format!("PDF written to {}", pdf.display()));
            let fonts = report
                .fonts
                .as_ref()
                .map_or_else(|| "Pandoc defaults".to_owned(), ToString::to_string);
            output.detail(&format!("Fonts: {fonts} (attempt {})", report.attempts));
        }
        output.detail(&format!("Log: {}", document.log_file.display()));

        if !report.is_success() {
            tracing::warn!(failed = report.failed, "Build finished with failed diagrams");
            return Err(CliError::DiagramsFailed(report.failed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BuildArgs,
    }

    #[test]
    fn test_flags_map_to_cli_settings() {
        let cli = TestCli::parse_from([
            "umlpress",
            "doc.md",
            "-o",
            "out/doc.pdf",
            "-j",
            "3",
            "--plantuml",
            "java -jar plantuml.jar",
            "--format",
            "svg",
        ]);
        let settings = cli.args.cli_settings();

        assert_eq!(settings.input, Some(PathBuf::from("doc.md")));
        assert_eq!(settings.output, Some(PathBuf::from("out/doc.pdf")));
        assert_eq!(settings.workers, Some(3));
        assert_eq!(settings.plantuml.as_deref(), Some("java -jar plantuml.jar"));
        assert_eq!(settings.format.as_deref(), Some("svg"));
        assert!(!cli.args.no_pdf);
    }

    #[test]
    fn test_input_flag() {
        let cli = TestCli::parse_from(["umlpress", "--input", "docs/guide.md"]);
        assert_eq!(cli.args.cli_settings().input, Some(PathBuf::from("docs/guide.md")));

        let cli = TestCli::parse_from(["umlpress", "old.md", "--input", "new.md"]);
        assert_eq!(cli.args.cli_settings().input, Some(PathBuf::from("new.md")));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = TestCli::try_parse_from(["umlpress", "--format", "gif"]);
        assert!(result.is_err());
    }
}
