//! `PlantUML` command-line rendering.
//!
//! Each job runs the configured command in pipe mode:
//!
//! ```text
//! <command...> -pipe -charset UTF-8 -t<format>  < diagram.puml  > image
//! ```
//!
//! The `.puml` source is kept next to the image for inspection. The image is
//! written through a temporary file and renamed into place, so a target that
//! exists on disk is always complete.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use tempfile::NamedTempFile;

use crate::block::DiagramFormat;

/// Program used when the configured command is empty.
const DEFAULT_PROGRAM: &str = "plantuml";

/// A single diagram to render.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Index of the block this job renders.
    pub index: usize,
    /// Prepared `PlantUML` source.
    pub source: String,
    /// Image format.
    pub format: DiagramFormat,
    /// Where the `.puml` source is written.
    pub source_path: PathBuf,
    /// Where the image must end up.
    pub target: PathBuf,
}

impl RenderJob {
    fn error(&self, kind: RenderErrorKind) -> RenderError {
        RenderError {
            index: self.index,
            kind,
        }
    }
}

/// Single diagram rendering error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("diagram {index}: {kind}")]
pub struct RenderError {
    /// Index of the failed block.
    pub index: usize,
    /// What went wrong.
    pub kind: RenderErrorKind,
}

/// Kind of diagram rendering error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderErrorKind {
    #[error("renderer '{0}' not found")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("PlantUML failed ({status}): {stderr}")]
    Exit { status: String, stderr: String },
    #[error("PlantUML produced no image data")]
    EmptyOutput,
}

/// Turns a [`RenderJob`] into an image file at `job.target`.
///
/// Implementations are shared across worker threads.
pub trait DiagramRenderer: Send + Sync {
    /// Render one job. Must only write `job.source_path` and `job.target`.
    fn render(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// Renderer invoking the `PlantUML` CLI as a subprocess per job.
#[derive(Debug, Clone)]
pub struct PlantUmlCli {
    program: String,
    args: Vec<String>,
}

impl PlantUmlCli {
    /// Create a renderer from a command line, program first
    /// (e.g. `["java", "-jar", "plantuml.jar"]`).
    #[must_use]
    pub fn new(command: &[String]) -> Self {
        match command.split_first() {
            Some((program, args)) => Self {
                program: program.clone(),
                args: args.to_vec(),
            },
            None => Self {
                program: DEFAULT_PROGRAM.to_owned(),
                args: Vec::new(),
            },
        }
    }

    fn command(&self, format: DiagramFormat) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("-pipe")
            .arg("-charset")
            .arg("UTF-8")
            .arg(format!("-t{}", format.as_str()));
        cmd
    }
}

impl DiagramRenderer for PlantUmlCli {
    fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let io_error = |e: std::io::Error| job.error(RenderErrorKind::Io(e.to_string()));

        fs::write(&job.source_path, &job.source).map_err(io_error)?;
        let input = File::open(&job.source_path).map_err(io_error)?;

        let output = self
            .command(job.format)
            .stdin(Stdio::from(input))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    job.error(RenderErrorKind::NotFound(self.program.clone()))
                } else {
                    io_error(e)
                }
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if !stderr.is_empty() {
            tracing::info!(index = job.index, stderr = %stderr, "PlantUML output");
        }

        if !output.status.success() {
            return Err(job.error(RenderErrorKind::Exit {
                status: output.status.to_string(),
                stderr,
            }));
        }
        if output.stdout.is_empty() {
            return Err(job.error(RenderErrorKind::EmptyOutput));
        }

        write_atomically(&job.target, &output.stdout).map_err(io_error)?;

        tracing::info!(
            index = job.index,
            target = %job.target.display(),
            elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Diagram generated"
        );
        Ok(())
    }
}

/// Write `data` to a sibling temporary file, then rename it over `target`.
fn write_atomically(target: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = target.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
