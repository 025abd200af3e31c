//! Pandoc invocation with font fallback.
//!
//! A LaTeX engine such as `xelatex` fails outright when a requested font is
//! not installed, and which fonts are installed varies from machine to
//! machine. The driver therefore walks an ordered list of font pairs and
//! stops at the first attempt that produces a PDF.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Body and code font passed to the LaTeX engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPair {
    pub main: String,
    pub mono: String,
}

impl FontPair {
    #[must_use]
    pub fn new(main: impl Into<String>, mono: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            mono: mono.into(),
        }
    }
}

impl std::fmt::Display for FontPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.main, self.mono)
    }
}

/// A successful compilation.
#[derive(Debug, Clone)]
pub struct CompileSuccess {
    /// The generated PDF.
    pub pdf: PathBuf,
    /// Fonts of the winning attempt; `None` for Pandoc's defaults.
    pub fonts: Option<FontPair>,
    /// Number of attempts made, including the successful one.
    pub attempts: usize,
}

/// Compilation error.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The Pandoc executable could not be started.
    #[error("Pandoc executable '{0}' not found")]
    NotFound(String),
    /// I/O error around an attempt.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Every attempt failed.
    #[error("PDF generation failed after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: usize, last_error: String },
}

/// Runs Pandoc until one attempt produces the PDF.
#[derive(Debug, Clone)]
pub struct PandocDriver {
    executable: String,
    pdf_engine: String,
    fonts: Vec<FontPair>,
    default_fallback: bool,
    resource_paths: Vec<PathBuf>,
    extra_args: Vec<String>,
}

impl PandocDriver {
    /// Create a driver with no font list and the default-font fallback on.
    #[must_use]
    pub fn new(executable: impl Into<String>, pdf_engine: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            pdf_engine: pdf_engine.into(),
            fonts: Vec::new(),
            default_fallback: true,
            resource_paths: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    /// Font pairs to try, in order.
    #[must_use]
    pub fn with_fonts(mut self, fonts: Vec<FontPair>) -> Self {
        self.fonts = fonts;
        self
    }

    /// Whether to try Pandoc's default fonts after the list.
    #[must_use]
    pub fn with_default_fallback(mut self, enabled: bool) -> Self {
        self.default_fallback = enabled;
        self
    }

    /// Directories Pandoc resolves relative image paths against, in order.
    #[must_use]
    pub fn with_resource_paths(mut self, dirs: Vec<PathBuf>) -> Self {
        self.resource_paths = dirs;
        self
    }

    /// Arguments appended to every invocation.
    #[must_use]
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Font settings of each attempt, in order; `None` means Pandoc defaults.
    fn attempts(&self) -> Vec<Option<&FontPair>> {
        let mut attempts: Vec<_> = self.fonts.iter().map(Some).collect();
        if self.default_fallback || attempts.is_empty() {
            attempts.push(None);
        }
        attempts
    }

    /// Resource paths joined with the platform's path-list separator.
    fn resource_path_arg(&self) -> Option<OsString> {
        let first = self.resource_paths.first()?;
        match std::env::join_paths(&self.resource_paths) {
            Ok(joined) => Some(joined),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot join resource paths, using the first only");
                Some(first.clone().into_os_string())
            }
        }
    }

    fn command(&self, markdown: &Path, pdf: &Path, fonts: Option<&FontPair>) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(markdown)
            .arg("-o")
            .arg(pdf)
            .arg(format!("--pdf-engine={}", self.pdf_engine));
        if let Some(paths) = self.resource_path_arg() {
            let mut arg = OsString::from("--resource-path=");
            arg.push(paths);
            cmd.arg(arg);
        }
        cmd.args(&self.extra_args);
        if let Some(fonts) = fonts {
            cmd.arg("-V")
                .arg(format!("mainfont={}", fonts.main))
                .arg("-V")
                .arg(format!("monofont={}", fonts.mono));
        }
        cmd
    }

    /// Compile `markdown` into `pdf`.
    ///
    /// An attempt succeeds when Pandoc exits with status zero and the PDF
    /// exists afterwards. A stale PDF is removed before each attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NotFound`] as soon as the executable cannot be
    /// started and [`CompileError::Exhausted`] when no attempt succeeds.
    pub fn compile(&self, markdown: &Path, pdf: &Path) -> Result<CompileSuccess, CompileError> {
        let attempts = self.attempts();
        let total = attempts.len();
        let mut last_error = String::new();

        for (number, fonts) in attempts.into_iter().enumerate() {
            let number = number + 1;
            let label = fonts.map_or_else(|| "default".to_owned(), ToString::to_string);
            remove_stale(pdf)?;

            tracing::info!(attempt = number, total, fonts = %label, "Running Pandoc");
            let started_at = Instant::now();
            let output = self
                .command(markdown, pdf, fonts)
                .output()
                .map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        CompileError::NotFound(self.executable.clone())
                    } else {
                        CompileError::Io(e)
                    }
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            if !stdout.trim().is_empty() {
                tracing::info!(attempt = number, stdout = %stdout.trim(), "Pandoc stdout");
            }
            if !stderr.is_empty() {
                tracing::info!(attempt = number, stderr = %stderr, "Pandoc stderr");
            }

            if output.status.success() && pdf.exists() {
                tracing::info!(
                    attempt = number,
                    fonts = %label,
                    pdf = %pdf.display(),
                    elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "PDF generated"
                );
                return Ok(CompileSuccess {
                    pdf: pdf.to_path_buf(),
                    fonts: fonts.cloned(),
                    attempts: number,
                });
            }

            last_error = if output.status.success() {
                format!("Pandoc exited successfully but {} was not created", pdf.display())
            } else if stderr.is_empty() {
                format!("Pandoc failed ({})", output.status)
            } else {
                format!("Pandoc failed ({}): {stderr}", output.status)
            };
            tracing::warn!(attempt = number, fonts = %label, error = %last_error, "PDF attempt failed");
        }

        Err(CompileError::Exhausted {
            attempts: total,
            last_error,
        })
    }
}

fn remove_stale(pdf: &Path) -> Result<(), CompileError> {
    match fs::remove_file(pdf) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(CompileError::Io(e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_order() {
        let driver = PandocDriver::new("pandoc", "xelatex")
            .with_fonts(vec![FontPair::new("A", "B"), FontPair::new("C", "D")]);
        let attempts = driver.attempts();

        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0], Some(&FontPair::new("A", "B")));
        assert_eq!(attempts[1], Some(&FontPair::new("C", "D")));
        assert_eq!(attempts[2], None);
    }

    #[test]
    fn test_no_fallback() {
        let driver = PandocDriver::new("pandoc", "xelatex")
            .with_fonts(vec![FontPair::new("A", "B")])
            .with_default_fallback(false);
        assert_eq!(driver.attempts(), vec![Some(&FontPair::new("A", "B"))]);
    }

    #[test]
    fn test_empty_font_list_still_attempts_once() {
        let driver = PandocDriver::new("pandoc", "xelatex").with_default_fallback(false);
        assert_eq!(driver.attempts(), vec![None]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_arguments() {
        let driver = PandocDriver::new("pandoc", "lualatex")
            .with_resource_paths(vec![PathBuf::from("/work/.umlpress"), PathBuf::from("/work")])
            .with_extra_args(vec!["--toc".to_owned()]);
        let fonts = FontPair::new("Times New Roman", "Consolas");
        let cmd = driver.command(Path::new("doc.md"), Path::new("doc.pdf"), Some(&fonts));

        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "pandoc");
        assert_eq!(
            args,
            vec![
                "doc.md",
                "-o",
                "doc.pdf",
                "--pdf-engine=lualatex",
                "--resource-path=/work/.umlpress:/work",
                "--toc",
                "-V",
                "mainfont=Times New Roman",
                "-V",
                "monofont=Consolas",
            ]
        );
    }

    #[test]
    fn test_font_pair_display() {
        assert_eq!(FontPair::new("Cambria", "Consolas").to_string(), "Cambria / Consolas");
    }
}
