//! Document build pipeline.
//!
//! ```text
//! read -> extract -> render (all jobs joined) -> rewrite -> sanitize
//!      -> write intermediate -> compile
//! ```

use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use umlpress_config::{Config, ConfigError};
use umlpress_diagrams::{
    DiagramFormat, DiagramRenderer, DispatchError, DispatchSettings, PlantUmlCli,
    RenderDispatcher, TargetNaming, extract_blocks, replacements_for, rewrite_document,
};
use umlpress_pandoc::{CompileError, FontPair, PandocDriver, sanitize};

/// Inputs and outputs of a single build.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Markdown document to convert.
    pub input: PathBuf,
    /// PDF to produce.
    pub pdf: PathBuf,
    /// Rewritten, sanitized Markdown handed to Pandoc.
    pub intermediate: PathBuf,
    /// Width attribute attached to image references.
    pub image_width: String,
    /// Stop after writing the intermediate document.
    pub skip_pdf: bool,
    /// Diagram rendering settings.
    pub diagrams: DispatchSettings,
}

impl BuildSettings {
    /// Default settings for `input` with artifacts under `project_dir`.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, project_dir: &Path) -> Self {
        let input = input.into();
        let stem = input
            .file_stem()
            .map_or_else(|| "document".into(), |s| s.to_string_lossy());
        Self {
            pdf: input.with_extension("pdf"),
            intermediate: project_dir.join(format!("{stem}.md")),
            image_width: "100%".to_owned(),
            skip_pdf: false,
            diagrams: DispatchSettings::new(project_dir.join("diagrams")),
            input,
        }
    }

    /// Settings from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] if no input is configured or the
    /// diagram format or naming scheme is unknown.
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let input = config.require_input()?.to_path_buf();
        let document = &config.document_resolved;
        let diagrams = &config.diagrams_resolved;

        let format = DiagramFormat::parse(&diagrams.format).ok_or_else(|| {
            ConfigError::Validation(format!("Unknown diagram format '{}'", diagrams.format))
        })?;
        let naming = TargetNaming::parse(&diagrams.naming).ok_or_else(|| {
            ConfigError::Validation(format!("Unknown naming scheme '{}'", diagrams.naming))
        })?;

        Ok(Self {
            pdf: document.pdf_path(&input),
            intermediate: document.intermediate_path(&input),
            image_width: diagrams.image_width.clone(),
            skip_pdf: false,
            diagrams: DispatchSettings {
                output_dir: diagrams.output_dir.clone(),
                format,
                naming,
                workers: diagrams.workers,
                include_dirs: diagrams.include_dirs.clone(),
                dpi: diagrams.dpi,
            },
            input,
        })
    }

    /// Diagram settings with the input document's directory searched for
    /// includes before the configured directories.
    #[must_use]
    pub fn dispatch_settings(&self) -> DispatchSettings {
        let mut dispatch = self.diagrams.clone();
        dispatch.include_dirs = search_dirs(&parent_dir(&self.input), &self.diagrams.include_dirs);
        dispatch
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Diagram blocks found in the document.
    pub diagrams: usize,
    /// Diagrams rendered during this build.
    pub rendered: usize,
    /// Diagrams whose image already existed.
    pub cached: usize,
    /// Diagrams replaced by a failure note.
    pub failed: usize,
    /// One message per failed diagram.
    pub failures: Vec<String>,
    /// Non-fatal preparation warnings.
    pub warnings: Vec<String>,
    /// The intermediate Markdown document.
    pub intermediate: PathBuf,
    /// The PDF, unless PDF generation was skipped.
    pub pdf: Option<PathBuf>,
    /// Fonts used for the PDF; `None` for Pandoc's defaults.
    pub fonts: Option<FontPair>,
    /// Number of Pandoc attempts.
    pub attempts: usize,
}

impl BuildReport {
    /// False when any diagram failed to render.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Error returned by the document builder.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Converts one Markdown document with `PlantUML` diagrams into a PDF.
pub struct DocumentBuilder {
    settings: BuildSettings,
    renderer: Box<dyn DiagramRenderer>,
    driver: PandocDriver,
}

impl DocumentBuilder {
    /// Create a builder using `plantuml` and `pandoc` from `PATH`.
    #[must_use]
    pub fn new(settings: BuildSettings) -> Self {
        Self {
            settings,
            renderer: Box::new(PlantUmlCli::new(&["plantuml".to_owned()])),
            driver: PandocDriver::new("pandoc", "xelatex"),
        }
    }

    /// Create a builder with settings, renderer and driver from `config`.
    ///
    /// # Errors
    ///
    /// See [`BuildSettings::from_config`].
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let settings = BuildSettings::from_config(config)?;
        let pandoc = &config.pandoc;
        let driver = PandocDriver::new(&pandoc.executable, &pandoc.pdf_engine)
            .with_fonts(
                pandoc
                    .fonts
                    .iter()
                    .map(|f| FontPair::new(&f.main, &f.mono))
                    .collect(),
            )
            .with_default_fallback(pandoc.default_fallback)
            .with_extra_args(pandoc.extra_args.clone());

        Ok(Self::new(settings)
            .with_renderer(Box::new(PlantUmlCli::new(&config.diagrams_resolved.command)))
            .with_driver(driver))
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Box<dyn DiagramRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Use `driver` for compilation. Its resource paths are replaced by the
    /// intermediate and input directories.
    #[must_use]
    pub fn with_driver(mut self, driver: PandocDriver) -> Self {
        self.driver = driver;
        self
    }

    #[must_use]
    pub fn skip_pdf(mut self, skip: bool) -> Self {
        self.settings.skip_pdf = skip;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Run the pipeline.
    ///
    /// Diagram failures do not abort the build: each failed block becomes a
    /// visible note and is counted in the report.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if the input cannot be read, an output cannot
    /// be written, rendering cannot start, or every compile attempt fails.
    pub fn build(self) -> Result<BuildReport, BuildError> {
        let started_at = Instant::now();
        let Self {
            settings,
            renderer,
            driver,
        } = self;

        tracing::info!(input = %settings.input.display(), "Building document");
        let text = fs::read_to_string(&settings.input).map_err(|source| BuildError::Read {
            path: settings.input.clone(),
            source,
        })?;

        let mut report = BuildReport {
            intermediate: settings.intermediate.clone(),
            ..BuildReport::default()
        };

        let blocks = extract_blocks(&text);
        report.diagrams = blocks.len();
        let input_dir = parent_dir(&settings.input);
        let intermediate_dir = parent_dir(&settings.intermediate);

        let rewritten = if blocks.is_empty() {
            tracing::info!("No diagrams found, skipping rendering");
            Cow::Borrowed(text.as_str())
        } else {
            tracing::info!(count = blocks.len(), "Found diagrams");

            let render =
                RenderDispatcher::new(renderer, settings.dispatch_settings()).dispatch(&blocks)?;

            report.rendered = render.rendered();
            report.cached = render.cached();
            report.failed = render.failed();
            report.failures = render.failures().map(ToString::to_string).collect();
            report.warnings.clone_from(&render.warnings);

            let replacements = replacements_for(
                &blocks,
                &render,
                |path| link_path(&intermediate_dir, path),
                &settings.image_width,
            );
            Cow::Owned(rewrite_document(&text, &replacements))
        };

        let sanitized = sanitize(&rewritten);
        write_file(&settings.intermediate, &sanitized)?;
        tracing::info!(path = %settings.intermediate.display(), "Intermediate document written");

        if settings.skip_pdf {
            tracing::info!("Skipping PDF generation");
            return Ok(report);
        }

        if let Some(parent) = settings.pdf.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BuildError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let success = driver
            .with_resource_paths(search_dirs(&intermediate_dir, &[input_dir]))
            .compile(&settings.intermediate, &settings.pdf)?;

        report.pdf = Some(success.pdf);
        report.fonts = success.fonts;
        report.attempts = success.attempts;

        tracing::info!(
            diagrams = report.diagrams,
            failed = report.failed,
            elapsed_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Build finished"
        );
        Ok(report)
    }
}

/// Directory containing `path`, `.` for bare file names.
fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// `first` followed by `rest`, without duplicates.
fn search_dirs(first: &Path, rest: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = vec![first.to_path_buf()];
    for dir in rest {
        if !dirs.contains(dir) {
            dirs.push(dir.clone());
        }
    }
    dirs
}

/// Reference to `target` from a document in `base`: relative with forward
/// slashes when `target` lies below `base`, otherwise the absolute path.
fn link_path(base: &Path, target: &Path) -> String {
    let base = absolute_path(base);
    let target = absolute_path(target);
    match target.strip_prefix(&base) {
        Ok(relative) => relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => target.display().to_string(),
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn write_file(path: &Path, content: &str) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, content).map_err(write_error)
}
