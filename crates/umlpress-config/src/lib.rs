//! Configuration management for umlpress.
//!
//! Parses `umlpress.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `document.input`, `document.output`, `document.intermediate`, `document.log_file`
//! - `diagrams.command`, `diagrams.output_dir`, `diagrams.include_dirs`
//! - `pandoc.executable`

mod expand;

use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the input Markdown file.
    pub input: Option<PathBuf>,
    /// Override the PDF output path.
    pub output: Option<PathBuf>,
    /// Override the rendered image directory.
    pub output_dir: Option<PathBuf>,
    /// Override the log file path.
    pub log_file: Option<PathBuf>,
    /// Override the worker pool size.
    pub workers: Option<usize>,
    /// Override the `PlantUML` command line (whitespace separated).
    pub plantuml: Option<String>,
    /// Override the Pandoc executable.
    pub pandoc: Option<String>,
    /// Override the image format.
    pub format: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "umlpress.toml";

/// Project directory holding generated artifacts.
const PROJECT_DIRNAME: &str = ".umlpress";

/// Upper bound on render workers.
const MAX_DEFAULT_WORKERS: usize = 6;

/// Valid values for `diagrams.format`.
pub const IMAGE_FORMATS: &[&str] = &["png", "svg"];

/// Valid values for `diagrams.naming`.
pub const NAMING_SCHEMES: &[&str] = &["content", "index"];

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document paths (relative strings from TOML).
    document: DocumentConfigRaw,
    /// Diagram rendering settings (relative strings from TOML).
    diagrams: DiagramsConfigRaw,
    /// Pandoc settings.
    pub pandoc: PandocConfig,

    /// Resolved document configuration (set after loading).
    #[serde(skip)]
    pub document_resolved: DocumentConfig,
    /// Resolved diagrams configuration (set after loading).
    #[serde(skip)]
    pub diagrams_resolved: DiagramsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw document configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocumentConfigRaw {
    input: Option<String>,
    output: Option<String>,
    intermediate: Option<String>,
    log_file: Option<String>,
}

/// Resolved document paths.
#[derive(Debug, Default)]
pub struct DocumentConfig {
    /// Markdown file to convert.
    pub input: Option<PathBuf>,
    /// PDF output path (default: input with `.pdf` extension).
    pub output: Option<PathBuf>,
    /// Rewritten Markdown handed to Pandoc (default: `.umlpress/<stem>.md`).
    pub intermediate: Option<PathBuf>,
    /// Log file capturing every stage's status lines.
    pub log_file: PathBuf,
    /// Project directory for generated artifacts (`.umlpress/`).
    pub project_dir: PathBuf,
}

impl DocumentConfig {
    /// PDF path for the given input.
    #[must_use]
    pub fn pdf_path(&self, input: &Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| input.with_extension("pdf"))
    }

    /// Intermediate Markdown path for the given input.
    #[must_use]
    pub fn intermediate_path(&self, input: &Path) -> PathBuf {
        self.intermediate.clone().unwrap_or_else(|| {
            let stem = input
                .file_stem()
                .map_or_else(|| "document".into(), |s| s.to_string_lossy());
            self.project_dir.join(format!("{stem}.md"))
        })
    }
}

/// Raw diagrams configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DiagramsConfigRaw {
    command: Option<Vec<String>>,
    output_dir: Option<String>,
    format: Option<String>,
    naming: Option<String>,
    workers: Option<usize>,
    include_dirs: Option<Vec<String>>,
    dpi: Option<u32>,
    image_width: Option<String>,
}

/// Resolved diagram rendering configuration with absolute paths.
#[derive(Debug)]
pub struct DiagramsConfig {
    /// `PlantUML` command line, program first (e.g. `["java", "-jar", "plantuml.jar"]`).
    pub command: Vec<String>,
    /// Directory receiving `.puml` sources and rendered images.
    pub output_dir: PathBuf,
    /// Image format (`png` or `svg`).
    pub format: String,
    /// Target naming scheme (`content` or `index`).
    pub naming: String,
    /// Size of the render worker pool.
    pub workers: usize,
    /// Directories to search for `!include` directives.
    pub include_dirs: Vec<PathBuf>,
    /// DPI injected into every diagram, if set.
    pub dpi: Option<u32>,
    /// Width attribute attached to image references.
    pub image_width: String,
}

impl DiagramsConfig {
    fn default_with_base(base: &Path) -> Self {
        Self {
            command: vec!["plantuml".to_owned()],
            output_dir: base.join(PROJECT_DIRNAME).join("diagrams"),
            format: "png".to_owned(),
            naming: "content".to_owned(),
            workers: default_workers(),
            include_dirs: Vec::new(),
            dpi: None,
            image_width: "100%".to_owned(),
        }
    }
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Number of CPUs, capped at [`MAX_DEFAULT_WORKERS`].
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(MAX_DEFAULT_WORKERS)
}

/// Pandoc configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PandocConfig {
    /// Pandoc executable name or path.
    pub executable: String,
    /// LaTeX engine passed as `--pdf-engine`.
    pub pdf_engine: String,
    /// Font pairs tried in order until one compiles.
    pub fonts: Vec<FontConfig>,
    /// Try Pandoc's default fonts after the list is exhausted.
    pub default_fallback: bool,
    /// Extra arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            executable: "pandoc".to_owned(),
            pdf_engine: "xelatex".to_owned(),
            fonts: default_fonts(),
            default_fallback: true,
            extra_args: Vec::new(),
        }
    }
}

/// A main/monospace font pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FontConfig {
    /// Body text font (`mainfont`).
    pub main: String,
    /// Code font (`monofont`).
    pub mono: String,
}

impl FontConfig {
    fn new(main: &str, mono: &str) -> Self {
        Self {
            main: main.to_owned(),
            mono: mono.to_owned(),
        }
    }
}

/// Font pairs common on Windows, then ones with good box-drawing coverage.
fn default_fonts() -> Vec<FontConfig> {
    vec![
        FontConfig::new("Times New Roman", "Consolas"),
        FontConfig::new("Cambria", "Consolas"),
        FontConfig::new("Calibri", "Consolas"),
        FontConfig::new("Arial", "Consolas"),
        FontConfig::new("Times New Roman", "Lucida Console"),
        FontConfig::new("Times New Roman", "Courier New"),
        FontConfig::new("Times New Roman", "Noto Sans Mono"),
        FontConfig::new("Times New Roman", "DejaVu Sans Mono"),
    ]
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`diagrams.command[2]`").
        field: String,
        /// Error message (e.g., "${`PLANTUML_JAR`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a field to hold one of the allowed values.
fn require_one_of(value: &str, allowed: &[&str], field: &str) -> Result<(), ConfigError> {
    if !allowed.contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{field} must be one of: {} (got '{value}')",
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `umlpress.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The merged result
    /// is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the merged configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    ///
    /// Paths given on the command line are relative to the current directory,
    /// so they are made absolute here.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(input) = &settings.input {
            self.document_resolved.input = Some(absolute_path(input));
        }
        if let Some(output) = &settings.output {
            self.document_resolved.output = Some(absolute_path(output));
        }
        if let Some(log_file) = &settings.log_file {
            self.document_resolved.log_file = absolute_path(log_file);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.diagrams_resolved.output_dir = absolute_path(output_dir);
        }
        if let Some(workers) = settings.workers {
            self.diagrams_resolved.workers = workers;
        }
        if let Some(plantuml) = &settings.plantuml {
            self.diagrams_resolved.command =
                plantuml.split_whitespace().map(str::to_owned).collect();
        }
        if let Some(pandoc) = &settings.pandoc {
            self.pandoc.executable.clone_from(pandoc);
        }
        if let Some(format) = &settings.format {
            self.diagrams_resolved.format.clone_from(format);
        }
    }

    /// Get the input document path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if no input was configured.
    pub fn require_input(&self) -> Result<&Path, ConfigError> {
        self.document_resolved.input.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "document.input is required (set it in umlpress.toml or pass --input)".into(),
            )
        })
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        let project_dir = base.join(PROJECT_DIRNAME);
        Self {
            document: DocumentConfigRaw::default(),
            diagrams: DiagramsConfigRaw::default(),
            pandoc: PandocConfig::default(),
            document_resolved: DocumentConfig {
                input: None,
                output: None,
                intermediate: None,
                log_file: project_dir.join("build.log"),
                project_dir,
            },
            diagrams_resolved: DiagramsConfig::default_with_base(base),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_diagrams()?;
        self.validate_pandoc()?;
        Ok(())
    }

    /// Validate diagrams configuration.
    fn validate_diagrams(&self) -> Result<(), ConfigError> {
        const MAX_DPI: u32 = 1000;

        let diagrams = &self.diagrams_resolved;
        match diagrams.command.first() {
            Some(program) => require_non_empty(program, "diagrams.command")?,
            None => {
                return Err(ConfigError::Validation(
                    "diagrams.command cannot be empty".to_owned(),
                ));
            }
        }
        require_one_of(&diagrams.format, IMAGE_FORMATS, "diagrams.format")?;
        require_one_of(&diagrams.naming, NAMING_SCHEMES, "diagrams.naming")?;

        if diagrams.workers == 0 {
            return Err(ConfigError::Validation(
                "diagrams.workers must be greater than 0".to_owned(),
            ));
        }

        if let Some(dpi) = diagrams.dpi {
            if dpi == 0 {
                return Err(ConfigError::Validation(
                    "diagrams.dpi must be greater than 0".to_owned(),
                ));
            }
            if dpi > MAX_DPI {
                return Err(ConfigError::Validation(format!(
                    "diagrams.dpi cannot exceed {MAX_DPI}"
                )));
            }
        }

        Ok(())
    }

    /// Validate pandoc configuration.
    fn validate_pandoc(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.pandoc.executable, "pandoc.executable")?;
        require_non_empty(&self.pandoc.pdf_engine, "pandoc.pdf_engine")?;
        for (i, font) in self.pandoc.fonts.iter().enumerate() {
            require_non_empty(&font.main, &format!("pandoc.fonts[{i}].main"))?;
            require_non_empty(&font.mono, &format!("pandoc.fonts[{i}].mono"))?;
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        let document = &mut self.document;
        expand::expand_opt(&mut document.input, "document.input")?;
        expand::expand_opt(&mut document.output, "document.output")?;
        expand::expand_opt(&mut document.intermediate, "document.intermediate")?;
        expand::expand_opt(&mut document.log_file, "document.log_file")?;

        let diagrams = &mut self.diagrams;
        if let Some(command) = diagrams.command.as_mut() {
            expand::expand_each(command, "diagrams.command")?;
        }
        expand::expand_opt(&mut diagrams.output_dir, "diagrams.output_dir")?;
        if let Some(dirs) = diagrams.include_dirs.as_mut() {
            expand::expand_each(dirs, "diagrams.include_dirs")?;
        }

        self.pandoc.executable = expand::expand_env(&self.pandoc.executable, "pandoc.executable")?;

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let project_dir = config_dir.join(PROJECT_DIRNAME);
        let resolve = |path: Option<&String>| path.map(|p| config_dir.join(p));

        self.document_resolved = DocumentConfig {
            input: resolve(self.document.input.as_ref()),
            output: resolve(self.document.output.as_ref()),
            intermediate: resolve(self.document.intermediate.as_ref()),
            log_file: resolve(self.document.log_file.as_ref())
                .unwrap_or_else(|| project_dir.join("build.log")),
            project_dir,
        };

        let defaults = DiagramsConfig::default_with_base(config_dir);
        let raw = &self.diagrams;
        self.diagrams_resolved = DiagramsConfig {
            command: raw.command.clone().unwrap_or(defaults.command),
            output_dir: resolve(raw.output_dir.as_ref()).unwrap_or(defaults.output_dir),
            format: raw.format.clone().unwrap_or(defaults.format),
            naming: raw.naming.clone().unwrap_or(defaults.naming),
            workers: raw.workers.unwrap_or(defaults.workers),
            include_dirs: raw
                .include_dirs
                .iter()
                .flatten()
                .map(|d| config_dir.join(d))
                .collect(),
            dpi: raw.dpi,
            image_width: raw.image_width.clone().unwrap_or(defaults.image_width),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.document_resolved.input.is_none());
        assert_eq!(
            config.document_resolved.project_dir,
            PathBuf::from("/test/.umlpress")
        );
        assert_eq!(
            config.document_resolved.log_file,
            PathBuf::from("/test/.umlpress/build.log")
        );
        assert_eq!(
            config.diagrams_resolved.output_dir,
            PathBuf::from("/test/.umlpress/diagrams")
        );
        assert_eq!(config.diagrams_resolved.command, vec!["plantuml"]);
        assert_eq!(config.diagrams_resolved.format, "png");
        assert_eq!(config.diagrams_resolved.naming, "content");
        assert!(config.diagrams_resolved.workers >= 1);
        assert!(config.diagrams_resolved.workers <= MAX_DEFAULT_WORKERS);
        assert_eq!(config.pandoc.executable, "pandoc");
        assert_eq!(config.pandoc.pdf_engine, "xelatex");
        assert_eq!(config.pandoc.fonts.len(), 8);
        assert!(config.pandoc.default_fallback);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.pandoc.executable, "pandoc");
        assert_eq!(
            config.pandoc.fonts[0],
            FontConfig::new("Times New Roman", "Consolas")
        );
    }

    #[test]
    fn test_parse_pandoc_config() {
        let toml = r#"
[pandoc]
executable = "/usr/local/bin/pandoc"
pdf_engine = "lualatex"
default_fallback = false
extra_args = ["--toc"]
fonts = [
    { main = "DejaVu Serif", mono = "DejaVu Sans Mono" },
]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.pandoc.executable, "/usr/local/bin/pandoc");
        assert_eq!(config.pandoc.pdf_engine, "lualatex");
        assert!(!config.pandoc.default_fallback);
        assert_eq!(config.pandoc.extra_args, vec!["--toc"]);
        assert_eq!(
            config.pandoc.fonts,
            vec![FontConfig::new("DejaVu Serif", "DejaVu Sans Mono")]
        );
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[document]
input = "book.md"
output = "out/book.pdf"
log_file = "conversion.log"

[diagrams]
command = ["java", "-jar", "libs/plantuml.jar"]
output_dir = "diagrams"
include_dirs = ["uml", "shared/uml"]
workers = 3
dpi = 150
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        let document = &config.document_resolved;
        assert_eq!(document.input, Some(PathBuf::from("/project/book.md")));
        assert_eq!(document.output, Some(PathBuf::from("/project/out/book.pdf")));
        assert_eq!(document.log_file, PathBuf::from("/project/conversion.log"));
        assert!(document.intermediate.is_none());

        let diagrams = &config.diagrams_resolved;
        assert_eq!(diagrams.command, vec!["java", "-jar", "libs/plantuml.jar"]);
        assert_eq!(diagrams.output_dir, PathBuf::from("/project/diagrams"));
        assert_eq!(
            diagrams.include_dirs,
            vec![
                PathBuf::from("/project/uml"),
                PathBuf::from("/project/shared/uml")
            ]
        );
        assert_eq!(diagrams.workers, 3);
        assert_eq!(diagrams.dpi, Some(150));
        assert_eq!(diagrams.image_width, "100%");
    }

    #[test]
    fn test_resolve_paths_defaults_under_project_dir() {
        let mut config: Config = toml::from_str("[document]\ninput = \"book.md\"\n").unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.diagrams_resolved.output_dir,
            PathBuf::from("/project/.umlpress/diagrams")
        );
        assert_eq!(
            config.document_resolved.log_file,
            PathBuf::from("/project/.umlpress/build.log")
        );
    }

    #[test]
    fn test_pdf_and_intermediate_paths_follow_input() {
        let config = Config::default_with_base(Path::new("/test"));
        let input = Path::new("/docs/book.md");

        assert_eq!(
            config.document_resolved.pdf_path(input),
            PathBuf::from("/docs/book.pdf")
        );
        assert_eq!(
            config.document_resolved.intermediate_path(input),
            PathBuf::from("/test/.umlpress/book.md")
        );
    }

    #[test]
    fn test_explicit_pdf_and_intermediate_paths_win() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.document_resolved.output = Some(PathBuf::from("/out/final.pdf"));
        config.document_resolved.intermediate = Some(PathBuf::from("/tmp/book_tmp.md"));
        let input = Path::new("/docs/book.md");

        assert_eq!(
            config.document_resolved.pdf_path(input),
            PathBuf::from("/out/final.pdf")
        );
        assert_eq!(
            config.document_resolved.intermediate_path(input),
            PathBuf::from("/tmp/book_tmp.md")
        );
    }

    #[test]
    fn test_apply_cli_settings_input() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            input: Some(PathBuf::from("/custom/book.md")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.require_input().unwrap(), Path::new("/custom/book.md"));
        assert_eq!(
            config.diagrams_resolved.output_dir,
            PathBuf::from("/test/.umlpress/diagrams")
        ); // Unchanged
    }

    #[test]
    fn test_apply_cli_settings_relative_paths_use_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            input: Some(PathBuf::from("sub/doc.md")),
            output_dir: Some(PathBuf::from("imgs")),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.require_input().unwrap(), cwd.join("sub/doc.md"));
        assert_eq!(config.diagrams_resolved.output_dir, cwd.join("imgs"));
    }

    #[test]
    fn test_apply_cli_settings_plantuml_splits_words() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            plantuml: Some("java -jar  /opt/plantuml.jar".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(
            config.diagrams_resolved.command,
            vec!["java", "-jar", "/opt/plantuml.jar"]
        );
    }

    #[test]
    fn test_apply_cli_settings_multiple() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            output: Some(PathBuf::from("/out/book.pdf")),
            output_dir: Some(PathBuf::from("/out/img")),
            log_file: Some(PathBuf::from("/out/run.log")),
            workers: Some(2),
            pandoc: Some("/opt/pandoc".to_owned()),
            format: Some("svg".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(
            config.document_resolved.output,
            Some(PathBuf::from("/out/book.pdf"))
        );
        assert_eq!(config.diagrams_resolved.output_dir, PathBuf::from("/out/img"));
        assert_eq!(config.document_resolved.log_file, PathBuf::from("/out/run.log"));
        assert_eq!(config.diagrams_resolved.workers, 2);
        assert_eq!(config.pandoc.executable, "/opt/pandoc");
        assert_eq!(config.diagrams_resolved.format, "svg");
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let before = Config::default_with_base(Path::new("/test"));
        let mut config = Config::default_with_base(Path::new("/test"));

        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.document_resolved.input, before.document_resolved.input);
        assert_eq!(
            config.diagrams_resolved.command,
            before.diagrams_resolved.command
        );
        assert_eq!(config.pandoc.executable, before.pandoc.executable);
    }

    #[test]
    fn test_require_input_missing() {
        let config = Config::default_with_base(Path::new("/test"));
        let err = config.require_input().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("--input"));
    }

    #[test]
    fn test_expand_env_vars_command() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("UMLPRESS_CFG_JAR", "/opt/plantuml.jar");
        }

        let toml = r#"
[diagrams]
command = ["java", "-jar", "${UMLPRESS_CFG_JAR}"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(
            config.diagrams.command,
            Some(vec![
                "java".to_owned(),
                "-jar".to_owned(),
                "/opt/plantuml.jar".to_owned()
            ])
        );

        unsafe {
            std::env::remove_var("UMLPRESS_CFG_JAR");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("UMLPRESS_CFG_MISSING");
        }

        let toml = r#"
[document]
input = "${UMLPRESS_CFG_MISSING}/book.md"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("UMLPRESS_CFG_MISSING"));
        assert!(err.to_string().contains("document.input"));
    }

    #[test]
    fn test_load_from_file_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "[document]\ninput = \"book.md\"\n\n[diagrams]\nformat = \"svg\"\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path()), None).unwrap();

        assert_eq!(config.require_input().unwrap(), dir.path().join("book.md"));
        assert_eq!(config.diagrams_resolved.format, "svg");
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/umlpress.toml")), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_validates_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            workers: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(path.as_path()), Some(&overrides)).unwrap_err();
        assert!(err.to_string().contains("diagrams.workers"));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        let config = Config::default_with_base(Path::new("/test"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_command() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.diagrams_resolved.command = Vec::new();
        assert_validation_error(&config, &["diagrams.command", "empty"]);
    }

    #[test]
    fn test_validate_unknown_format() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.diagrams_resolved.format = "gif".to_owned();
        assert_validation_error(&config, &["diagrams.format", "png, svg", "gif"]);
    }

    #[test]
    fn test_validate_unknown_naming() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.diagrams_resolved.naming = "random".to_owned();
        assert_validation_error(&config, &["diagrams.naming"]);
    }

    #[test]
    fn test_validate_dpi_bounds() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.diagrams_resolved.dpi = Some(0);
        assert_validation_error(&config, &["dpi", "greater than 0"]);

        config.diagrams_resolved.dpi = Some(2000);
        assert_validation_error(&config, &["dpi", "1000"]);

        config.diagrams_resolved.dpi = Some(300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_pandoc_executable() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.pandoc.executable = String::new();
        assert_validation_error(&config, &["pandoc.executable"]);
    }

    #[test]
    fn test_validate_blank_font() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.pandoc.fonts.push(FontConfig::new("Arial", " "));
        assert_validation_error(&config, &["pandoc.fonts[8].mono"]);
    }
}
