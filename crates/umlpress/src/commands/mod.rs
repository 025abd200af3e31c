//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod list;

use std::path::Path;

pub(crate) use build::BuildArgs;
pub(crate) use list::ListArgs;

use crate::error::CliError;

/// Ensure the `.umlpress/` project directory exists with a `.gitignore`.
pub(crate) fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by umlpress\n*\n");
    }

    Ok(())
}
