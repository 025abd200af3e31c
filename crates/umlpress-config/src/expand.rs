//! `${VAR}` expansion for string settings.
//!
//! Supported forms:
//! - `${VAR}` is replaced by the value of VAR and fails when VAR is unset
//! - `${VAR:-default}` falls back to `default` when VAR is unset
//!
//! Values without `${` are returned unchanged, bare `$` included.

use crate::ConfigError;

/// Variable that could not be resolved during expansion.
struct UnsetVar(String);

/// Expand variable references in a single value.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |name: &str| {
        std::env::var(name)
            .map(Some)
            .map_err(|_| UnsetVar(name.to_owned()))
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.0),
    })
}

/// Expand an optional value in place.
pub(crate) fn expand_opt(value: &mut Option<String>, field: &str) -> Result<(), ConfigError> {
    if let Some(raw) = value.as_deref() {
        *value = Some(expand_env(raw, field)?);
    }
    Ok(())
}

/// Expand every element of a list in place. The field name carries the index.
pub(crate) fn expand_each(values: &mut [String], field: &str) -> Result<(), ConfigError> {
    for (i, value) in values.iter_mut().enumerate() {
        *value = expand_env(value, &format!("{field}[{i}]"))?;
    }
    Ok(())
}
