//! Internal constants for diagram rendering.

/// Maximum nesting of `!include` directives before giving up.
pub const MAX_INCLUDE_DEPTH: usize = 10;

/// Number of hex characters of the content hash used in target filenames.
pub const HASH_PREFIX_LEN: usize = 12;

/// Fence info-string words that mark a `PlantUML` block.
pub const FENCE_LANGUAGES: &[&str] = &["plantuml", "puml"];
