//! Render target naming.
//!
//! A target path is a pure function of the block: either of its prepared
//! source ([`TargetNaming::Content`]) or of its position
//! ([`TargetNaming::Index`]). Whether a target already exists on disk is what
//! decides a cache hit, so re-running on an unchanged document renders
//! nothing.

use sha2::{Digest, Sha256};

use crate::block::DiagramFormat;
use crate::consts::HASH_PREFIX_LEN;

/// Diagram parameters for cache key computation.
///
/// Contains every parameter that affects the rendered image.
#[derive(Debug, Clone, Copy)]
pub struct DiagramKey<'a> {
    /// Diagram source code (after preprocessing).
    pub source: &'a str,
    /// Output format.
    pub format: DiagramFormat,
    /// DPI injected into the source, if any.
    pub dpi: Option<u32>,
}

impl DiagramKey<'_> {
    /// Compute a content hash for this diagram key.
    ///
    /// SHA-256 of `"plantuml:{format}:{dpi}:{source}"`, hex encoded, where a
    /// missing DPI is written as `default`.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let dpi = self
            .dpi
            .map_or_else(|| "default".to_owned(), |dpi| dpi.to_string());
        let content = format!("plantuml:{}:{dpi}:{}", self.format.as_str(), self.source);
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// How render targets are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetNaming {
    /// `diagram_<hash>.<ext>`: edits produce a new file, unchanged diagrams
    /// are reused even when blocks move around.
    #[default]
    Content,
    /// `diagram<index>.<ext>`: stable names, but an existing file is reused
    /// even after its block was edited.
    Index,
}

impl TargetNaming {
    /// Parse naming scheme from a configuration value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "index" => Some(Self::Index),
            _ => None,
        }
    }

    /// File stem (no extension) for a block.
    #[must_use]
    pub fn file_stem(self, key: &DiagramKey<'_>, index: usize) -> String {
        match self {
            Self::Content => {
                let hash = key.compute_hash();
                format!("diagram_{}", &hash[..HASH_PREFIX_LEN])
            }
            Self::Index => format!("diagram{index}"),
        }
    }
}
