//! Diagram block types shared by extraction, rendering and rewriting.

/// How a diagram block is delimited in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A ```` ```plantuml ```` (or `~~~puml`) code fence.
    Fenced,
    /// Bare `@start...`/`@end...` markers outside any fence.
    Inline,
}

impl BlockKind {
    /// Return kind as string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fenced => "fenced",
            Self::Inline => "inline",
        }
    }
}

/// Image format produced by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramFormat {
    /// Raster output, the safest choice for LaTeX engines.
    #[default]
    Png,
    /// Vector output (Pandoc needs `rsvg-convert` to embed it in a PDF).
    Svg,
}

impl DiagramFormat {
    /// Parse format from a configuration value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "png" => Some(Self::Png),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Return format as string representation (also the file extension).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// A diagram found in the document.
///
/// Offsets are byte positions in the original text; they are only valid
/// against that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// One-based position among all blocks, in document order.
    pub index: usize,
    /// Delimiter style.
    pub kind: BlockKind,
    /// One-based line number where the block starts.
    pub line: usize,
    /// Byte offset of the first character of the block.
    pub start: usize,
    /// Byte offset one past the last character of the block.
    pub end: usize,
    /// `PlantUML` source: the fence body, or the whole marker-delimited text.
    pub source: String,
}

impl DiagramBlock {
    /// The block's span in the original text.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}
