//! Markdown to PDF build pipeline for umlpress.
//!
//! [`DocumentBuilder`] wires the stages together: read the document, extract
//! and render its diagrams, rewrite and sanitize a copy, then compile that
//! copy with Pandoc.

mod builder;

pub use builder::{BuildError, BuildReport, BuildSettings, DocumentBuilder};
