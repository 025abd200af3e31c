//! `PlantUML` diagrams for umlpress.
//!
//! This crate takes a Markdown document from raw text to a copy in which
//! every diagram block is replaced by an image reference:
//! - [`extract_blocks`] finds fenced and bare-marker diagram blocks
//! - [`ensure_wrapped`] and [`prepare_diagram_source`] normalize the source
//! - [`RenderDispatcher`] renders blocks on a bounded worker pool, skipping
//!   targets that already exist
//! - [`rewrite_document`] splices the results back in one pass
//!
//! # Architecture
//!
//! - [`block`]: `DiagramBlock`, `BlockKind`, `DiagramFormat`
//! - [`extract`]: line scanner for diagram blocks
//! - [`plantuml`]: marker wrapping, `!include` resolution, DPI injection
//! - [`cache`]: content hashing and target naming
//! - [`renderer`]: `DiagramRenderer` trait and the `PlantUML` CLI renderer
//! - [`render`]: `RenderDispatcher` and `RenderReport`
//! - [`rewrite`]: image references, failure notes, single-pass rewriting
//!
//! # Example
//!
//! ```ignore
//! use umlpress_diagrams::{
//!     extract_blocks, replacements_for, rewrite_document, DispatchSettings, PlantUmlCli,
//!     RenderDispatcher,
//! };
//!
//! let text = std::fs::read_to_string("doc.md")?;
//! let blocks = extract_blocks(&text);
//! let renderer = PlantUmlCli::new(&["plantuml".to_owned()]);
//! let dispatcher = RenderDispatcher::new(Box::new(renderer), DispatchSettings::new("diagrams"));
//! let report = dispatcher.dispatch(&blocks)?;
//! let replacements = replacements_for(&blocks, &report, |p| p.display().to_string(), "100%");
//! let rewritten = rewrite_document(&text, &replacements);
//! ```

pub mod block;
pub mod cache;
mod consts;
pub mod extract;
pub mod plantuml;
pub mod render;
pub mod renderer;
pub mod rewrite;

pub use block::{BlockKind, DiagramBlock, DiagramFormat};
pub use cache::{DiagramKey, TargetNaming};
pub use extract::extract_blocks;
pub use plantuml::{PrepareResult, ensure_wrapped, prepare_diagram_source};
pub use render::{DispatchError, DispatchSettings, RenderDispatcher, RenderOutcome, RenderReport};
pub use renderer::{DiagramRenderer, PlantUmlCli, RenderError, RenderErrorKind, RenderJob};
pub use rewrite::{Replacement, failure_note, image_reference, replacements_for, rewrite_document};
