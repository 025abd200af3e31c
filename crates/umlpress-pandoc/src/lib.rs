//! PDF compilation for umlpress.
//!
//! - [`sanitize`]: escapes TeX-hostile text and turns `---` separators into
//!   page breaks, leaving front matter and code alone
//! - [`driver`]: runs Pandoc with an ordered list of font pairs until one
//!   attempt produces the PDF

pub mod driver;
pub mod sanitize;

pub use driver::{CompileError, CompileSuccess, FontPair, PandocDriver};
pub use sanitize::{sanitize, split_front_matter};
