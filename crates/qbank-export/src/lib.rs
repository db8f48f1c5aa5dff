//! qbank-export
//!
//! Printable documents from question lists: sanitized LaTeX assembly,
//! image validation, ordering and the external engine run.

pub mod assemble;
pub mod assets;
pub mod engine;
pub mod error;
pub mod escape;
pub mod ordering;
pub mod pipeline;
pub mod render;
pub mod sanitize;
pub mod styles;
pub mod template;

pub use engine::{CancelToken, Engine, LatexEngine};
pub use error::ExportError;
pub use pipeline::{Exporter, ExporterSettings, export_in_background};
