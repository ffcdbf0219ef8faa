//! blankfill-core: placeholder scanning and rewriting for `.docx` templates.
//!
//! The pipeline is split so that each stage can be driven separately:
//!
//! - [`catalog`] -- the placeholder syntaxes and their precedence
//! - [`scanner`] -- find every occurrence in a document, with context windows
//! - [`payload`] -- the resolved values a caller hands back, ordered or labeled
//! - [`rewrite()`] -- substitute values into a copy of the document
//!
//! Deciding *what* value each occurrence gets is not done here; see the
//! `blankfill-resolve` crate.

pub mod catalog;
pub mod context;
pub mod document;
pub mod error;
pub mod payload;
pub mod rewrite;
pub mod scanner;

// ── Convenience re-exports ───────────────────────────────────────────

pub use catalog::{find_placeholders, normalize_label, PatternKind, BLANK_LABEL, MONEY_LABEL};
pub use document::{Document, DocxBuilder};
pub use error::{DocumentError, PayloadError, RewriteError};
pub use payload::{OrderedResponse, PayloadMode, ResponsesPayload};
pub use rewrite::{rewrite, rewrite_bytes, RewriteReport, SlotPolicy};
pub use scanner::{scan_document, scan_text, Occurrence, ScanOptions, ScanReport};
