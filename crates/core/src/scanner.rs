//! Placeholder scanner: plain text in, ordered occurrences and context out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{find_placeholders, PatternKind};
use crate::context::{WordIndex, DEFAULT_RADIUS};
use crate::document::Document;

/// Default number of characters kept in the text preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 500;

/// One placeholder token found at a specific position of the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Ordinal position in reading order, starting at 0.
    pub id: usize,
    /// The token exactly as it appears in the text.
    pub raw: String,
    /// Normalized identity used to detect the same blank repeated.
    pub label: String,
    pub kind: PatternKind,
    /// Byte offset of the first character of `raw`.
    pub start: usize,
    /// Byte offset one past the last character of `raw`.
    pub end: usize,
}

/// Tuning knobs for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Words kept on each side of an occurrence in its context window.
    pub context_radius: usize,
    /// Characters kept in the text preview before truncation.
    pub preview_chars: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            context_radius: DEFAULT_RADIUS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Result of scanning a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub text_preview: String,
    pub occurrences: Vec<Occurrence>,
    /// Occurrence id to the words surrounding it.
    pub context_map: BTreeMap<usize, String>,
}

impl ScanReport {
    pub fn context(&self, id: usize) -> &str {
        self.context_map.get(&id).map(String::as_str).unwrap_or("")
    }
}

/// Scan plain text.
///
/// Deterministic: scanning the same text twice yields identical reports,
/// ids included.
pub fn scan_text(text: &str, options: &ScanOptions) -> ScanReport {
    let words = WordIndex::new(text);

    let occurrences: Vec<Occurrence> = find_placeholders(text)
        .into_iter()
        .enumerate()
        .map(|(id, m)| Occurrence {
            id,
            raw: m.raw(text).to_string(),
            label: m.label(text),
            kind: m.kind,
            start: m.start,
            end: m.end,
        })
        .collect();

    let context_map = occurrences
        .iter()
        .map(|occ| {
            (
                occ.id,
                words.window(occ.start, occ.end, options.context_radius),
            )
        })
        .collect();

    tracing::debug!(
        occurrences = occurrences.len(),
        words = words.word_count(),
        "scanned text"
    );

    ScanReport {
        text_preview: text_preview(text, options.preview_chars),
        occurrences,
        context_map,
    }
}

/// Scan a document's text in rewrite traversal order.
pub fn scan_document(document: &Document, options: &ScanOptions) -> ScanReport {
    scan_text(&document.plain_text(), options)
}

/// The first `max_chars` characters of `text`, with `...` appended when
/// anything was cut.
pub fn text_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
