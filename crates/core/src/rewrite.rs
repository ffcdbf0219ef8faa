//! Document rewriter: substitutes resolved values for placeholder spans.
//!
//! The rewriter never reuses occurrence ids from a scan. It re-scans every
//! paragraph with the same catalog, in the same traversal order the scanner
//! used, so ordered values line up with the occurrences the caller saw.
//!
//! A paragraph whose text changes is collapsed into a single run (see
//! [`Paragraph::set_text`](crate::document::Paragraph::set_text)).
//! Paragraphs without a replacement are left exactly as they were.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::{find_placeholders, normalize_label, PatternKind, BLANK_LABEL, MONEY_LABEL};
use crate::document::{Document, Paragraph};
use crate::error::RewriteError;
use crate::payload::ResponsesPayload;

/// What to do when an ordered payload does not have exactly one value per
/// placeholder found on re-scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotPolicy {
    /// Fill what lines up, leave the rest literally in place, log a warning.
    #[default]
    BestEffort,
    /// Refuse to rewrite anything.
    Strict,
}

/// Counters describing one rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteReport {
    /// Placeholders found by re-scanning the document.
    pub placeholders_found: usize,
    /// Entries in the payload.
    pub values_supplied: usize,
    /// Ordered mode: values taken from the front of the payload, blanks
    /// included.
    pub values_consumed: usize,
    /// Spans actually replaced.
    pub replacements: usize,
    /// Paragraphs collapsed because their text changed.
    pub paragraphs_rewritten: usize,
}

/// Rewrite a copy of `document`. The original is never touched.
pub fn rewrite(
    document: &Document,
    payload: &ResponsesPayload,
    policy: SlotPolicy,
) -> Result<(Document, RewriteReport), RewriteError> {
    let mut output = document.clone();
    let report = match payload {
        ResponsesPayload::Ordered(items) => {
            let values: Vec<&str> = items.iter().map(|item| item.value.as_str()).collect();
            rewrite_ordered(&mut output, &values, policy)?
        }
        ResponsesPayload::Labeled(map) => rewrite_labeled(&mut output, map),
    };
    Ok((output, report))
}

/// Open `bytes`, rewrite, and serialize the result.
pub fn rewrite_bytes(
    bytes: &[u8],
    payload: &ResponsesPayload,
    policy: SlotPolicy,
) -> Result<(Vec<u8>, RewriteReport), RewriteError> {
    let document = Document::from_bytes(bytes)?;
    let (output, report) = rewrite(&document, payload, policy)?;
    Ok((output.to_bytes()?, report))
}

/// Number of placeholders the rewriter will see in `document`.
pub fn count_placeholders(document: &Document) -> usize {
    document
        .paragraph_texts()
        .iter()
        .map(|text| find_placeholders(text).len())
        .sum()
}

fn rewrite_ordered(
    document: &mut Document,
    values: &[&str],
    policy: SlotPolicy,
) -> Result<RewriteReport, RewriteError> {
    let found = count_placeholders(document);
    if policy == SlotPolicy::Strict && found != values.len() {
        return Err(RewriteError::SlotMismatch {
            supplied: values.len(),
            found,
        });
    }

    let mut report = RewriteReport {
        placeholders_found: found,
        values_supplied: values.len(),
        ..RewriteReport::default()
    };
    let mut cursor = 0usize;

    document.for_each_paragraph_mut(|paragraph| {
        let text = paragraph.text();
        let mut edits = Vec::new();
        for m in find_placeholders(&text) {
            let Some(value) = values.get(cursor) else {
                break;
            };
            cursor += 1;
            if value.trim().is_empty() {
                continue;
            }
            tracing::debug!(slot = cursor - 1, raw = m.raw(&text), "replacing placeholder");
            edits.push((m.start, m.end, value.to_string()));
        }
        apply_edits(paragraph, &text, edits, &mut report);
    });

    report.values_consumed = cursor;
    if found > values.len() {
        tracing::warn!(
            found,
            supplied = values.len(),
            "fewer values than placeholders; the remaining placeholders are left unfilled"
        );
    } else if cursor < values.len() {
        tracing::warn!(
            found,
            supplied = values.len(),
            "more values than placeholders; the surplus values are ignored"
        );
    }
    Ok(report)
}

fn rewrite_labeled(document: &mut Document, map: &BTreeMap<String, String>) -> RewriteReport {
    let usable = |value: &&String| !value.trim().is_empty();
    let money = map.get(MONEY_LABEL).filter(usable).map(|v| format!("${}", v));
    let blank = map.get(BLANK_LABEL).filter(usable).cloned();
    let by_label = values_by_label(map);

    let mut report = RewriteReport {
        values_supplied: map.len(),
        ..RewriteReport::default()
    };

    document.for_each_paragraph_mut(|paragraph| {
        let text = paragraph.text();
        let mut edits = Vec::new();
        for m in find_placeholders(&text) {
            report.placeholders_found += 1;
            let replacement = match m.kind {
                PatternKind::Bracket | PatternKind::DoubleBrace => {
                    by_label.get(&m.label(&text)).map(|v| v.to_string())
                }
                PatternKind::Money => money.clone(),
                PatternKind::BlankLine => blank.clone(),
                PatternKind::Angle => None,
            };
            if let Some(value) = replacement {
                edits.push((m.start, m.end, value));
            }
        }
        apply_edits(paragraph, &text, edits, &mut report);
    });

    report
}

/// Usable label-mode values keyed by normalized label, sentinels excluded.
/// When several keys normalize to the same label the first key in map order
/// wins and the others are reported.
fn values_by_label(map: &BTreeMap<String, String>) -> HashMap<String, &str> {
    let mut by_label: HashMap<String, (&str, &str)> = HashMap::new();
    for (key, value) in map {
        if key == MONEY_LABEL || key == BLANK_LABEL || value.trim().is_empty() {
            continue;
        }
        let label = normalize_label(key);
        match by_label.get(&label) {
            Some((kept, _)) => tracing::warn!(
                label = %label,
                kept = %kept,
                ignored = %key,
                "several responses normalize to the same label; keeping the first"
            ),
            None => {
                by_label.insert(label, (key.as_str(), value.as_str()));
            }
        }
    }
    by_label
        .into_iter()
        .map(|(label, (_, value))| (label, value))
        .collect()
}

/// Splice non-overlapping `(start, end, value)` edits, given in reading
/// order, into `text` and write the result back if it differs.
fn apply_edits(
    paragraph: &mut Paragraph<'_>,
    text: &str,
    edits: Vec<(usize, usize, String)>,
    report: &mut RewriteReport,
) {
    if edits.is_empty() {
        return;
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, end, value) in &edits {
        out.push_str(&text[last..*start]);
        out.push_str(value);
        last = *end;
    }
    out.push_str(&text[last..]);

    report.replacements += edits.len();
    if out != text {
        paragraph.set_text(&out);
        report.paragraphs_rewritten += 1;
    }
}
