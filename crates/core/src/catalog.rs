//! The placeholder pattern catalog.
//!
//! Every syntax class the scanner recognizes lives here, together with its
//! label-extraction rule and its precedence rank. The scanner and the
//! rewriter both go through [`find_placeholders`], so a span that one of them
//! sees as a placeholder is always seen the same way by the other.
//!
//! Overlaps between classes are settled by precedence, never by the order in
//! which the regexes happen to run. The rank order is:
//!
//! 1. dollar-bracket `$[X]` (so `$[X]` never also yields a bracket match for `[X]`)
//! 2. double-brace `{{X}}`
//! 3. bracket `[X]`
//! 4. angle `<X>`
//! 5. underscore run `___`

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical label shared by every dollar-bracket placeholder.
pub const MONEY_LABEL: &str = "$[__________]";

/// Reserved label for underscore-run blanks.
pub const BLANK_LABEL: &str = "_____________";

/// Characters stripped from both ends of a raw token to build its label.
const WRAPPER_CHARS: [char; 8] = ['[', ']', '{', '}', '<', '>', '_', ' '];

// None of the patterns may cross a line break: paragraphs are joined with
// `\n`, and a token must never span two paragraphs.
static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]\n]+\]").expect("bracket pattern"));

static DOUBLE_BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^}\n]+\}\}").expect("double-brace pattern"));

static ANGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>\n]+>").expect("angle pattern"));

static MONEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[ \t]*\[[^\]\n]+\]").expect("money pattern"));

static BLANK_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{3,}").expect("blank-line pattern"));

/// A placeholder syntax class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `[COMPANY NAME]`
    Bracket,
    /// `{{COMPANY NAME}}`
    DoubleBrace,
    /// `<COMPANY NAME>`
    Angle,
    /// `$[__________]`, a monetary blank
    Money,
    /// `_____`, a blank line
    BlankLine,
}

/// The catalog, in declaration order.
pub const CATALOG: [PatternKind; 5] = [
    PatternKind::Bracket,
    PatternKind::DoubleBrace,
    PatternKind::Angle,
    PatternKind::Money,
    PatternKind::BlankLine,
];

impl PatternKind {
    /// Position in [`CATALOG`]. Used to break ties between matches that
    /// start at the same offset.
    pub fn catalog_index(self) -> usize {
        match self {
            PatternKind::Bracket => 0,
            PatternKind::DoubleBrace => 1,
            PatternKind::Angle => 2,
            PatternKind::Money => 3,
            PatternKind::BlankLine => 4,
        }
    }

    /// Overlap precedence; lower wins.
    pub fn precedence(self) -> u8 {
        match self {
            PatternKind::Money => 0,
            PatternKind::DoubleBrace => 1,
            PatternKind::Bracket => 2,
            PatternKind::Angle => 3,
            PatternKind::BlankLine => 4,
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            PatternKind::Bracket => &BRACKET_RE,
            PatternKind::DoubleBrace => &DOUBLE_BRACE_RE,
            PatternKind::Angle => &ANGLE_RE,
            PatternKind::Money => &MONEY_RE,
            PatternKind::BlankLine => &BLANK_LINE_RE,
        }
    }

    /// Extract the normalized label from a raw token of this kind.
    pub fn label(self, raw: &str) -> String {
        match self {
            PatternKind::Money => MONEY_LABEL.to_string(),
            PatternKind::BlankLine => BLANK_LABEL.to_string(),
            _ => normalize_label(raw),
        }
    }
}

/// Strip wrapper characters from both ends and upper-case.
pub fn normalize_label(raw: &str) -> String {
    raw.trim_matches(|c| WRAPPER_CHARS.contains(&c))
        .to_uppercase()
}

/// One placeholder span found in a piece of text. Offsets are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderMatch {
    pub kind: PatternKind,
    pub start: usize,
    pub end: usize,
}

impl PlaceholderMatch {
    pub fn raw<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    pub fn label(&self, text: &str) -> String {
        self.kind.label(self.raw(text))
    }

    fn overlaps(&self, other: &PlaceholderMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Find every placeholder in `text`, in reading order.
///
/// The returned spans never overlap. When two classes claim overlapping
/// text, the class with the better [`PatternKind::precedence`] keeps it and
/// the other match is discarded entirely.
pub fn find_placeholders(text: &str) -> Vec<PlaceholderMatch> {
    let mut candidates: Vec<PlaceholderMatch> = CATALOG
        .iter()
        .flat_map(|&kind| {
            kind.regex().find_iter(text).map(move |m| PlaceholderMatch {
                kind,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect();

    candidates.sort_by_key(|m| (m.kind.precedence(), m.start));

    let mut accepted: Vec<PlaceholderMatch> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if accepted.iter().any(|kept| kept.overlaps(&candidate)) {
            continue;
        }
        accepted.push(candidate);
    }

    accepted.sort_by_key(|m| (m.start, m.kind.catalog_index()));
    accepted
}
