//! Word-processing document model.
//!
//! A [`Document`] owns the zip package it was read from, the parsed body part
//! and the parsed header/footer parts its sections reference. Paragraphs,
//! runs and tables are views over the underlying XML, so anything the model
//! does not understand (styles, numbering, drawings, fields) passes through
//! untouched.
//!
//! Traversal order, used for both text extraction and rewriting:
//!
//! 1. body paragraphs, then body tables
//! 2. for each section in order, its header and then its footer
//!
//! Inside any container the direct paragraphs come first and the direct
//! tables after them; a table is walked row by row, cell by cell, and each
//! cell is itself a container. A header or footer part shared by several
//! sections is walked once.

pub mod builder;
mod package;
pub mod xml;

use std::collections::{BTreeMap, BTreeSet};

pub use self::builder::DocxBuilder;
use self::package::Package;
use self::xml::{Element, Node, XmlTree};
use crate::error::DocumentError;

const W_BODY: &str = "w:body";
const W_P: &str = "w:p";
const W_PPR: &str = "w:pPr";
const W_R: &str = "w:r";
const W_RPR: &str = "w:rPr";
const W_T: &str = "w:t";
const W_TAB: &str = "w:tab";
const W_PTAB: &str = "w:ptab";
const W_BR: &str = "w:br";
const W_CR: &str = "w:cr";
const W_NO_BREAK_HYPHEN: &str = "w:noBreakHyphen";
const W_TBL: &str = "w:tbl";
const W_TR: &str = "w:tr";
const W_TC: &str = "w:tc";
const W_SECT_PR: &str = "w:sectPr";
const W_HEADER_REF: &str = "w:headerReference";
const W_FOOTER_REF: &str = "w:footerReference";

/// A section's page furniture. Values are package part names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// One XML part holding paragraphs: the body, a header or a footer.
#[derive(Debug, Clone)]
struct Story {
    part: String,
    tree: XmlTree,
    modified: bool,
}

impl Story {
    fn load(package: &Package, part: &str) -> Result<Self, DocumentError> {
        let bytes = package
            .get(part)
            .ok_or_else(|| DocumentError::MissingPart(part.to_string()))?;
        Ok(Self {
            part: part.to_string(),
            tree: XmlTree::parse(part, bytes)?,
            modified: false,
        })
    }
}

/// An opened `.docx` document.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    body: Story,
    sections: Vec<Section>,
    /// Header and footer stories keyed by part name.
    furniture: BTreeMap<String, Story>,
}

impl Document {
    /// Open a document from the bytes of a `.docx` package.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        let package = Package::read(bytes)?;
        let main_part = package.main_part()?;
        let body = Story::load(&package, &main_part)?;

        let body_el = body_element(&body.tree)
            .ok_or_else(|| DocumentError::MissingPart(format!("{} body", main_part)))?;
        let relationships = package.part_relationships(&main_part)?;

        let mut sections = Vec::new();
        let mut furniture = BTreeMap::new();
        for sect_pr in section_properties(body_el) {
            let header = default_reference(sect_pr, W_HEADER_REF)
                .and_then(|id| relationships.get(id))
                .map(|rel| rel.target.clone());
            let footer = default_reference(sect_pr, W_FOOTER_REF)
                .and_then(|id| relationships.get(id))
                .map(|rel| rel.target.clone());
            for part in header.iter().chain(footer.iter()) {
                if !furniture.contains_key(part) {
                    furniture.insert(part.clone(), Story::load(&package, part)?);
                }
            }
            sections.push(Section { header, footer });
        }

        tracing::debug!(
            main_part = %main_part,
            sections = sections.len(),
            furniture = furniture.len(),
            "opened document"
        );

        Ok(Self {
            package,
            body,
            sections,
            furniture,
        })
    }

    /// Serialize back to `.docx` bytes. Parts that were never modified are
    /// copied byte for byte.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut replaced = BTreeMap::new();
        for story in std::iter::once(&self.body).chain(self.furniture.values()) {
            if story.modified {
                replaced.insert(story.part.clone(), story.tree.to_bytes(&story.part)?);
            }
        }
        self.package.write(&replaced)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Plain text of every paragraph, in traversal order.
    pub fn paragraph_texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        for container in self.containers() {
            visit_paragraphs(container, &mut |p| texts.push(paragraph_text(p)));
        }
        texts
    }

    /// The text the scanner works on: non-blank paragraphs joined by `\n`.
    pub fn plain_text(&self) -> String {
        self.paragraph_texts()
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Visit every paragraph mutably, in traversal order.
    pub fn for_each_paragraph_mut(&mut self, mut f: impl FnMut(&mut Paragraph<'_>)) {
        let order = self.furniture_order();

        if let Some(body) = self.body.tree.root_mut().and_then(|r| r.child_mut(W_BODY)) {
            self.body.modified |= visit_paragraphs_mut(body, &mut f);
        }
        for part in order {
            if let Some(story) = self.furniture.get_mut(&part) {
                if let Some(root) = story.tree.root_mut() {
                    story.modified |= visit_paragraphs_mut(root, &mut f);
                }
            }
        }
    }

    fn containers(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        if let Some(body) = body_element(&self.body.tree) {
            out.push(body);
        }
        for part in self.furniture_order() {
            if let Some(root) = self.furniture.get(&part).and_then(|s| s.tree.root()) {
                out.push(root);
            }
        }
        out
    }

    /// For each section, its header part then its footer part. A part
    /// shared by several sections is listed once, at its first use.
    fn furniture_order(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.sections
            .iter()
            .flat_map(|s| s.header.iter().chain(s.footer.iter()))
            .filter(|part| seen.insert(part.as_str()))
            .cloned()
            .collect()
    }
}

fn body_element(tree: &XmlTree) -> Option<&Element> {
    tree.root().and_then(|root| root.child(W_BODY))
}

/// Section properties in section order: those carried by body paragraphs,
/// then the body's final one.
fn section_properties(body: &Element) -> Vec<&Element> {
    body.children
        .iter()
        .filter_map(|node| match node {
            Node::Element(el) if el.is(W_P) => el.child(W_PPR).and_then(|ppr| ppr.child(W_SECT_PR)),
            Node::Element(el) if el.is(W_SECT_PR) => Some(el),
            _ => None,
        })
        .collect()
}

/// Relationship id of the default header or footer reference. A reference
/// without a type is treated as the default one.
fn default_reference<'a>(sect_pr: &'a Element, reference: &str) -> Option<&'a str> {
    sect_pr
        .children_named(reference)
        .find(|r| matches!(r.attribute("w:type"), None | Some("default")))
        .and_then(|r| r.attribute("r:id"))
}

fn visit_paragraphs<'a>(container: &'a Element, f: &mut impl FnMut(&'a Element)) {
    for paragraph in container.children_named(W_P) {
        f(paragraph);
    }
    for table in container.children_named(W_TBL) {
        for row in table.children_named(W_TR) {
            for cell in row.children_named(W_TC) {
                visit_paragraphs(cell, f);
            }
        }
    }
}

/// Returns whether any paragraph reported a change.
fn visit_paragraphs_mut(container: &mut Element, f: &mut impl FnMut(&mut Paragraph<'_>)) -> bool {
    let mut changed = false;
    for element in container.children_named_mut(W_P) {
        let mut paragraph = Paragraph {
            element,
            changed: false,
        };
        f(&mut paragraph);
        changed |= paragraph.changed;
    }
    for table in container.children_named_mut(W_TBL) {
        for row in table.children_named_mut(W_TR) {
            for cell in row.children_named_mut(W_TC) {
                changed |= visit_paragraphs_mut(cell, f);
            }
        }
    }
    changed
}

/// Mutable view of one `w:p` element.
pub struct Paragraph<'a> {
    element: &'a mut Element,
    changed: bool,
}

impl Paragraph<'_> {
    /// Concatenated text of the paragraph's runs.
    pub fn text(&self) -> String {
        paragraph_text(self.element)
    }

    /// Text of each run, in order.
    pub fn run_texts(&self) -> Vec<String> {
        self.element.children_named(W_R).map(run_text).collect()
    }

    /// Replace the paragraph text, collapsing it into a single run.
    ///
    /// Every run loses its content but keeps its properties; the whole text is
    /// written into the first run, or into a new run when the paragraph has
    /// none. Character formatting that differed between runs is lost.
    pub fn set_text(&mut self, text: &str) {
        for run in self.element.children_named_mut(W_R) {
            run.children
                .retain(|node| matches!(node, Node::Element(el) if el.is(W_RPR)));
        }
        match self.element.child_mut(W_R) {
            Some(first) => append_run_content(first, text),
            None => {
                let mut run = Element::new(W_R);
                append_run_content(&mut run, text);
                self.element.children.push(Node::Element(run));
            }
        }
        self.changed = true;
    }
}

fn paragraph_text(paragraph: &Element) -> String {
    paragraph.children_named(W_R).map(run_text).collect()
}

fn run_text(run: &Element) -> String {
    let mut text = String::new();
    for node in &run.children {
        let Node::Element(el) = node else { continue };
        match el.name.as_str() {
            W_T => text.push_str(&el.text()),
            W_TAB | W_PTAB => text.push('\t'),
            W_CR => text.push('\n'),
            W_BR => {
                if matches!(el.attribute("w:type"), None | Some("textWrapping")) {
                    text.push('\n');
                }
            }
            W_NO_BREAK_HYPHEN => text.push('-'),
            _ => {}
        }
    }
    text
}

/// Append `text` to a run as `w:t`, `w:tab` and `w:br` children.
fn append_run_content(run: &mut Element, text: &str) {
    let mut pending = String::new();
    for ch in text.chars() {
        match ch {
            '\t' | '\n' | '\r' => {
                flush_text(run, &mut pending);
                let name = if ch == '\t' { W_TAB } else { W_BR };
                run.children.push(Node::Element(Element::new(name)));
            }
            other => pending.push(other),
        }
    }
    flush_text(run, &mut pending);
}

fn flush_text(run: &mut Element, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let mut t = Element::new(W_T);
    if pending.starts_with(char::is_whitespace) || pending.ends_with(char::is_whitespace) {
        t = t.with_attribute("xml:space", "preserve");
    }
    run.children
        .push(Node::Element(t.with_text(pending.as_str())));
    pending.clear();
}
