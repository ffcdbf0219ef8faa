//! Minimal `.docx` writer for templates built in code.
//!
//! Produces a package with one section, optionally with a default header
//! and footer. Used to generate fixtures and sample templates.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::xml::{Element, Node, XmlTree};
use super::{append_run_content, W_BODY, W_FOOTER_REF, W_HEADER_REF, W_P, W_R, W_SECT_PR, W_TBL, W_TC, W_TR};
use crate::error::DocumentError;

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/><Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const HEADER_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const FOOTER_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";

#[derive(Debug, Clone)]
enum Block {
    /// One paragraph, given as its runs.
    Paragraph(Vec<String>),
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Clone, Default)]
pub struct DocxBuilder {
    body: Vec<Block>,
    header: Vec<String>,
    footer: Vec<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A body paragraph with a single run.
    pub fn paragraph(self, text: &str) -> Self {
        self.runs(&[text])
    }

    /// A body paragraph split across several runs.
    pub fn runs(mut self, runs: &[&str]) -> Self {
        self.body
            .push(Block::Paragraph(runs.iter().map(|r| r.to_string()).collect()));
        self
    }

    /// A table; each cell holds one single-run paragraph.
    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        self.body.push(Block::Table(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        ));
        self
    }

    pub fn header(mut self, text: &str) -> Self {
        self.header.push(text.to_string());
        self
    }

    pub fn footer(mut self, text: &str) -> Self {
        self.footer.push(text.to_string());
        self
    }

    pub fn build(&self) -> Result<Vec<u8>, DocumentError> {
        let mut rels = Element::new("Relationships").with_attribute(
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/relationships",
        );
        let mut sect_pr = Element::new(W_SECT_PR);
        let mut parts: Vec<(&str, Vec<u8>)> = Vec::new();

        if !self.header.is_empty() {
            rels.children.push(Node::Element(relationship("rIdHeader1", HEADER_REL_TYPE, "header1.xml")));
            sect_pr.children.push(Node::Element(reference(W_HEADER_REF, "rIdHeader1")));
            parts.push(("word/header1.xml", story_part("w:hdr", &self.header)?));
        }
        if !self.footer.is_empty() {
            rels.children.push(Node::Element(relationship("rIdFooter1", FOOTER_REL_TYPE, "footer1.xml")));
            sect_pr.children.push(Node::Element(reference(W_FOOTER_REF, "rIdFooter1")));
            parts.push(("word/footer1.xml", story_part("w:ftr", &self.footer)?));
        }

        let mut body = Element::new(W_BODY);
        for block in &self.body {
            let element = match block {
                Block::Paragraph(runs) => paragraph(runs),
                Block::Table(rows) => table(rows),
            };
            body.children.push(Node::Element(element));
        }
        body.children.push(Node::Element(sect_pr));

        let mut document = Element::new("w:document")
            .with_attribute("xmlns:w", WORDML_NS)
            .with_attribute("xmlns:r", REL_NS);
        document.children.push(Node::Element(body));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut put = |name: &str, data: &[u8]| -> Result<(), DocumentError> {
            writer.start_file(name, options)?;
            writer.write_all(data)?;
            Ok(())
        };
        put("[Content_Types].xml", CONTENT_TYPES.as_bytes())?;
        put("_rels/.rels", PACKAGE_RELS.as_bytes())?;
        put("word/document.xml", &to_part("word/document.xml", document)?)?;
        put("word/_rels/document.xml.rels", &to_part("word/_rels/document.xml.rels", rels)?)?;
        for (name, data) in &parts {
            put(name, data)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

fn to_part(part: &str, root: Element) -> Result<Vec<u8>, DocumentError> {
    let decl = Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))).into_owned();
    XmlTree {
        nodes: vec![Node::Other(decl), Node::Element(root)],
    }
    .to_bytes(part)
}

fn story_part(root: &str, paragraphs: &[String]) -> Result<Vec<u8>, DocumentError> {
    let mut element = Element::new(root)
        .with_attribute("xmlns:w", WORDML_NS)
        .with_attribute("xmlns:r", REL_NS);
    for text in paragraphs {
        element
            .children
            .push(Node::Element(paragraph(std::slice::from_ref(text))));
    }
    to_part(root, element)
}

fn paragraph(runs: &[String]) -> Element {
    let mut p = Element::new(W_P);
    for text in runs {
        let mut run = Element::new(W_R);
        append_run_content(&mut run, text);
        p.children.push(Node::Element(run));
    }
    p
}

fn table(rows: &[Vec<String>]) -> Element {
    let mut tbl = Element::new(W_TBL);
    for row in rows {
        let mut tr = Element::new(W_TR);
        for cell in row {
            let mut tc = Element::new(W_TC);
            tc.children
                .push(Node::Element(paragraph(std::slice::from_ref(cell))));
            tr.children.push(Node::Element(tc));
        }
        tbl.children.push(Node::Element(tr));
    }
    tbl
}

fn relationship(id: &str, rel_type: &str, target: &str) -> Element {
    Element::new("Relationship")
        .with_attribute("Id", id)
        .with_attribute("Type", rel_type)
        .with_attribute("Target", target)
}

fn reference(name: &str, id: &str) -> Element {
    Element::new(name)
        .with_attribute("w:type", "default")
        .with_attribute("r:id", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn built_package_opens_with_body_header_and_footer() {
        let bytes = DocxBuilder::new()
            .paragraph("Hello [NAME]")
            .table(&[&["a", "b"], &["c", "d"]])
            .header("Header <X>")
            .footer("Footer")
            .build()
            .unwrap();
        let doc = Document::from_bytes(&bytes).unwrap();
        assert_eq!(
            doc.paragraph_texts(),
            vec!["Hello [NAME]", "a", "b", "c", "d", "Header <X>", "Footer"]
        );
        assert_eq!(doc.sections().len(), 1);
        assert_eq!(doc.sections()[0].header.as_deref(), Some("word/header1.xml"));
    }
}
