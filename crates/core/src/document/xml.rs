//! Lossless XML node tree for package parts.
//!
//! Elements keep their qualified names and attribute order exactly as read.
//! Declarations, comments and processing instructions are carried through as
//! opaque events, so a part that is parsed and written back without edits
//! differs from the original only in escaping details and in empty elements
//! being written self-closed.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::DocumentError;

#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Unescaped character data.
    Text(String),
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
pub struct Element {
    /// Qualified name, e.g. `w:p`.
    pub name: String,
    /// Attributes with unescaped values, in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Direct child elements with the given qualified name.
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    pub fn children_named_mut<'a, 'n>(
        &'a mut self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a mut Element> + 'n
    where
        'a: 'n,
    {
        self.children.iter_mut().filter_map(move |node| match node {
            Node::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.is(name) => Some(el),
            _ => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A parsed XML part.
#[derive(Debug, Clone)]
pub struct XmlTree {
    pub nodes: Vec<Node>,
}

impl XmlTree {
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| DocumentError::xml(part, e))?;
            match event {
                Event::Start(start) => stack.push(element_from(part, &start)?),
                Event::Empty(start) => {
                    let el = element_from(part, &start)?;
                    attach(&mut stack, &mut nodes, Node::Element(el));
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| DocumentError::xml(part, "unbalanced end tag"))?;
                    attach(&mut stack, &mut nodes, Node::Element(el));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| DocumentError::xml(part, e))?;
                    attach(&mut stack, &mut nodes, Node::Text(text.into_owned()));
                }
                Event::Eof => break,
                other => attach(&mut stack, &mut nodes, Node::Other(other.into_owned())),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocumentError::xml(part, "unclosed element at end of input"));
        }
        Ok(Self { nodes })
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn to_bytes(&self, part: &str) -> Result<Vec<u8>, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(part, &mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn element_from(part: &str, start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::xml(part, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::xml(part, e))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], nodes: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => nodes.push(node),
    }
}

fn write_node(part: &str, writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocumentError> {
    match node {
        Node::Element(el) => {
            let mut start = BytesStart::new(el.name.as_str());
            for (key, value) in &el.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if el.children.is_empty() {
                writer
                    .write_event(Event::Empty(start))
                    .map_err(|e| DocumentError::xml(part, e))?;
            } else {
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| DocumentError::xml(part, e))?;
                for child in &el.children {
                    write_node(part, writer, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(el.name.as_str())))
                    .map_err(|e| DocumentError::xml(part, e))?;
            }
        }
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| DocumentError::xml(part, e))?,
        Node::Other(event) => writer
            .write_event(event.clone())
            .map_err(|e| DocumentError::xml(part, e))?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="urn:w"><!-- note --><w:body><w:p><w:r><w:t xml:space="preserve">A &amp; B </w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

    #[test]
    fn parse_builds_nested_elements() {
        let tree = XmlTree::parse("sample.xml", SAMPLE.as_bytes()).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.name, "w:document");
        assert_eq!(root.attribute("xmlns:w"), Some("urn:w"));
        let body = root.child("w:body").unwrap();
        let t = body
            .child("w:p")
            .and_then(|p| p.child("w:r"))
            .and_then(|r| r.child("w:t"))
            .unwrap();
        assert_eq!(t.text(), "A & B ");
        assert_eq!(t.attribute("xml:space"), Some("preserve"));
        assert!(body.child("w:sectPr").is_some());
    }

    #[test]
    fn write_then_parse_keeps_structure_and_text() {
        let tree = XmlTree::parse("sample.xml", SAMPLE.as_bytes()).unwrap();
        let bytes = tree.to_bytes("sample.xml").unwrap();
        let written = String::from_utf8(bytes.clone()).unwrap();
        assert!(written.starts_with("<?xml"));
        assert!(written.contains("<!-- note -->"));
        assert!(written.contains("A &amp; B "));

        let again = XmlTree::parse("sample.xml", &bytes).unwrap();
        let t = again
            .root()
            .and_then(|r| r.child("w:body"))
            .and_then(|b| b.child("w:p"))
            .and_then(|p| p.child("w:r"))
            .and_then(|r| r.child("w:t"))
            .unwrap();
        assert_eq!(t.text(), "A & B ");
    }

    #[test]
    fn lookups_accept_short_lived_names() {
        let mut tree = XmlTree::parse("sample.xml", SAMPLE.as_bytes()).unwrap();
        let body = {
            let name = format!("w:{}", "body");
            tree.root().and_then(|r| r.child(&name)).unwrap()
        };
        assert_eq!(body.children_named("w:p").count(), 1);

        let root = tree.root_mut().unwrap();
        let body = {
            let name = String::from("w:body");
            root.child_mut(&name).unwrap()
        };
        let paragraphs = {
            let name = String::from("w:p");
            body.children_named_mut(&name).count()
        };
        assert_eq!(paragraphs, 1);
    }

    #[test]
    fn unbalanced_markup_is_an_error() {
        let err = XmlTree::parse("broken.xml", b"<a><b></a>").unwrap_err();
        assert!(matches!(err, DocumentError::Xml { .. }));
    }
}
