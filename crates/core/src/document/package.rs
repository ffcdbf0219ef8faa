//! OPC zip package: ordered entries plus relationship lookup.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::XmlTree;
use crate::error::DocumentError;

const PACKAGE_RELS: &str = "_rels/.rels";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
pub(crate) const DEFAULT_MAIN_PART: &str = "word/document.xml";

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Every entry of the zip, in archive order.
#[derive(Debug, Clone)]
pub(crate) struct Package {
    entries: Vec<Entry>,
}

impl Package {
    pub fn read(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(Entry { name, data });
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Write the package back, substituting `replaced` part bodies by name.
    pub fn write(&self, replaced: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, DocumentError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in &self.entries {
            let data = replaced.get(&entry.name).unwrap_or(&entry.data);
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    /// Name of the main document part, from the package relationships.
    pub fn main_part(&self) -> Result<String, DocumentError> {
        let rels = self.relationships(PACKAGE_RELS, "")?;
        let main = rels
            .values()
            .find(|rel| rel.rel_type.ends_with(OFFICE_DOCUMENT_REL))
            .map(|rel| rel.target.clone())
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());
        Ok(main)
    }

    /// Relationships of `part`, keyed by relationship id. Targets are
    /// resolved to package entry names.
    pub fn part_relationships(
        &self,
        part: &str,
    ) -> Result<BTreeMap<String, Relationship>, DocumentError> {
        let (dir, file) = match part.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", part),
        };
        let rels_name = if dir.is_empty() {
            format!("_rels/{}.rels", file)
        } else {
            format!("{}/_rels/{}.rels", dir, file)
        };
        self.relationships(&rels_name, dir)
    }

    fn relationships(
        &self,
        rels_name: &str,
        base_dir: &str,
    ) -> Result<BTreeMap<String, Relationship>, DocumentError> {
        let mut out = BTreeMap::new();
        let Some(bytes) = self.get(rels_name) else {
            return Ok(out);
        };
        let tree = XmlTree::parse(rels_name, bytes)?;
        let Some(root) = tree.root() else {
            return Ok(out);
        };
        for rel in root.children_named("Relationship") {
            if rel.attribute("TargetMode") == Some("External") {
                continue;
            }
            let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) else {
                continue;
            };
            out.insert(
                id.to_string(),
                Relationship {
                    rel_type: rel.attribute("Type").unwrap_or("").to_string(),
                    target: resolve_target(base_dir, target),
                },
            );
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub rel_type: String,
    /// Package entry name of the target.
    pub target: String,
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
