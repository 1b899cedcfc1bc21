//! Shared plumbing for Office Open XML packages (docx, pptx).
//!
//! Parts are read from the zip container and parsed into a small element
//! tree. Element names drop their namespace prefix. Attribute keys keep it,
//! so `id` and `r:id` on the same element stay distinct.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::types::{LoadError, LoadResult, Metadata};

pub(crate) type Package = zip::ZipArchive<BufReader<File>>;

/// Open an OOXML package for reading.
pub(crate) fn open_package(path: &Path) -> LoadResult<Package> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    Ok(zip::ZipArchive::new(BufReader::new(file))?)
}

/// Read one part of the package as UTF-8 text.
pub(crate) fn read_part(package: &mut Package, path: &Path, name: &str) -> LoadResult<String> {
    let mut part = package.by_name(name)?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| LoadError::io(path, e))?;
    Ok(xml)
}

/// Read a part if the package contains it.
pub(crate) fn read_optional_part(
    package: &mut Package,
    path: &Path,
    name: &str,
) -> LoadResult<Option<String>> {
    match read_part(package, path, name) {
        Ok(xml) => Ok(Some(xml)),
        Err(LoadError::Archive(zip::result::ZipError::FileNotFound)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone)]
pub(crate) enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> LoadResult<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    /// Attribute by exact key, else the first one with that local name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .or_else(|| self.attrs.iter().find(|(k, _)| local_part(k) == key))
            .map(|(_, v)| v.as_str())
    }

    /// Prefixed attribute by local name, whatever the prefix (`r:id`).
    pub fn prefixed_attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.split_once(':').is_some_and(|(_, name)| name == local))
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// Direct child elements with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    /// Follow a chain of direct children.
    pub fn path(&self, names: &[&str]) -> Option<&XmlElement> {
        names
            .iter()
            .try_fold(self, |current, name| current.child(name))
    }

    /// All descendant elements with the given local name, in document order.
    /// Matches are not searched for further nested matches.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for el in self.elements() {
            if el.name == name {
                found.push(el);
            } else {
                el.collect_named(name, found);
            }
        }
    }

    /// Concatenated character data of the whole subtree.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(el) => el.push_text(out),
            }
        }
    }
}

fn local_part(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, local)| local)
}

/// Parse an XML part into its root element.
pub(crate) fn parse_xml(xml: &str) -> LoadResult<XmlElement> {
    let mut reader = Reader::from_str(xml);
    // Synthetic document node; the real root is its first element child.
    let mut stack = vec![XmlElement::default()];

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(XmlElement::from_start(&start)?),
            Event::Empty(start) => {
                let el = XmlElement::from_start(&start)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Element(el));
                }
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    if let Some(el) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(XmlNode::Element(el));
                        }
                    }
                }
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let document = stack.swap_remove(0);
    document
        .children
        .into_iter()
        .find_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
        .ok_or(LoadError::Xml(quick_xml::Error::Syntax(
            quick_xml::errors::SyntaxError::UnclosedTag,
        )))
}

/// Text of a DrawingML or WordprocessingML paragraph.
///
/// Only `t` runs contribute text; tabs and breaks become `\t` and `\n`.
pub(crate) fn paragraph_text(paragraph: &XmlElement) -> String {
    let mut out = String::new();
    push_run_text(paragraph, &mut out);
    out
}

fn push_run_text(el: &XmlElement, out: &mut String) {
    for child in el.elements() {
        match child.name.as_str() {
            "t" => out.push_str(&child.text()),
            "tab" => out.push('\t'),
            "br" | "cr" => out.push('\n'),
            _ => push_run_text(child, out),
        }
    }
}

/// Document properties from `docProps/core.xml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CoreProperties {
    pub title: String,
    pub author: String,
    pub created: String,
    pub modified: String,
}

impl CoreProperties {
    pub fn read(package: &mut Package, path: &Path) -> LoadResult<Self> {
        match read_optional_part(package, path, "docProps/core.xml")? {
            Some(xml) => Ok(Self::parse(&xml)?),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(xml: &str) -> LoadResult<Self> {
        let root = parse_xml(xml)?;
        let field = |name: &str| {
            root.child(name)
                .map(|el| el.text().trim().to_string())
                .unwrap_or_default()
        };
        Ok(Self {
            title: field("title"),
            author: field("creator"),
            created: field("created"),
            modified: field("modified"),
        })
    }

    pub fn insert_into(&self, metadata: &mut Metadata, with_modified: bool) {
        metadata.insert("title".into(), self.title.clone().into());
        metadata.insert("author".into(), self.author.clone().into());
        metadata.insert("created".into(), self.created.clone().into());
        if with_modified {
            metadata.insert("modified".into(), self.modified.clone().into());
        }
    }
}
