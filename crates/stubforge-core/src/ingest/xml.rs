//! Owned XML element tree and per-parse lookup tables for vendor exports.
//!
//! The vendor "simple structure" export is small enough to hold in memory, and
//! both diagram parsers need random access by id, so the quick-xml event
//! stream is folded into a tree once and every lookup table is derived from
//! that tree for the duration of a single parse call.

use std::collections::HashMap;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::{ForgeError, ForgeResult};

/// Document element every vendor export must start with.
pub const VENDOR_ROOT_ELEMENT: &str = "Project";

/// Attribute carrying the export structure marker.
pub const VENDOR_STRUCTURE_ATTR: &str = "Xml_structure";

/// Marker value of the supported export structure.
pub const VENDOR_STRUCTURE_SIMPLE: &str = "simple";

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Trimmed, non-empty attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("Id")
    }

    pub fn idref(&self) -> Option<&str> {
        self.attr("Idref")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.attr("Name")
    }

    /// A definition owns an `Id`; references only carry an `Idref`.
    pub fn is_definition(&self) -> bool {
        self.id().is_some() && self.idref().is_none()
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn first_child_element(&self) -> Option<&XmlElement> {
        self.children.first()
    }

    /// All descendants in document (pre-)order, excluding `self`.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
        self.descendants().into_iter().find(|e| e.name == name)
    }

    /// Descendant definitions with the given tag, in document order.
    pub fn definitions(&self, name: &str) -> Vec<&XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == name && e.is_definition())
            .collect()
    }

    /// Direct children, looking through `ModelChildren` wrappers.
    pub fn model_children(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        for child in &self.children {
            if child.name == "ModelChildren" {
                out.extend(child.model_children());
            } else {
                out.push(child);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn element_from_start(start: &BytesStart<'_>) -> XmlElement {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
    let attributes = start
        .attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).to_string();
            let value = match a.unescape_value() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(&a.value).to_string(),
            };
            (key, value)
        })
        .collect();
    XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    }
}

/// Attach a finished element to its parent, or make it the document root.
fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Parse an XML document into its root element.
pub fn parse_document(text: &str) -> ForgeResult<XmlElement> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => stack.push(element_from_start(e)),
            Event::Empty(ref e) => {
                let element = element_from_start(e);
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Text(ref e) => {
                if let Some(top) = stack.last_mut() {
                    let text = e.unescape()?;
                    top.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ForgeError::InvalidFormat(format!(
            "unexpected end of document inside <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or("?")
        )));
    }
    root.ok_or_else(|| ForgeError::InvalidFormat("document has no root element".to_string()))
}

/// Reject documents that are not a vendor "simple structure" export.
pub fn require_vendor_root(root: &XmlElement) -> ForgeResult<()> {
    if root.name != VENDOR_ROOT_ELEMENT {
        return Err(ForgeError::InvalidFormat(format!(
            "expected <{VENDOR_ROOT_ELEMENT}> root element, found <{}>",
            root.name
        )));
    }
    match root.attr(VENDOR_STRUCTURE_ATTR) {
        Some(v) if v.eq_ignore_ascii_case(VENDOR_STRUCTURE_SIMPLE) => Ok(()),
        Some(v) => Err(ForgeError::InvalidFormat(format!(
            "unsupported export structure {v:?}; re-export with the simple XML structure"
        ))),
        None => Err(ForgeError::InvalidFormat(format!(
            "missing {VENDOR_STRUCTURE_ATTR} marker on the root element"
        ))),
    }
}

/// Parse and validate a vendor export in one step.
pub fn parse_vendor_document(text: &str) -> ForgeResult<XmlElement> {
    let root = parse_document(text)?;
    require_vendor_root(&root)?;
    Ok(root)
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

/// Definitions keyed by `Id`, over one document.
pub struct ModelIndex<'a> {
    by_id: HashMap<&'a str, &'a XmlElement>,
}

impl<'a> ModelIndex<'a> {
    pub fn build(root: &'a XmlElement) -> Self {
        let mut by_id = HashMap::new();
        for element in root.descendants() {
            if !element.is_definition() {
                continue;
            }
            if let Some(id) = element.id() {
                by_id.entry(id).or_insert(element);
            }
        }
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&'a XmlElement> {
        self.by_id.get(id.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Id → name table over definitions with selected tags.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    names: HashMap<String, String>,
}

pub const OPERATION_TAGS: &[&str] = &["Operation"];

pub const DATA_TYPE_TAGS: &[&str] = &[
    "DataType",
    "Class",
    "Interface",
    "Enumeration",
    "PrimitiveType",
];

impl NameTable {
    pub fn build(root: &XmlElement, tags: &[&str]) -> Self {
        let mut names = HashMap::new();
        for element in root.descendants() {
            if !tags.contains(&element.name.as_str()) || !element.is_definition() {
                continue;
            }
            if let (Some(id), Some(name)) = (element.id(), element.display_name()) {
                names
                    .entry(id.to_string())
                    .or_insert_with(|| name.to_string());
            }
        }
        Self { names }
    }

    pub fn operations(root: &XmlElement) -> Self {
        Self::build(root, OPERATION_TAGS)
    }

    pub fn data_types(root: &XmlElement) -> Self {
        Self::build(root, DATA_TYPE_TAGS)
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of a reference element: its `Idref` looked up in the table, else
    /// its own `Name` copy.
    pub fn resolve_reference(&self, element: &XmlElement) -> Option<String> {
        if let Some(name) = element.idref().and_then(|id| self.get(id)) {
            return Some(name.to_string());
        }
        element.display_name().map(str::to_string)
    }

    /// Resolve an attribute that holds either an id or a literal name.
    pub fn resolve_id_or_name(&self, value: &str) -> String {
        self.get(value)
            .map(str::to_string)
            .unwrap_or_else(|| value.trim().to_string())
    }
}
