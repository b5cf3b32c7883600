//! Owned XML tree used as the backing store of every RSpec document.
//!
//! Element and attribute names are kept exactly as written (including any
//! namespace prefix). Lookups by element name compare the *local* part so
//! that `<node>`, `<default:node>` and `<ns:node>` are treated alike.
//! Attribute order is preserved, which makes serialization byte-stable.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Header written in front of every serialized document.
pub const XML_HEADER: &str = "<?xml version=\"1.0\"?>\n";

/// Errors raised while reading or writing XML text.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("xml syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("document has no root element")]
    Empty,

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("xml write error: {0}")]
    Write(String),
}

/// A node of the tree: either a nested element or a run of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with ordered attributes and mixed children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// Strip a namespace prefix: `planetlab:attribute` -> `attribute`.
pub fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder form of [`XmlElement::set_attr`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form that skips `None` values, so optional model fields can be
    /// chained without branching.
    pub fn with_opt_attr(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.set_attr(key, value);
        }
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name().eq_ignore_ascii_case(local)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, treating an empty string as absent.
    pub fn attr_string(&self, key: &str) -> Option<String> {
        self.attr(key).filter(|v| !v.is_empty()).map(str::to_string)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attributes.retain(|(k, _)| k != key);
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.is(local))
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Text of the named child element, if present and non-empty.
    pub fn child_text(&self, local: &str) -> Option<String> {
        self.child(local)
            .map(XmlElement::text)
            .filter(|t| !t.is_empty())
    }

    /// Keep only the child elements for which `keep` returns true. Text
    /// children are left in place.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|c| match c {
            XmlNode::Element(e) => keep(e),
            XmlNode::Text(_) => true,
        });
    }

    /// Remove every descendant element with the given local name.
    pub fn remove_descendants(&mut self, local: &str) {
        self.retain_elements(|e| !e.is(local));
        for child in self.elements_mut() {
            child.remove_descendants(local);
        }
    }

    /// All descendant elements with the given local name, depth first.
    pub fn descendants<'a>(&'a self, local: &str, out: &mut Vec<&'a XmlElement>) {
        for child in self.elements() {
            if child.is(local) {
                out.push(child);
            }
            child.descendants(local, out);
        }
    }

    /// Concatenated, trimmed text content of this element.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                text.push_str(t);
            }
        }
        text.trim().to_string()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|c| matches!(c, XmlNode::Element(_)));
        self.children.insert(0, XmlNode::Text(text.into()));
    }
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

fn syntax(position: u64, message: impl ToString) -> XmlError {
    XmlError::Syntax {
        position,
        message: message.to_string(),
    }
}

fn element_from(start: &BytesStart<'_>, position: u64) -> Result<XmlElement, XmlError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| syntax(position, e))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::MultipleRoots),
    }
}

/// Parse XML text into an owned tree. Declarations, comments and processing
/// instructions are discarded; whitespace-only text is trimmed away.
pub fn parse(text: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event().map_err(|e| syntax(position, e))? {
            Event::Start(start) => stack.push(element_from(&start, position)?),
            Event::Empty(start) => {
                let element = element_from(&start, position)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| syntax(position, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| syntax(position, e))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(XmlError::Unclosed(open.name));
    }
    root.ok_or(XmlError::Empty)
}

// ──────────────────────────────────────────────
// Writing
// ──────────────────────────────────────────────

fn write_err(e: impl std::fmt::Display) -> XmlError {
    XmlError::Write(e.to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(write_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(write_err)?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(write_err)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_err)?;
    Ok(())
}

/// Serialize a tree as `XML_HEADER` followed by a 2-space indented body.
pub fn to_string(root: &XmlElement) -> Result<String, XmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_element(&mut writer, root)?;
    let body =
        String::from_utf8(writer.into_inner()).map_err(write_err)?;
    Ok(format!("{XML_HEADER}{body}\n"))
}
