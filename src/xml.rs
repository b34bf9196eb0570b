//! Owned element tree shared by the tier and turn document formats.
//!
//! Documents are small enough to be materialised whole. The tree keeps
//! element order, attribute order and mixed text so that a loaded tier
//! document can be edited in place and written back.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::DocumentError;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Empty element named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr)
    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Value of attribute `key`, if present
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set attribute `key`, keeping its position if it already exists
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Direct element children, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First descendant named `name`, depth-first in document order.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Mutable form of [`find`](Self::find)
    pub fn find_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        for child in &mut self.children {
            if let XmlNode::Element(e) = child {
                if e.name == name {
                    return Some(e);
                }
                if let Some(found) = e.find_mut(name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// All descendants named `name`, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in self.elements() {
            if child.name == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }

    /// Visit every descendant element in document order.
    pub fn visit_mut<F: FnMut(&mut XmlElement)>(&mut self, f: &mut F) {
        for child in &mut self.children {
            if let XmlNode::Element(e) = child {
                f(e);
                e.visit_mut(f);
            }
        }
    }

    /// Remove every descendant matching `pred`, returning how many were removed.
    pub fn remove_descendants<F: Fn(&XmlElement) -> bool>(&mut self, pred: &F) -> usize {
        let before = self.children.len();
        self.children
            .retain(|child| !matches!(child, XmlNode::Element(e) if pred(e)));
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            if let XmlNode::Element(e) = child {
                removed += e.remove_descendants(pred);
            }
        }
        removed
    }

    /// Concatenated text of this element and all its descendants.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, text: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => text.push_str(t),
                XmlNode::Element(e) => e.collect_text(text),
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Indentation between child elements is layout, not content.
    fn drop_layout_whitespace(&mut self) {
        if self.elements().next().is_some() {
            self.children.retain(
                |child| !matches!(child, XmlNode::Text(t) if t.chars().all(char::is_whitespace)),
            );
        }
    }
}

/// Parse a whole document into its root element.
///
/// The text is already decoded, so any `encoding` in the declaration is ignored.
pub fn parse_document(content: &str) -> Result<XmlElement, DocumentError> {
    read_tree(Reader::from_str(content))
}

/// Parse raw document bytes, decoding them as the BOM or the declared
/// `encoding` says (UTF-8 when neither is present).
pub fn parse_bytes(content: &[u8]) -> Result<XmlElement, DocumentError> {
    read_tree(Reader::from_reader(content))
}

fn read_tree(mut reader: Reader<&[u8]>) -> Result<XmlElement, DocumentError> {
    reader.config_mut().trim_text(false);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(element_from_start(&e, &reader)?),
            Event::Empty(e) => {
                let element = element_from_start(&e, &reader)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(e) => {
                let mut element = stack.pop().ok_or_else(|| {
                    DocumentError::UnbalancedTag(String::from_utf8_lossy(e.name().as_ref()).into_owned())
                })?;
                element.drop_layout_whitespace();
                attach(&mut stack, &mut root, element);
            }
            Event::Text(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&e.xml_content()?);
                }
            }
            Event::CData(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&e.decode()?);
                }
            }
            Event::GeneralRef(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or(DocumentError::NoRoot)
}

fn element_from_start(
    start: &BytesStart,
    reader: &Reader<&[u8]>,
) -> Result<XmlElement, DocumentError> {
    let name = reader.decoder().decode(start.name().as_ref())?.into_owned();
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr?;
        let key = reader.decoder().decode(attr.key.as_ref())?.into_owned();
        let value = attr.decode_and_unescape_value(reader.decoder())?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn resolve_entity(name: &str) -> String {
    if let Some(number) = name.strip_prefix('#') {
        let (radix, digits) = number
            .strip_prefix('x')
            .map_or((10, number), |hex| (16, hex));
        if let Some(c) = u32::from_str_radix(digits, radix)
            .ok()
            .and_then(char::from_u32)
        {
            return c.to_string();
        }
    } else {
        match name {
            "amp" => return "&".to_string(),
            "lt" => return "<".to_string(),
            "gt" => return ">".to_string(),
            "quot" => return "\"".to_string(),
            "apos" => return "'".to_string(),
            _ => {}
        }
    }
    // unknown entities stay verbatim
    format!("&{name};")
}

/// Serialise a document with two-space indentation and a UTF-8 declaration.
pub fn write_document(root: &XmlElement) -> Result<String, DocumentError> {
    let mut buffer = Vec::new();
    {
        let mut writer = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write_element(&mut writer, root)?;
    }
    let mut output = String::from_utf8_lossy(&buffer).into_owned();
    output.push('\n');
    Ok(output)
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
