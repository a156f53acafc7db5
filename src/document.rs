//! Typed view of an XML configuration node.
//!
//! The live configuration and the agent metadata both arrive as XML. This
//! module parses them into an owned `Element` tree with ordered attributes,
//! so lookups have explicit absent (`None`), empty (`Some("")`) and present
//! states, and serializes the tree back for the replace operation.

use crate::error::TemplateError;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder form of `set_attr`.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Sets an attribute in place, appending it when new.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child with this name; empty when absent.
    pub fn child_text(&self, name: &str) -> &str {
        self.child(name).map(Element::text).unwrap_or("")
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Returns the named child, creating it with `init` when missing.
    pub fn ensure_child(&mut self, name: &str, init: impl FnOnce() -> Element) -> &mut Element {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.children.push(init());
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    pub fn retain_children(&mut self, keep: impl FnMut(&Element) -> bool) {
        self.children.retain(keep);
    }

    /// Depth-first list of every descendant (excluding self) with this name.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        collect_named(self, name, &mut out);
        out
    }

    /// Depth-first search including self.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pred))
    }

    pub fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        if pred(self) {
            return Some(self);
        }
        for child in &mut self.children {
            if let Some(found) = child.find_mut(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Parses the root element of `xml`. Returns `Ok(None)` when the input
    /// holds no element at all (empty or whitespace/prolog only).
    pub fn parse(xml: &str) -> Result<Option<Element>, TemplateError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|err| parse_error(&reader, err))?;
            match event {
                Event::Start(start) => {
                    let element = element_from_start(&start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| TemplateError::Parse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| TemplateError::Parse(err.to_string()))?;
                    append_text(&mut stack, &value);
                }
                Event::CData(data) => {
                    let raw = data.into_inner();
                    append_text(&mut stack, &String::from_utf8_lossy(&raw));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(TemplateError::Parse(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        Ok(root)
    }

    /// Like `parse`, but an input without a root element is an error.
    pub fn parse_required(xml: &str) -> Result<Element, TemplateError> {
        Element::parse(xml)?
            .ok_or_else(|| TemplateError::Parse("document has no root element".to_string()))
    }

    pub fn to_xml(&self) -> Result<String, TemplateError> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner())
            .map_err(|err| TemplateError::Runtime(format!("serialized XML is not UTF-8: {err}")))
    }
}

fn collect_named<'a>(element: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
    for child in &element.children {
        if child.name == name {
            out.push(child);
        }
        collect_named(child, name, out);
    }
}

fn parse_error(reader: &Reader<&[u8]>, err: quick_xml::Error) -> TemplateError {
    TemplateError::Parse(format!(
        "at byte {}: {err}",
        reader.buffer_position()
    ))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, TemplateError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|err| TemplateError::Parse(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| TemplateError::Parse(err.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), TemplateError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(TemplateError::Parse(
                "document has more than one root element".to_string(),
            ));
        }
    }
    Ok(())
}

fn append_text(stack: &mut [Element], value: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.push_str(value);
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), TemplateError> {
    let start = BytesStart::new(element.name.as_str()).with_attributes(
        element
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );

    if element.children.is_empty() && element.text.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&element.text)))
            .map_err(write_error)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

fn write_error(err: impl std::fmt::Display) -> TemplateError {
    TemplateError::Runtime(format!("serializing XML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: &str = r#"<?xml version="1.0"?>
<template id="web" class="ocf" provider="heartbeat" type="apache">
  <instance_attributes id="web-instance_attributes">
    <nvpair id="web-configfile" name="configfile" value="/etc/apache2/httpd.conf"/>
    <nvpair id="web-empty" name="empty" value=""/>
  </instance_attributes>
  <!-- comment -->
  <longdesc>Runs &amp; monitors</longdesc>
</template>"#;

    #[test]
    fn parse_keeps_attribute_presence_distinct_from_emptiness() {
        let root = Element::parse_required(NODE).unwrap();
        assert_eq!(root.name(), "template");
        assert_eq!(root.attr("provider"), Some("heartbeat"));
        assert_eq!(root.attr("missing"), None);

        let nvpairs: Vec<_> = root
            .child("instance_attributes")
            .unwrap()
            .children_named("nvpair")
            .collect();
        assert_eq!(nvpairs.len(), 2);
        assert_eq!(nvpairs[1].attr("value"), Some(""));
        assert_eq!(root.child_text("longdesc"), "Runs & monitors");
    }

    #[test]
    fn parse_returns_none_without_root() {
        assert_eq!(Element::parse("").unwrap(), None);
        assert_eq!(Element::parse("   \n").unwrap(), None);
        assert_eq!(Element::parse("<?xml version=\"1.0\"?>").unwrap(), None);
    }

    #[test]
    fn parse_rejects_malformed_documents() {
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("<a>").is_err());
        assert!(Element::parse("<a/><b/>").is_err());
    }

    #[test]
    fn serialization_escapes_and_reparses() {
        let element = Element::new("nvpair")
            .with_attr("name", "cmd")
            .with_attr("value", r#"echo "a" <b> & 'c'"#);
        let xml = element.to_xml().unwrap();
        let reparsed = Element::parse_required(&xml).unwrap();
        assert_eq!(reparsed, element);
    }

    #[test]
    fn find_mut_reaches_nested_nodes() {
        let mut root = Element::parse_required(NODE).unwrap();
        let nvpair = root
            .find_mut(&|e| e.attr("id") == Some("web-empty"))
            .unwrap();
        nvpair.set_attr("value", "filled");
        assert_eq!(
            root.descendants_named("nvpair")[1].attr("value"),
            Some("filled")
        );
    }
}
