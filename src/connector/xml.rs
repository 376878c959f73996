//! Minimal namespace-agnostic XML tree for the legacy brief-search payload.
//!
//! The Primo XML mixes namespace prefixes: the first `DOC` element of a
//! result set may carry a different prefix than the ones that follow.
//! Keying the tree on local names absorbs that quirk in one place and gives
//! every document a uniform accessor, instead of branching on namespace
//! detection inside the parse loop.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::connector::ConnectorError;

/// One parsed element, attributes and names reduced to local names
#[derive(Debug, Clone, Default)]
pub(crate) struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document into a synthetic root node holding the top-level
    /// elements as children.
    pub fn parse(xml: &str) -> Result<XmlNode, ConnectorError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(node_from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let node = node_from_start(&e)?;
                    push_child(&mut stack, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| ConnectorError::Parse("XML: unbalanced element".into()))?;
                    push_child(&mut stack, node)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ConnectorError::Parse(format!("XML: {}", e)))?;
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text);
                    }
                }
                Ok(Event::CData(t)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(ConnectorError::Parse(format!("XML: {}", e))),
            }
        }

        if stack.len() != 1 {
            return Err(ConnectorError::Parse("XML: unclosed element".into()));
        }
        stack
            .pop()
            .ok_or_else(|| ConnectorError::Parse("XML: empty document".into()))
    }

    /// First direct child with the given local name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name
    pub fn children_named(&self, name: &str) -> Vec<&XmlNode> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// All descendants with the given local name, depth-first
    pub fn descendants(&self, name: &str) -> Vec<&XmlNode> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            found.extend(child.descendants(name));
        }
        found
    }

    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert into an opaque JSON shape for the `full_record` field
    pub fn to_value(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        if !self.attrs.is_empty() {
            let attrs: serde_json::Map<String, serde_json::Value> = self
                .attrs
                .iter()
                .map(|(n, v)| (n.clone(), serde_json::Value::String(v.clone())))
                .collect();
            object.insert("attrs".into(), serde_json::Value::Object(attrs));
        }
        if !self.text.is_empty() {
            object.insert("text".into(), serde_json::Value::String(self.text.clone()));
        }
        for child in &self.children {
            let entry = object
                .entry(child.name.clone())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let serde_json::Value::Array(list) = entry {
                list.push(child.to_value());
            }
        }
        serde_json::Value::Object(object)
    }
}

fn push_child(stack: &mut Vec<XmlNode>, node: XmlNode) -> Result<(), ConnectorError> {
    stack
        .last_mut()
        .ok_or_else(|| ConnectorError::Parse("XML: element outside document".into()))?
        .children
        .push(node);
    Ok(())
}

fn node_from_start(start: &BytesStart<'_>) -> Result<XmlNode, ConnectorError> {
    let mut node = XmlNode {
        name: local_name(start.name().as_ref()),
        ..Default::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ConnectorError::Parse(format!("XML attribute: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| ConnectorError::Parse(format!("XML attribute: {}", e)))?;
        node.attrs
            .push((local_name(attr.key.as_ref()), value.into_owned()));
    }
    Ok(node)
}

fn local_name(qname: &[u8]) -> String {
    let qname = String::from_utf8_lossy(qname);
    qname.rsplit(':').next().unwrap_or_default().to_string()
}
