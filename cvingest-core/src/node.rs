//! Generic tree representation of one XML record.
//!
//! Every element becomes an [XmlNode]: attributes are stored under keys prefixed with
//! [ATTR_PREFIX], element text under [TEXT_KEY], and child elements under their tag
//! name. A tag seen once is a [XmlValue::Node]; a repeated tag becomes a
//! [XmlValue::List]. Consumers never rely on that distinction, the list accessors
//! normalize singletons.
//!
//! Domain constructors take nodes by value and consume the keys they recognise with
//! the `take_*` family. Whatever is left afterwards is kept verbatim as a JSON payload.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::errors::{IngestError, Result};

pub const ATTR_PREFIX: char = '@';
pub const TEXT_KEY: &str = "$";

#[derive(Debug, Clone, PartialEq)]
pub enum XmlValue {
    Text(String),
    Node(XmlNode),
    List(Vec<XmlNode>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    entries: BTreeMap<String, XmlValue>,
}

fn attr_key(name: &str) -> String {
    format!("{ATTR_PREFIX}{name}")
}

impl XmlValue {
    ///
    /// Normalize a value to a list of nodes. Bare text is wrapped into a node holding
    /// it under [TEXT_KEY].
    ///
    pub fn into_list(self) -> Vec<XmlNode> {
        match self {
            XmlValue::Node(node) => vec![node],
            XmlValue::List(nodes) => nodes,
            XmlValue::Text(text) => {
                let mut node = XmlNode::new();
                node.append_text(&text);
                vec![node]
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            XmlValue::Text(text) => Value::String(text.clone()),
            XmlValue::Node(node) => node.to_json(),
            XmlValue::List(nodes) => Value::Array(nodes.iter().map(XmlNode::to_json).collect()),
        }
    }
}

impl XmlNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    // ---------------------------------------------------------------------
    // building
    // ---------------------------------------------------------------------

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .insert(attr_key(name), XmlValue::Text(value.into()));
    }

    /// Append character data. Separate text runs of one element are joined.
    pub fn append_text(&mut self, text: &str) {
        match self.entries.get_mut(TEXT_KEY) {
            Some(XmlValue::Text(existing)) => existing.push_str(text),
            _ => {
                self.entries
                    .insert(TEXT_KEY.to_string(), XmlValue::Text(text.to_string()));
            }
        }
    }

    /// Attach a child element, turning a previously single child of the same tag into a list.
    pub fn push_child(&mut self, tag: &str, child: XmlNode) {
        match self.entries.remove(tag) {
            None | Some(XmlValue::Text(_)) => {
                self.entries.insert(tag.to_string(), XmlValue::Node(child));
            }
            Some(XmlValue::Node(first)) => {
                self.entries
                    .insert(tag.to_string(), XmlValue::List(vec![first, child]));
            }
            Some(XmlValue::List(mut nodes)) => {
                nodes.push(child);
                self.entries.insert(tag.to_string(), XmlValue::List(nodes));
            }
        }
    }

    /// Insert a value under a raw key, replacing what was there.
    pub fn insert(&mut self, key: &str, value: XmlValue) {
        self.entries.insert(key.to_string(), value);
    }

    // ---------------------------------------------------------------------
    // read-only access
    // ---------------------------------------------------------------------

    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self.entries.get(&attr_key(name)) {
            Some(XmlValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self.entries.get(TEXT_KEY) {
            Some(XmlValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// All children with the given tag, singletons normalized to a one-element list.
    pub fn children(&self, tag: &str) -> Vec<&XmlNode> {
        match self.entries.get(tag) {
            Some(XmlValue::Node(node)) => vec![node],
            Some(XmlValue::List(nodes)) => nodes.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// The first child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&XmlNode> {
        self.children(tag).into_iter().next()
    }

    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).and_then(XmlNode::text)
    }

    /// Follow a path of tags, taking the first child at each step.
    pub fn get_path(&self, path: &[&str]) -> Option<&XmlNode> {
        let mut current = self;
        for tag in path {
            current = current.child(tag)?;
        }
        Some(current)
    }

    // ---------------------------------------------------------------------
    // read-and-consume access
    // ---------------------------------------------------------------------

    pub fn take(&mut self, key: &str) -> Option<XmlValue> {
        self.entries.remove(key)
    }

    pub fn take_attr(&mut self, name: &str) -> Option<String> {
        match self.entries.remove(&attr_key(name)) {
            Some(XmlValue::Text(value)) => Some(value),
            Some(other) => {
                // not an attribute after all, leave it in place
                self.entries.insert(attr_key(name), other);
                None
            }
            None => None,
        }
    }

    pub fn take_text(&mut self) -> Option<String> {
        match self.entries.remove(TEXT_KEY) {
            Some(XmlValue::Text(value)) => Some(value),
            Some(other) => {
                self.entries.insert(TEXT_KEY.to_string(), other);
                None
            }
            None => None,
        }
    }

    /// Remove and return every child with the given tag as a list.
    pub fn take_list(&mut self, tag: &str) -> Vec<XmlNode> {
        self.entries
            .remove(tag)
            .map(XmlValue::into_list)
            .unwrap_or_default()
    }

    ///
    /// Remove and return the single child with the given tag.
    ///
    /// # Arguments
    /// - tag: child tag
    /// - context: accession or id of the record being built, used in the error message
    ///
    /// # Errors
    /// [IngestError::UnexpectedCardinality] when the tag occurs more than once.
    ///
    pub fn take_one(&mut self, tag: &str, context: &str) -> Result<Option<XmlNode>> {
        let mut nodes = self.take_list(tag);
        match nodes.len() {
            0 => Ok(None),
            1 => Ok(nodes.pop()),
            _ => Err(IngestError::cardinality(context, tag)),
        }
    }

    ///
    /// Take the text of a singular child element. Anything else the child carried
    /// (attributes, nested elements) stays behind so it ends up in the payload.
    ///
    pub fn take_child_text(&mut self, tag: &str, context: &str) -> Result<Option<String>> {
        let Some(mut child) = self.take_one(tag, context)? else {
            return Ok(None);
        };
        let text = child.take_text();
        if !child.is_empty() {
            self.entries.insert(tag.to_string(), XmlValue::Node(child));
        }
        Ok(text)
    }

    /// Take an attribute of a singular child element, leaving the rest of the child in place.
    pub fn take_child_attr(&mut self, tag: &str, name: &str, context: &str) -> Result<Option<String>> {
        let Some(mut child) = self.take_one(tag, context)? else {
            return Ok(None);
        };
        let value = child.take_attr(name);
        if !child.is_empty() {
            self.entries.insert(tag.to_string(), XmlValue::Node(child));
        }
        Ok(value)
    }

    /// Take the text of every child with the given tag.
    pub fn take_child_texts(&mut self, tag: &str) -> Vec<String> {
        let mut texts = Vec::new();
        let mut leftovers = Vec::new();
        for mut child in self.take_list(tag) {
            if let Some(text) = child.take_text() {
                texts.push(text);
            }
            if !child.is_empty() {
                leftovers.push(child);
            }
        }
        match leftovers.len() {
            0 => {}
            1 => self.push_child(tag, leftovers.remove(0)),
            _ => self.insert(tag, XmlValue::List(leftovers)),
        }
        texts
    }

    // ---------------------------------------------------------------------
    // payload
    // ---------------------------------------------------------------------

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Convert the remainder into a payload value, `None` when nothing is left.
    pub fn into_content(self) -> Option<Value> {
        if self.is_empty() {
            None
        } else {
            Some(self.to_json())
        }
    }
}

impl From<XmlNode> for Value {
    fn from(node: XmlNode) -> Self {
        node.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn name_node() -> XmlNode {
        let mut element_value = XmlNode::new();
        element_value.set_attr("Type", "Preferred");
        element_value.append_text("Hereditary cancer");

        let mut name = XmlNode::new();
        name.push_child("ElementValue", element_value);

        let mut trait_node = XmlNode::new();
        trait_node.set_attr("ID", "9580");
        trait_node.push_child("Name", name);
        trait_node
    }

    #[rstest]
    fn test_push_child_promotes_to_list() {
        let mut parent = XmlNode::new();
        parent.push_child("Gene", XmlNode::new());
        assert!(matches!(parent.get("Gene"), Some(XmlValue::Node(_))));
        parent.push_child("Gene", XmlNode::new());
        parent.push_child("Gene", XmlNode::new());
        assert_eq!(parent.children("Gene").len(), 3);
    }

    #[rstest]
    fn test_attr_and_path_access(name_node: XmlNode) {
        assert_eq!(name_node.attr("ID"), Some("9580"));
        let value = name_node.get_path(&["Name", "ElementValue"]).unwrap();
        assert_eq!(value.text(), Some("Hereditary cancer"));
        assert_eq!(value.attr("Type"), Some("Preferred"));
    }

    #[rstest]
    fn test_take_consumes_keys(mut name_node: XmlNode) {
        assert_eq!(name_node.take_attr("ID"), Some("9580".to_string()));
        assert_eq!(name_node.take_attr("ID"), None);
        let mut name = name_node.take_one("Name", "9580").unwrap().unwrap();
        assert!(name_node.is_empty());
        let values = name.take_list("ElementValue");
        assert_eq!(values.len(), 1);
        assert!(name.is_empty());
    }

    #[rstest]
    fn test_take_one_rejects_repeats() {
        let mut parent = XmlNode::new();
        parent.push_child("Name", XmlNode::new());
        parent.push_child("Name", XmlNode::new());
        let err = parent.take_one("Name", "VCV000000001").unwrap_err();
        assert!(matches!(err, IngestError::UnexpectedCardinality { .. }));
        assert!(err.to_string().contains("VCV000000001"));
    }

    #[rstest]
    fn test_take_child_text_keeps_leftovers() {
        let mut description = XmlNode::new();
        description.set_attr("SubmissionCount", "2");
        description.append_text("Pathogenic");
        let mut parent = XmlNode::new();
        parent.push_child("Description", description);

        let text = parent.take_child_text("Description", "RCV1").unwrap();
        assert_eq!(text, Some("Pathogenic".to_string()));
        assert_eq!(parent.to_json(), json!({"Description": {"@SubmissionCount": "2"}}));

        assert_eq!(parent.take_child_attr("Description", "SubmissionCount", "RCV1").unwrap(), Some("2".to_string()));
        assert!(parent.is_empty());
    }

    #[rstest]
    fn test_take_child_texts() {
        let mut parent = XmlNode::new();
        for change in ["G12D", "G13D"] {
            let mut node = XmlNode::new();
            node.append_text(change);
            parent.push_child("ProteinChange", node);
        }
        assert_eq!(parent.take_child_texts("ProteinChange"), vec!["G12D", "G13D"]);
        assert!(parent.is_empty());
    }

    #[rstest]
    fn test_into_content(name_node: XmlNode) {
        assert_eq!(XmlNode::new().into_content(), None);
        assert_eq!(
            name_node.into_content(),
            Some(json!({
                "@ID": "9580",
                "Name": {"ElementValue": {"$": "Hereditary cancer", "@Type": "Preferred"}}
            }))
        );
    }
}
