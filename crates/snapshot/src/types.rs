//! Snapshot records: the replayable, plain-data form of a live node
//!
//! One variant per node kind, each carrying only what replay needs. The
//! serde shape is the wire format (`type` discriminator, camelCase fields,
//! false flags omitted).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot id, unique within one recording
pub type Id = i32;

/// Id of a node that was deliberately left out of the tree
pub const IGNORED_NODE: Id = -2;

/// What `Mirror::get_id` reports for nodes it has never seen
pub const UNKNOWN_NODE: Id = -1;

/// Attribute values are strings on the wire, except for a few synthetic
/// attributes (`checked`, `selected`, scroll offsets, media time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Node kind of a record, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Document,
    DocumentType,
    Element,
    Text,
    Comment,
    CData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    #[serde(default)]
    pub child_nodes: Vec<SerializedNode>,
    /// Only present for non-standards documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compat_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTypeNode {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag_name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub child_nodes: Vec<SerializedNode>,
    #[serde(rename = "isSVG", default, skip_serializing_if = "is_false")]
    pub is_svg: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_shadow_host: bool,
}

impl ElementNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttributeValue::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub text_content: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_style: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub text_content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CDataNode {
    pub text_content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeData {
    Document(DocumentNode),
    DocumentType(DocumentTypeNode),
    Element(ElementNode),
    Text(TextNode),
    Comment(CommentNode),
    #[serde(rename = "cdata")]
    CData(CDataNode),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Document(_) => NodeKind::Document,
            NodeData::DocumentType(_) => NodeKind::DocumentType,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::CData(_) => NodeKind::CData,
        }
    }
}

/// A finished snapshot node with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: Id,
    /// Id of the owning document when that is not the recorded top document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<Id>,
    /// Child of a native shadow root
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_shadow: bool,
    #[serde(flatten)]
    pub data: NodeData,
}

impl SerializedNode {
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Children for documents and elements, empty for leaves
    pub fn child_nodes(&self) -> &[SerializedNode] {
        match &self.data {
            NodeData::Document(doc) => &doc.child_nodes,
            NodeData::Element(el) => &el.child_nodes,
            _ => &[],
        }
    }

    pub fn child_nodes_mut(&mut self) -> Option<&mut Vec<SerializedNode>> {
        match &mut self.data {
            NodeData::Document(doc) => Some(&mut doc.child_nodes),
            NodeData::Element(el) => Some(&mut el.child_nodes),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match &self.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.as_element().map(|el| el.tag_name.as_str())
    }

    /// Text payload of text, comment and CDATA nodes
    pub fn text_content(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(&t.text_content),
            NodeData::Comment(c) => Some(&c.text_content),
            NodeData::CData(c) => Some(&c.text_content),
            _ => None,
        }
    }

    /// Depth-first search by id
    pub fn find(&self, id: Id) -> Option<&SerializedNode> {
        if self.id == id {
            return Some(self);
        }
        self.child_nodes().iter().find_map(|c| c.find(id))
    }
}

/// Pre-order, depth-first walk over an already built snapshot
///
/// Documents and elements recurse into their children; leaves do not.
pub fn visit_snapshot<F>(node: &SerializedNode, mut on_visit: F)
where
    F: FnMut(&SerializedNode),
{
    fn walk<F: FnMut(&SerializedNode)>(current: &SerializedNode, on_visit: &mut F) {
        on_visit(current);
        for child in current.child_nodes() {
            walk(child, on_visit);
        }
    }
    walk(node, &mut on_visit);
}
