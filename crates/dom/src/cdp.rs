//! Build a [`DomArena`] from a CDP `DOM.getDocument` response
//!
//! Lets a snapshot run over a tree captured from a real browser with
//! `{"depth": -1, "pierce": true}`, including iframe documents
//! (`contentDocument`) and shadow roots (`shadowRoots`).
//!
//! Input format:
//! ```json
//! {
//!   "root": {
//!     "nodeId": 1,
//!     "nodeType": 9,
//!     "nodeName": "#document",
//!     "documentURL": "https://example.com/",
//!     "children": [...]
//!   }
//! }
//! ```

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::*;
use serde_json::Value;

impl DomArena {
    /// Parse a CDP document tree, returns the arena and its root document
    pub fn from_cdp(cdp_response: &Value) -> Result<(DomArena, NodeId)> {
        let root = cdp_response
            .get("root")
            .ok_or_else(|| DomError::CdpError("Missing 'root' in CDP response".to_string()))?;

        let mut arena = DomArena::new();
        let root_id = arena.parse_cdp_node(root, None, None)?;
        tracing::debug!("[DomArena] Imported {} nodes from CDP document", arena.len());
        Ok((arena, root_id))
    }

    /// Parse the raw JSON text of a `DOM.getDocument` response
    pub fn from_cdp_str(json: &str) -> Result<(DomArena, NodeId)> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_cdp(&value)
    }

    /// Recursively parse a CDP node
    fn parse_cdp_node(
        &mut self,
        cdp_node: &Value,
        parent_id: Option<NodeId>,
        owner_doc: Option<NodeId>,
    ) -> Result<NodeId> {
        let node_type_val = cdp_node["nodeType"]
            .as_u64()
            .ok_or_else(|| DomError::CdpError("Missing nodeType".to_string()))?
            as u8;

        let node_type = NodeType::from_u8(node_type_val).ok_or_else(|| DomError::InvalidNodeType {
            expected: "valid NodeType".to_string(),
            actual: format!("{}", node_type_val),
        })?;

        let node_name = cdp_node["nodeName"].as_str().unwrap_or("");
        let node_value = cdp_node["nodeValue"].as_str().unwrap_or("");

        let owner = owner_doc.unwrap_or(0);
        let node_id = match node_type {
            NodeType::Document => {
                let url = cdp_node["documentURL"]
                    .as_str()
                    .or_else(|| cdp_node["baseURL"].as_str())
                    .unwrap_or("about:blank");
                let doc = self.create_document(url);
                let state = self.document_state_mut(doc)?;
                state.compat_mode = match cdp_node["compatibilityMode"].as_str() {
                    Some("QuirksMode") => CompatMode::Quirks,
                    Some("LimitedQuirksMode") => CompatMode::LimitedQuirks,
                    _ => CompatMode::Standards,
                };
                doc
            }
            NodeType::Element => {
                let is_svg = cdp_node["isSVG"].as_bool().unwrap_or(false)
                    || node_name.chars().any(|c| c.is_ascii_lowercase());
                if is_svg {
                    self.create_svg_element(owner, node_name)
                } else {
                    self.create_element(owner, node_name)
                }
            }
            NodeType::Text => self.create_text(owner, node_value),
            NodeType::Comment => self.create_comment(owner, node_value),
            NodeType::CdataSection => self.create_cdata(owner, node_value),
            NodeType::DocumentType => self.create_doctype(
                owner,
                node_name,
                cdp_node["publicId"].as_str().unwrap_or(""),
                cdp_node["systemId"].as_str().unwrap_or(""),
            ),
            _ => {
                let mut node = DomNode::new(0, node_type, node_name.to_string());
                node.node_value = node_value.to_string();
                node.owner_document = owner_doc;
                self.add_node(node)
            }
        };
        let owner_doc = if node_type == NodeType::Document {
            Some(node_id)
        } else {
            owner_doc
        };

        // Attributes arrive flattened: [name, value, name, value, ...]
        if let Some(attrs) = cdp_node["attributes"].as_array() {
            for pair in attrs.chunks_exact(2) {
                if let (Some(key), Some(value)) = (pair[0].as_str(), pair[1].as_str()) {
                    self.set_attr(node_id, key, value);
                }
            }
        }

        if let Some(parent_id) = parent_id {
            self.append_child(parent_id, node_id)?;
        }

        if let Some(children) = cdp_node["children"].as_array() {
            for child in children {
                self.parse_cdp_node(child, Some(node_id), owner_doc)?;
            }
        }

        if let Some(content_doc) = cdp_node.get("contentDocument") {
            let doc_id = self.parse_cdp_node(content_doc, None, None)?;
            self.set_content_document(node_id, doc_id)?;
        }

        // User-agent shadow roots are not reachable from page script
        if let Some(shadow_roots) = cdp_node["shadowRoots"].as_array() {
            for shadow in shadow_roots {
                let kind = match shadow["shadowRootType"].as_str() {
                    Some("open") => ShadowRootType::Open,
                    Some("closed") => ShadowRootType::Closed,
                    other => {
                        tracing::debug!("[DomArena] Skipping {:?} shadow root on node {}", other, node_id);
                        continue;
                    }
                };
                let root = self.attach_shadow(node_id, kind)?;
                if let Some(children) = shadow["children"].as_array() {
                    for child in children {
                        self.parse_cdp_node(child, Some(root), owner_doc)?;
                    }
                }
            }
        }

        Ok(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Dom;

    #[test]
    fn test_parse_simple_dom() {
        let cdp_json = serde_json::json!({
            "root": {
                "nodeId": 1,
                "nodeType": 9,
                "nodeName": "#document",
                "documentURL": "https://example.com/index.html",
                "children": [{
                    "nodeId": 2,
                    "nodeType": 1,
                    "nodeName": "HTML",
                    "attributes": ["lang", "en"],
                    "children": [{
                        "nodeId": 3,
                        "nodeType": 3,
                        "nodeName": "#text",
                        "nodeValue": "Hello"
                    }]
                }]
            }
        });

        let (arena, root) = DomArena::from_cdp(&cdp_json).unwrap();
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.document_url(root).as_deref(), Some("https://example.com/index.html"));

        let html = arena.children(root)[0];
        assert_eq!(arena.get_attribute(html, "lang").as_deref(), Some("en"));
        assert_eq!(arena.owner_document(html), Some(root));
        assert_eq!(arena.text_content(html).as_deref(), Some("Hello"));
    }

    #[test]
    fn test_parse_frames_and_shadow_roots() {
        let cdp_json = serde_json::json!({
            "root": {
                "nodeType": 9,
                "nodeName": "#document",
                "documentURL": "https://example.com/",
                "children": [{
                    "nodeType": 1,
                    "nodeName": "IFRAME",
                    "contentDocument": {
                        "nodeType": 9,
                        "nodeName": "#document",
                        "documentURL": "https://example.com/frame.html"
                    }
                }, {
                    "nodeType": 1,
                    "nodeName": "MY-WIDGET",
                    "shadowRoots": [{
                        "nodeType": 11,
                        "nodeName": "#document-fragment",
                        "shadowRootType": "open",
                        "children": [{ "nodeType": 3, "nodeName": "#text", "nodeValue": "inside" }]
                    }, {
                        "nodeType": 11,
                        "nodeName": "#document-fragment",
                        "shadowRootType": "user-agent"
                    }]
                }]
            }
        });

        let (arena, root) = DomArena::from_cdp(&cdp_json).unwrap();
        let children = arena.children(root);
        let frame_doc = arena.content_document(children[0]).unwrap().unwrap();
        assert_eq!(arena.owner_document(frame_doc), Some(frame_doc));

        let shadow = arena.shadow_root(children[1]).unwrap();
        assert_eq!(arena.shadow_root_type(shadow), Some(ShadowRootType::Open));
        assert_eq!(arena.children(shadow).len(), 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        assert!(DomArena::from_cdp(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        assert!(matches!(DomArena::from_cdp_str("{\"root\": "), Err(DomError::ParseError(_))));
    }
}
