//! Arena-based live DOM storage
//!
//! The in-memory backend behind the [`Dom`] trait. Nodes live in a single
//! `Vec` and refer to each other by `NodeId` index, so a whole document
//! (including iframe subdocuments and shadow trees) is one flat allocation.
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [Doc][Html][Head][Text]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```

use crate::canvas;
use crate::document::Dom;
use crate::error::{DomError, Result};
use crate::selector::SelectorList;
use crate::types::*;

#[derive(Debug, Default)]
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,
}

impl DomArena {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(1024), // Pre-allocate for typical page
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Add a node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        self.nodes.push(node);
        node_id
    }

    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---- builders ----

    /// New document node; it owns itself
    pub fn create_document(&mut self, url: impl Into<String>) -> NodeId {
        let mut node = DomNode::new(0, NodeType::Document, "#document".to_string());
        node.document = Some(Box::new(DocumentState::new(url)));
        let id = self.add_node(node);
        self.nodes[id as usize].owner_document = Some(id);
        id
    }

    fn create_owned(&mut self, doc: NodeId, node_type: NodeType, name: String) -> NodeId {
        let mut node = DomNode::new(0, node_type, name);
        node.owner_document = Some(doc);
        self.add_node(node)
    }

    /// HTML element; `tagName` reads back upper case like a browser
    pub fn create_element(&mut self, doc: NodeId, tag: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::Element, tag.to_ascii_uppercase());
        let mut state = ElementState::default();
        match tag.to_ascii_lowercase().as_str() {
            "form" => state.is_form = true,
            "canvas" => state.canvas = Some(CanvasState::new(300, 150)),
            "audio" | "video" => {
                state.media = Some(MediaState {
                    paused: true,
                    current_time: 0.0,
                })
            }
            _ => {}
        }
        self.nodes[id as usize].element = Some(Box::new(state));
        id
    }

    /// SVG-namespace element; case is preserved
    pub fn create_svg_element(&mut self, doc: NodeId, tag: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::Element, tag.to_string());
        self.nodes[id as usize].element = Some(Box::new(ElementState {
            is_svg: true,
            ..ElementState::default()
        }));
        id
    }

    pub fn create_text(&mut self, doc: NodeId, text: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::Text, "#text".to_string());
        self.nodes[id as usize].node_value = text.to_string();
        id
    }

    pub fn create_comment(&mut self, doc: NodeId, text: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::Comment, "#comment".to_string());
        self.nodes[id as usize].node_value = text.to_string();
        id
    }

    pub fn create_cdata(&mut self, doc: NodeId, text: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::CdataSection, "#cdata-section".to_string());
        self.nodes[id as usize].node_value = text.to_string();
        id
    }

    pub fn create_processing_instruction(&mut self, doc: NodeId, target: &str, data: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::ProcessingInstruction, target.to_string());
        self.nodes[id as usize].node_value = data.to_string();
        id
    }

    pub fn create_doctype(&mut self, doc: NodeId, name: &str, public_id: &str, system_id: &str) -> NodeId {
        let id = self.create_owned(doc, NodeType::DocumentType, name.to_string());
        self.nodes[id as usize].doctype = Some(Box::new(DocType {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        }));
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.get(parent)?;
        if let Some(old_parent) = self.get(child)?.parent_id {
            self.get_mut(old_parent)?.children_ids.retain(|c| *c != child);
        }
        self.get_mut(child)?.parent_id = Some(parent);
        self.get_mut(parent)?.children_ids.push(child);
        Ok(())
    }

    /// `element.attachShadow()`; returns the shadow root fragment
    pub fn attach_shadow(&mut self, host: NodeId, kind: ShadowRootType) -> Result<NodeId> {
        let doc = self.get(host)?.owner_document;
        let mut root = DomNode::new(0, NodeType::DocumentFragment, "#document-fragment".to_string());
        root.owner_document = doc;
        root.shadow_root_type = Some(kind);
        root.parent_id = None;
        let root_id = self.add_node(root);
        self.get_mut(host)?.shadow_root_id = Some(root_id);
        Ok(root_id)
    }

    pub fn set_content_document(&mut self, iframe: NodeId, doc: NodeId) -> Result<()> {
        self.get(doc)?;
        self.get_mut(iframe)?.content_document_id = Some(doc);
        Ok(())
    }

    /// Builder shorthand; silently ignores unknown nodes
    pub fn set_attr(&mut self, el: NodeId, name: &str, value: &str) {
        if let Ok(node) = self.get_mut(el) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn element_state_mut(&mut self, el: NodeId) -> Result<&mut ElementState> {
        let node = self.get_mut(el)?;
        let node_type = node.node_type;
        node.element
            .as_deref_mut()
            .ok_or_else(|| DomError::InvalidNodeType {
                expected: "Element".to_string(),
                actual: format!("{:?}", node_type),
            })
    }

    pub fn document_state_mut(&mut self, doc: NodeId) -> Result<&mut DocumentState> {
        let node = self.get_mut(doc)?;
        let node_type = node.node_type;
        node.document
            .as_deref_mut()
            .ok_or_else(|| DomError::InvalidNodeType {
                expected: "Document".to_string(),
                actual: format!("{:?}", node_type),
            })
    }

    // ---- traversal ----

    /// Traverse tree depth-first (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Find nodes matching predicate
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        self.nodes
            .iter()
            .filter(|node| predicate(node))
            .map(|node| node.node_id)
            .collect()
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.find(|node| node.is_element() && node.node_name.eq_ignore_ascii_case(tag))
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|node| node.is_element() && node.attr("id") == Some(id))
            .map(|node| node.node_id)
    }

    fn element(&self, el: NodeId) -> Option<&ElementState> {
        self.get(el).ok()?.element.as_deref()
    }

    fn document(&self, doc: NodeId) -> Option<&DocumentState> {
        self.get(doc).ok()?.document.as_deref()
    }

    fn descendant_text(&self, node: NodeId) -> String {
        let mut text = String::new();
        let _ = self.traverse_df(node, |n| {
            if matches!(n.node_type, NodeType::Text | NodeType::CdataSection) {
                text.push_str(&n.node_value);
            }
            Ok(())
        });
        text
    }
}

impl Dom for DomArena {
    fn node_type(&self, node: NodeId) -> Result<NodeType> {
        Ok(self.get(node)?.node_type)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).ok()?.parent_id
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node)
            .map(|n| n.children_ids.to_vec())
            .unwrap_or_default()
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.get(self.parent(node)?).ok()?;
        let index = parent.children_ids.iter().position(|c| *c == node)?;
        index.checked_sub(1).map(|i| parent.children_ids[i])
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.get(self.parent(node)?).ok()?;
        let index = parent.children_ids.iter().position(|c| *c == node)?;
        parent.children_ids.get(index + 1).copied()
    }

    fn owner_document(&self, node: NodeId) -> Option<NodeId> {
        self.get(node).ok()?.owner_document
    }

    fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.get(host).ok()?.shadow_root_id
    }

    fn shadow_root_type(&self, node: NodeId) -> Option<ShadowRootType> {
        self.get(node).ok()?.shadow_root_type
    }

    fn document_url(&self, doc: NodeId) -> Option<String> {
        self.document(doc).map(|d| d.url.clone())
    }

    fn compat_mode(&self, doc: NodeId) -> Option<CompatMode> {
        self.document(doc).map(|d| d.compat_mode)
    }

    fn ready_state(&self, doc: NodeId) -> Result<ReadyState> {
        let state = self.document(doc).ok_or(DomError::NodeNotFound(doc))?;
        if state.cross_origin {
            return Err(DomError::Security(format!(
                "blocked a frame from accessing {}",
                state.url
            )));
        }
        Ok(state.ready_state)
    }

    fn style_sheets(&self, doc: NodeId) -> Vec<StyleSheet> {
        self.document(doc)
            .map(|d| d.style_sheets.clone())
            .unwrap_or_default()
    }

    fn doctype(&self, node: NodeId) -> Option<DocType> {
        self.get(node).ok()?.doctype.as_deref().cloned()
    }

    fn tag_name(&self, el: NodeId) -> Option<String> {
        self.get(el).ok()?.tag_name().map(str::to_string)
    }

    fn is_form(&self, el: NodeId) -> bool {
        self.element(el).map(|e| e.is_form).unwrap_or(false)
    }

    fn is_svg(&self, el: NodeId) -> bool {
        self.element(el).map(|e| e.is_svg).unwrap_or(false)
    }

    fn attributes(&self, el: NodeId) -> Vec<(String, String)> {
        self.get(el)
            .map(|n| {
                n.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_attribute(&self, el: NodeId, name: &str) -> Option<String> {
        self.get(el).ok()?.attr(name).map(str::to_string)
    }

    fn set_attribute(&mut self, el: NodeId, name: &str, value: &str) -> Result<()> {
        self.get_mut(el)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&mut self, el: NodeId, name: &str) -> Result<()> {
        self.get_mut(el)?.attributes.remove(name);
        Ok(())
    }

    fn matches(&self, el: NodeId, selector: &str) -> Result<bool> {
        Ok(SelectorList::parse(selector)?.matches(self, el))
    }

    fn text_content(&self, node: NodeId) -> Option<String> {
        let n = self.get(node).ok()?;
        match n.node_type {
            NodeType::Text
            | NodeType::Comment
            | NodeType::CdataSection
            | NodeType::ProcessingInstruction => Some(n.node_value.clone()),
            NodeType::Element | NodeType::DocumentFragment => Some(self.descendant_text(node)),
            _ => None,
        }
    }

    fn sheet(&self, el: NodeId) -> Result<Option<StyleSheet>> {
        Ok(self.element(el).and_then(|e| e.sheet.clone()))
    }

    fn form_state(&self, el: NodeId) -> Option<FormState> {
        self.element(el).map(|e| e.form.clone())
    }

    fn canvas_context(&self, el: NodeId) -> Option<CanvasContextKind> {
        self.element(el)?.canvas.as_ref()?.context
    }

    fn canvas_size(&self, el: NodeId) -> Option<(u32, u32)> {
        let canvas = self.element(el)?.canvas.as_ref()?;
        Some((canvas.width, canvas.height))
    }

    fn canvas_is_blank(&self, el: NodeId) -> Result<bool> {
        let canvas = self
            .element(el)
            .and_then(|e| e.canvas.as_ref())
            .ok_or(DomError::NodeNotFound(el))?;
        if canvas.tainted {
            return Err(DomError::Security("canvas has been tainted".to_string()));
        }
        Ok(canvas::is_blank(canvas))
    }

    fn canvas_to_data_url(&self, el: NodeId, options: &DataUrlOptions) -> Result<String> {
        let canvas = self
            .element(el)
            .and_then(|e| e.canvas.as_ref())
            .ok_or(DomError::NodeNotFound(el))?;
        if canvas.tainted {
            return Err(DomError::Security("canvas has been tainted".to_string()));
        }
        canvas::encode_data_url(canvas.width, canvas.height, &canvas.pixels, options)
    }

    fn blank_canvas_data_url(&self, width: u32, height: u32, options: &DataUrlOptions) -> Result<String> {
        let blank = CanvasState::new(width, height);
        canvas::encode_data_url(width, height, &blank.pixels, options)
    }

    fn image_state(&self, el: NodeId) -> Option<ImageState> {
        self.element(el)?.image.clone()
    }

    fn create_canvas(&mut self, doc: NodeId) -> Result<NodeId> {
        self.get(doc)?;
        Ok(self.create_element(doc, "canvas"))
    }

    fn draw_image(&mut self, canvas_id: NodeId, image_id: NodeId) -> Result<()> {
        let image = self
            .image_state(image_id)
            .ok_or(DomError::NodeNotFound(image_id))?;
        if !image.complete {
            return Err(DomError::InvalidState(format!(
                "image {} has not finished loading",
                image.current_src
            )));
        }
        let cors_request = self.get(image_id)?.attr("crossorigin").is_some();
        let taints = !(image.same_origin || (image.cors_allowed && cors_request));

        let state = self.element_state_mut(canvas_id)?;
        let canvas = state
            .canvas
            .get_or_insert_with(|| CanvasState::new(0, 0));
        canvas.width = image.natural_width;
        canvas.height = image.natural_height;
        canvas.context = Some(CanvasContextKind::TwoD);
        canvas.pixels = image.pixels.clone();
        canvas
            .pixels
            .resize((image.natural_width as usize) * (image.natural_height as usize) * 4, 0);
        canvas.tainted = taints;
        Ok(())
    }

    fn media_state(&self, el: NodeId) -> Option<MediaState> {
        self.element(el)?.media
    }

    fn scroll_offset(&self, el: NodeId) -> (f64, f64) {
        self.element(el)
            .map(|e| (e.scroll_left, e.scroll_top))
            .unwrap_or((0.0, 0.0))
    }

    fn bounding_client_rect(&self, el: NodeId) -> DomRect {
        self.element(el).map(|e| e.rect).unwrap_or_default()
    }

    fn content_document(&self, iframe: NodeId) -> Result<Option<NodeId>> {
        let Some(doc) = self.get(iframe)?.content_document_id else {
            return Ok(None);
        };
        match self.document(doc) {
            Some(state) if state.cross_origin => Err(DomError::Security(format!(
                "blocked a frame from accessing {}",
                state.url
            ))),
            _ => Ok(Some(doc)),
        }
    }

    fn clone_node(&mut self, node: NodeId) -> Result<NodeId> {
        let mut copy = self.get(node)?.clone();
        copy.parent_id = None;
        copy.children_ids.clear();
        copy.shadow_root_id = None;
        copy.content_document_id = None;
        Ok(self.add_node(copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let div = arena.create_element(doc, "div");
        arena.append_child(doc, div).unwrap();

        let retrieved = arena.get(div).unwrap();
        assert_eq!(retrieved.node_name, "DIV");
        assert_eq!(arena.owner_document(div), Some(doc));
        assert_eq!(arena.children(doc), vec![div]);
        assert_eq!(arena.parent(div), Some(doc));
    }

    #[test]
    fn test_siblings() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let style = arena.create_element(doc, "style");
        let a = arena.create_text(doc, "a{}");
        let b = arena.create_text(doc, "b{}");
        arena.append_child(style, a).unwrap();
        arena.append_child(style, b).unwrap();

        assert_eq!(arena.previous_sibling(a), None);
        assert_eq!(arena.next_sibling(a), Some(b));
        assert_eq!(arena.previous_sibling(b), Some(a));
        assert_eq!(arena.text_content(style).as_deref(), Some("a{}b{}"));
    }

    #[test]
    fn test_traverse_df() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let root = arena.create_element(doc, "div");
        let child1 = arena.create_element(doc, "span");
        let child2 = arena.create_element(doc, "p");
        arena.append_child(root, child1).unwrap();
        arena.append_child(root, child2).unwrap();

        let mut visited = Vec::new();
        arena
            .traverse_df(root, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["DIV", "SPAN", "P"]);
    }

    #[test]
    fn test_clone_node_is_detached() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let img = arena.create_element(doc, "img");
        arena.set_attr(img, "src", "x.png");
        arena.append_child(doc, img).unwrap();

        let clone = arena.clone_node(img).unwrap();
        assert_ne!(clone, img);
        assert_eq!(arena.parent(clone), None);
        assert_eq!(arena.get_attribute(clone, "src").as_deref(), Some("x.png"));
        assert_eq!(arena.children(doc), vec![img]);
    }

    #[test]
    fn test_cross_origin_frame() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let iframe = arena.create_element(doc, "iframe");
        let sub = arena.create_document("https://other.test/");
        arena.document_state_mut(sub).unwrap().cross_origin = true;
        arena.set_content_document(iframe, sub).unwrap();

        assert!(matches!(arena.content_document(iframe), Err(DomError::Security(_))));
        assert!(arena.ready_state(sub).is_err());
    }

    #[test]
    fn test_draw_cross_origin_image_taints() {
        let mut arena = DomArena::new();
        let doc = arena.create_document("https://example.com/");
        let img = arena.create_element(doc, "img");
        arena.element_state_mut(img).unwrap().image = Some(ImageState {
            complete: true,
            natural_width: 1,
            natural_height: 1,
            current_src: "https://cdn.test/a.png".to_string(),
            pixels: vec![255, 0, 0, 255],
            same_origin: false,
            cors_allowed: true,
        });
        let canvas = arena.create_canvas(doc).unwrap();

        arena.draw_image(canvas, img).unwrap();
        assert!(arena
            .canvas_to_data_url(canvas, &DataUrlOptions::default())
            .is_err());

        arena.set_attr(img, "crossorigin", "anonymous");
        arena.draw_image(canvas, img).unwrap();
        let url = arena
            .canvas_to_data_url(canvas, &DataUrlOptions::default())
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
