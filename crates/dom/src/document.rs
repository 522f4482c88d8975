//! The capability surface a snapshot needs from a live document
//!
//! Everything the serializer reads or touches goes through this trait, so the
//! same walker runs against a browser backend or against [`DomArena`].
//!
//! [`DomArena`]: crate::DomArena

use crate::error::Result;
use crate::types::*;

pub trait Dom {
    // ---- structure ----

    fn node_type(&self, node: NodeId) -> Result<NodeType>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn previous_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Document the node belongs to (a document owns itself)
    fn owner_document(&self, node: NodeId) -> Option<NodeId>;

    /// Shadow root hosted by an element
    fn shadow_root(&self, host: NodeId) -> Option<NodeId>;

    /// Flavour of a shadow root node, None for anything else
    fn shadow_root_type(&self, node: NodeId) -> Option<ShadowRootType>;

    fn is_shadow_root(&self, node: NodeId) -> bool {
        self.shadow_root_type(node).is_some()
    }

    // ---- documents ----

    /// Location used as base for relative URLs
    fn document_url(&self, doc: NodeId) -> Option<String>;
    fn compat_mode(&self, doc: NodeId) -> Option<CompatMode>;

    /// Fails for documents the caller may not inspect (cross-origin frames)
    fn ready_state(&self, doc: NodeId) -> Result<ReadyState>;
    fn style_sheets(&self, doc: NodeId) -> Vec<StyleSheet>;

    fn doctype(&self, node: NodeId) -> Option<DocType>;

    // ---- elements ----

    /// `element.tagName` as reported by the engine (upper case for HTML)
    fn tag_name(&self, el: NodeId) -> Option<String>;
    fn is_form(&self, el: NodeId) -> bool;
    fn is_svg(&self, el: NodeId) -> bool;
    fn attributes(&self, el: NodeId) -> Vec<(String, String)>;
    fn get_attribute(&self, el: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, el: NodeId, name: &str, value: &str) -> Result<()>;
    fn remove_attribute(&mut self, el: NodeId, name: &str) -> Result<()>;

    fn class_list(&self, el: NodeId) -> Vec<String> {
        self.get_attribute(el, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// `element.matches(selector)`
    fn matches(&self, el: NodeId, selector: &str) -> Result<bool>;

    /// `node.textContent`
    fn text_content(&self, node: NodeId) -> Option<String>;

    /// `link.sheet` / `style.sheet`; fails when the engine refuses access
    fn sheet(&self, el: NodeId) -> Result<Option<StyleSheet>>;

    fn form_state(&self, el: NodeId) -> Option<FormState>;

    fn canvas_context(&self, el: NodeId) -> Option<CanvasContextKind>;
    fn canvas_size(&self, el: NodeId) -> Option<(u32, u32)>;
    fn canvas_is_blank(&self, el: NodeId) -> Result<bool>;
    fn canvas_to_data_url(&self, el: NodeId, options: &DataUrlOptions) -> Result<String>;

    /// Data URL of a freshly created, never drawn canvas
    fn blank_canvas_data_url(&self, width: u32, height: u32, options: &DataUrlOptions)
        -> Result<String>;

    fn image_state(&self, el: NodeId) -> Option<ImageState>;

    /// Detached scratch canvas owned by `doc`
    fn create_canvas(&mut self, doc: NodeId) -> Result<NodeId>;

    /// Resize `canvas` to the image's natural size and draw it at the origin
    fn draw_image(&mut self, canvas: NodeId, image: NodeId) -> Result<()>;

    fn media_state(&self, el: NodeId) -> Option<MediaState>;

    /// (scrollLeft, scrollTop)
    fn scroll_offset(&self, el: NodeId) -> (f64, f64);
    fn bounding_client_rect(&self, el: NodeId) -> DomRect;

    /// `iframe.contentDocument`; fails when the frame is cross-origin
    fn content_document(&self, iframe: NodeId) -> Result<Option<NodeId>>;

    /// Shallow `cloneNode()`: same attributes and state, no children, detached
    fn clone_node(&mut self, node: NodeId) -> Result<NodeId>;
}
