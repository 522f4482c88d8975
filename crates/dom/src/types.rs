//! Live DOM type definitions
//!
//! Key design principles:
//! 1. Use u32 for handles (same width as CDP backend node ids)
//! 2. Use SmallVec for child lists (most nodes have few children)
//! 3. Use Option<Box<T>> for kind-specific state (reduce struct size)

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Live node handle (index into arena)
pub type NodeId = u32;

/// Node type matching DOM specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    CdataSection = 4,
    EntityReference = 5,
    Entity = 6,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
    Notation = 12,
}

impl NodeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CdataSection),
            5 => Some(NodeType::EntityReference),
            6 => Some(NodeType::Entity),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            12 => Some(NodeType::Notation),
            _ => None,
        }
    }
}

/// Shadow root flavour. Everything except `Polyfilled` is native.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowRootType {
    Open,
    Closed,
    Polyfilled,
}

impl ShadowRootType {
    pub fn is_native(&self) -> bool {
        !matches!(self, ShadowRootType::Polyfilled)
    }
}

/// Rectangle with coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DomRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Default for DomRect {
    fn default() -> Self {
        Self::zero()
    }
}

/// `document.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// `document.compatMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatMode {
    /// "CSS1Compat"
    Standards,
    /// "BackCompat"
    Quirks,
    LimitedQuirks,
}

impl CompatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatMode::Standards | CompatMode::LimitedQuirks => "CSS1Compat",
            CompatMode::Quirks => "BackCompat",
        }
    }
}

/// A parsed stylesheet as exposed through `document.styleSheets` or `el.sheet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    /// Absolute href for linked sheets, None for inline `<style>`
    pub href: Option<String>,
    /// Serialized `cssText` of every rule
    pub rules: Vec<String>,
    /// Rules of cross-origin sheets cannot be read
    pub cross_origin: bool,
}

impl StyleSheet {
    pub fn new(href: Option<String>, rules: Vec<String>) -> Self {
        Self {
            href,
            rules,
            cross_origin: false,
        }
    }

    /// `sheet.cssRules`
    pub fn css_rules(&self) -> crate::Result<&[String]> {
        if self.cross_origin {
            return Err(crate::DomError::Security(format!(
                "cannot access rules of {}",
                self.href.as_deref().unwrap_or("inline sheet")
            )));
        }
        Ok(&self.rules)
    }
}

/// Rendering context a canvas has been bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanvasContextKind {
    TwoD,
    WebGl,
    WebGl2,
    BitmapRenderer,
}

/// Canvas bitmap: RGBA8, row major
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub context: Option<CanvasContextKind>,
    pub pixels: Vec<u8>,
    /// Set once a non-CORS cross-origin image was drawn into it
    pub tainted: bool,
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            context: None,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
            tainted: false,
        }
    }
}

/// `<img>` decode state
#[derive(Debug, Clone, PartialEq)]
pub struct ImageState {
    pub complete: bool,
    pub natural_width: u32,
    pub natural_height: u32,
    pub current_src: String,
    /// Decoded RGBA8 pixels (empty until loaded)
    pub pixels: Vec<u8>,
    pub same_origin: bool,
    /// Served with CORS headers, readable when requested with `crossorigin`
    pub cors_allowed: bool,
}

/// `<audio>`/`<video>` playback state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaState {
    pub paused: bool,
    pub current_time: f64,
}

/// Live value of form controls (not the default-value attributes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    pub value: Option<String>,
    pub checked: bool,
    pub selected: bool,
}

/// Doctype triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocType {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

/// Document-only state
#[derive(Debug, Clone)]
pub struct DocumentState {
    pub url: String,
    pub compat_mode: CompatMode,
    pub ready_state: ReadyState,
    /// Reads from a cross-origin frame throw
    pub cross_origin: bool,
    pub style_sheets: Vec<StyleSheet>,
}

impl DocumentState {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            compat_mode: CompatMode::Standards,
            ready_state: ReadyState::Complete,
            cross_origin: false,
            style_sheets: Vec::new(),
        }
    }
}

/// Element-only state
#[derive(Debug, Clone, Default)]
pub struct ElementState {
    pub is_svg: bool,
    pub is_form: bool,
    pub form: FormState,
    pub sheet: Option<StyleSheet>,
    pub canvas: Option<CanvasState>,
    pub image: Option<ImageState>,
    pub media: Option<MediaState>,
    pub scroll_left: f64,
    pub scroll_top: f64,
    pub rect: DomRect,
}

/// The live DOM node structure
///
/// Design philosophy:
/// - Small fixed-size fields first (better packing)
/// - Use indices instead of pointers
/// - Use Option<Box<T>> for kind-specific data
#[derive(Debug, Clone)]
pub struct DomNode {
    pub node_id: NodeId,
    pub node_type: NodeType,

    // Navigation indices
    pub parent_id: Option<NodeId>,
    pub children_ids: SmallVec<[NodeId; 4]>,
    pub owner_document: Option<NodeId>,

    // Name/value as exposed by nodeName/nodeValue
    pub node_name: String,
    pub node_value: String,
    pub attributes: HashMap<String, String>,

    // Special DOM structures
    pub content_document_id: Option<NodeId>,
    /// Set on shadow root fragments
    pub shadow_root_type: Option<ShadowRootType>,
    /// Set on shadow hosts
    pub shadow_root_id: Option<NodeId>,
    pub doctype: Option<Box<DocType>>,

    pub document: Option<Box<DocumentState>>,
    pub element: Option<Box<ElementState>>,
}

impl DomNode {
    /// Create a new node with required fields
    pub fn new(node_id: NodeId, node_type: NodeType, node_name: String) -> Self {
        Self {
            node_id,
            node_type,
            parent_id: None,
            children_ids: SmallVec::new(),
            owner_document: None,
            node_name,
            node_value: String::new(),
            attributes: HashMap::new(),
            content_document_id: None,
            shadow_root_type: None,
            shadow_root_id: None,
            doctype: None,
            document: None,
            element: None,
        }
    }

    /// Get tag name for element nodes
    pub fn tag_name(&self) -> Option<&str> {
        if self.node_type == NodeType::Element {
            Some(&self.node_name)
        } else {
            None
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

/// Encoding options for canvas/image data URLs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUrlOptions {
    #[serde(rename = "type", default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub quality: Option<f32>,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

impl Default for DataUrlOptions {
    fn default() -> Self {
        Self {
            mime_type: default_mime_type(),
            quality: None,
        }
    }
}
