//! Node serializer: one live node → one snapshot record
//!
//! This module handles:
//! - Per-kind payloads (document, doctype, element, text, comment, CDATA)
//! - URL rewriting of attributes and inline CSS
//! - Type-specific capture (stylesheets, form values, canvas, images, media, scroll)
//! - Block/mask decisions that the walker propagates to descendants
//!
//! Every resource read is best effort: a failure skips that enhancement and
//! the node is still emitted.

use crate::mirror::Mirror;
use crate::options::SnapshotOptions;
use crate::privacy::{is_blocked_element, mask_input_value, mask_text, needs_masking_text, obfuscate_text};
use crate::rewrite::{absolute_to_stylesheet, transform_attribute};
use crate::types::*;
use dom::{CanvasContextKind, Dom, NodeId, NodeType, StyleSheet};
use once_cell::sync::Lazy;
use regex::Regex;

/// Text recorded in place of script bodies
pub const SCRIPT_PLACEHOLDER: &str = "SCRIPT_PLACEHOLDER";

static INVALID_TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\-_:]").expect("valid regex"));

/// Parents whose text is never obfuscated under strict privacy
const STRICT_TEXT_EXEMPT: &[&str] = &["HEAD", "TITLE", "STYLE", "SCRIPT", "HTML", "BODY", "NOSCRIPT"];

/// Per-call state the walker hands down
#[derive(Debug, Clone, Copy)]
pub struct NodeContext {
    /// Document being recorded; nodes outside it carry a `rootId`
    pub top_document: NodeId,
    /// Strict privacy inherited from ancestors
    pub strict: bool,
    /// The node was just inserted, its scroll offsets are zero
    pub newly_added_element: bool,
}

/// An image whose pixels can only be read after its load event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    /// `crossorigin` before it was forced to `anonymous`
    pub prior_cross_origin: Option<String>,
}

/// A record before the walker assigns its id
#[derive(Debug, Clone)]
pub struct RawNode {
    pub data: NodeData,
    pub root_id: Option<Id>,
    pub need_block: bool,
    pub need_mask: bool,
    pub pending_image: Option<PendingImage>,
}

impl RawNode {
    fn new(data: NodeData, root_id: Option<Id>) -> Self {
        Self {
            data,
            root_id,
            need_block: false,
            need_mask: false,
            pending_image: None,
        }
    }
}

/// Offscreen canvas shared by every image inlined in one recording
#[derive(Debug, Default)]
pub struct InlineCanvas {
    canvas: Option<NodeId>,
}

impl InlineCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create<D: Dom>(&mut self, dom: &mut D, doc: NodeId) -> dom::Result<NodeId> {
        if let Some(canvas) = self.canvas {
            return Ok(canvas);
        }
        let canvas = dom.create_canvas(doc)?;
        self.canvas = Some(canvas);
        Ok(canvas)
    }

    pub fn is_created(&self) -> bool {
        self.canvas.is_some()
    }

    pub fn reset(&mut self) {
        self.canvas = None;
    }
}

/// Lowercased, trimmed tag name; forms are always `form`, malformed names `div`
pub fn get_valid_tag_name<D: Dom>(dom: &D, el: NodeId) -> String {
    if dom.is_form(el) {
        return "form".to_string();
    }
    let tag_name = dom.tag_name(el).unwrap_or_default().to_lowercase();
    let tag_name = tag_name.trim();
    if INVALID_TAG_NAME.is_match(tag_name) {
        // Malformed custom element name
        return "div".to_string();
    }
    tag_name.to_string()
}

fn stringify_stylesheet(sheet: &StyleSheet) -> Option<String> {
    let rules = sheet.css_rules().ok()?;
    let text = rules.concat();
    (!text.is_empty()).then_some(text)
}

/// Id of the node's document when it is not the recorded one
fn root_id<D: Dom>(dom: &D, mirror: &Mirror, node: NodeId, top_document: NodeId) -> Option<Id> {
    let doc = dom.owner_document(node)?;
    if doc == top_document || !mirror.has_node(doc) {
        return None;
    }
    let id = mirror.get_id(doc);
    (id > 0).then_some(id)
}

fn base_url<D: Dom>(dom: &D, node: NodeId) -> String {
    dom.owner_document(node)
        .and_then(|doc| dom.document_url(doc))
        .unwrap_or_default()
}

/// Serialize one node without its children
///
/// Returns None for node kinds replay cannot rebuild (processing
/// instructions, fragments, attributes).
pub fn serialize_node<D: Dom>(
    dom: &mut D,
    node: NodeId,
    mirror: &Mirror,
    options: &SnapshotOptions,
    ctx: &NodeContext,
    canvas: &mut InlineCanvas,
) -> Option<RawNode> {
    let root_id = root_id(dom, mirror, node, ctx.top_document);
    match dom.node_type(node).ok()? {
        NodeType::Document => {
            let compat_mode = dom
                .compat_mode(node)
                .map(|mode| mode.as_str())
                .filter(|mode| *mode != "CSS1Compat")
                .map(str::to_string);
            Some(RawNode::new(
                NodeData::Document(DocumentNode {
                    child_nodes: Vec::new(),
                    compat_mode,
                }),
                root_id,
            ))
        }
        NodeType::DocumentType => {
            let doctype = dom.doctype(node)?;
            Some(RawNode::new(
                NodeData::DocumentType(DocumentTypeNode {
                    name: doctype.name,
                    public_id: doctype.public_id,
                    system_id: doctype.system_id,
                }),
                root_id,
            ))
        }
        NodeType::Element => Some(serialize_element(dom, node, options, ctx, canvas, root_id)),
        NodeType::Text => Some(RawNode::new(
            NodeData::Text(serialize_text(dom, node, options, ctx)),
            root_id,
        )),
        NodeType::CdataSection => Some(RawNode::new(
            NodeData::CData(CDataNode::default()),
            root_id,
        )),
        NodeType::Comment => Some(RawNode::new(
            NodeData::Comment(CommentNode {
                text_content: dom.text_content(node).unwrap_or_default(),
            }),
            root_id,
        )),
        _ => None,
    }
}

fn serialize_text<D: Dom>(dom: &D, node: NodeId, options: &SnapshotOptions, ctx: &NodeContext) -> TextNode {
    let parent = dom.parent(node);
    let parent_tag = parent.and_then(|p| dom.tag_name(p));
    let parent_tag = parent_tag.as_deref();
    let is_style = parent_tag == Some("STYLE");
    let is_script = parent_tag == Some("SCRIPT");
    let is_noscript = parent_tag == Some("NOSCRIPT");
    let mut text = dom.text_content(node).unwrap_or_default();

    if is_style && !text.is_empty() {
        // Rules only describe the whole element when this is its only text
        let alone = dom.next_sibling(node).is_none() && dom.previous_sibling(node).is_none();
        if let (true, Some(style)) = (alone, parent) {
            match dom.sheet(style) {
                Ok(Some(sheet)) => {
                    if let Some(rules) = stringify_stylesheet(&sheet) {
                        text = rules;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("[Snapshot] Cannot get CSS styles from text's parentNode: {}", e),
            }
        }
        text = absolute_to_stylesheet(&text, &base_url(dom, node));
    }
    if is_script {
        text = SCRIPT_PLACEHOLDER.to_string();
    }
    if is_noscript {
        text.clear();
    }

    let mut handled = is_style || is_script || is_noscript;
    if !handled && !text.is_empty() && needs_masking_text(dom, node, &options.mask_text) {
        text = match &options.mask_text_fn {
            Some(mask) => mask(&text),
            None => mask_text(&text),
        };
        handled = true;
    }
    let exempt = parent_tag.map(|t| STRICT_TEXT_EXEMPT.contains(&t)).unwrap_or(false);
    if ctx.strict && !handled && !exempt && !text.is_empty() {
        text = obfuscate_text(&text);
    }

    TextNode {
        text_content: text,
        is_style,
    }
}

fn serialize_element<D: Dom>(
    dom: &mut D,
    el: NodeId,
    options: &SnapshotOptions,
    ctx: &NodeContext,
    canvas: &mut InlineCanvas,
    root_id: Option<Id>,
) -> RawNode {
    let mut need_block = is_blocked_element(dom, el, &options.block);
    let need_mask = is_blocked_element(dom, el, &options.mask_text);
    let tag_name = get_valid_tag_name(dom, el);
    let doc = dom.owner_document(el);
    let base = base_url(dom, el);
    let mut pending_image = None;

    let mut attributes = Attributes::new();
    for (name, value) in dom.attributes(el) {
        let rewritten = transform_attribute(&base, &tag_name, &name, &value);
        attributes.insert(name, rewritten.into());
    }

    // Inline linked stylesheets so replay needs no network
    if tag_name == "link" && options.inline_stylesheet {
        let href = attributes.get("href").and_then(AttributeValue::as_str).map(str::to_string);
        let sheet = doc
            .map(|d| dom.style_sheets(d))
            .unwrap_or_default()
            .into_iter()
            .find(|s| s.href.is_some() && s.href == href);
        if let Some(sheet) = sheet {
            if let Some(css_text) = stringify_stylesheet(&sheet) {
                attributes.remove("rel");
                attributes.remove("href");
                let sheet_href = sheet.href.as_deref().unwrap_or(&base);
                attributes.insert(
                    "_cssText".to_string(),
                    absolute_to_stylesheet(&css_text, sheet_href).into(),
                );
            }
        }
    }

    // Style elements filled through the CSSOM have no text to record
    if tag_name == "style" {
        let has_text = dom
            .text_content(el)
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        if !has_text {
            if let Ok(Some(sheet)) = dom.sheet(el) {
                if let Some(css_text) = stringify_stylesheet(&sheet) {
                    attributes.insert(
                        "_cssText".to_string(),
                        absolute_to_stylesheet(&css_text, &base).into(),
                    );
                }
            }
        }
    }

    if matches!(tag_name.as_str(), "input" | "textarea" | "select") {
        let form = dom.form_state(el).unwrap_or_default();
        let value = form.value.unwrap_or_default();
        let input_type = attributes
            .get("type")
            .and_then(AttributeValue::as_str)
            .map(str::to_string);
        let checkable = matches!(
            input_type.as_deref(),
            Some("radio" | "checkbox" | "submit" | "button")
        );
        if !checkable && !value.is_empty() {
            let masked = mask_input_value(
                &options.mask_input_options,
                &tag_name,
                input_type.as_deref(),
                &value,
                options.mask_input_fn.as_ref(),
            );
            attributes.insert("value".to_string(), masked.into());
        } else if form.checked {
            attributes.insert("checked".to_string(), true.into());
        }
    }

    if tag_name == "option" {
        let selected = dom.form_state(el).map(|f| f.selected).unwrap_or(false);
        if selected && !options.mask_input_options.select {
            attributes.insert("selected".to_string(), true.into());
        } else {
            // Replay the current selection, not the default one
            attributes.remove("selected");
        }
    }

    if tag_name == "canvas" && options.record_canvas {
        if let Some(data_url) = canvas_data_url(dom, el, options) {
            attributes.insert("rr_dataURL".to_string(), data_url.into());
        }
    }

    if tag_name == "img" && options.inline_images && !need_block && !need_mask && !ctx.strict {
        if let Some(doc) = doc {
            let prior_cross_origin = dom.get_attribute(el, "crossorigin");
            if let Err(e) = dom.set_attribute(el, "crossorigin", "anonymous") {
                tracing::debug!("[Snapshot] Cannot request anonymous CORS for image: {}", e);
            }
            let loaded = dom
                .image_state(el)
                .map(|img| img.complete && img.natural_width != 0)
                .unwrap_or(false);
            if loaded {
                if let Some(data_url) =
                    inline_image(dom, canvas, doc, el, prior_cross_origin.as_deref(), options)
                {
                    attributes.insert("rr_dataURL".to_string(), data_url.into());
                }
            } else {
                pending_image = Some(PendingImage { prior_cross_origin });
            }
        }
    }

    if matches!(tag_name.as_str(), "audio" | "video") {
        if let Some(media) = dom.media_state(el) {
            let state = if media.paused { "paused" } else { "played" };
            attributes.insert("rr_mediaState".to_string(), state.into());
            attributes.insert("rr_mediaCurrentTime".to_string(), media.current_time.into());
        }
    }

    if !ctx.newly_added_element {
        let (left, top) = dom.scroll_offset(el);
        if left != 0.0 {
            attributes.insert("rr_scrollLeft".to_string(), left.into());
        }
        if top != 0.0 {
            attributes.insert("rr_scrollTop".to_string(), top.into());
        }
    }

    if need_block || need_mask || (tag_name == "img" && ctx.strict) {
        let rect = dom.bounding_client_rect(el);
        let class = attributes.remove("class");
        attributes.clear();
        if let Some(class) = class {
            attributes.insert("class".to_string(), class);
        }
        attributes.insert("rr_width".to_string(), format!("{}px", rect.width).into());
        attributes.insert("rr_height".to_string(), format!("{}px", rect.height).into());
        if ctx.strict {
            need_block = true;
        }
    }

    if tag_name == "iframe" {
        let src = attributes
            .get("src")
            .and_then(AttributeValue::as_str)
            .map(str::to_string);
        if !(options.keep_iframe_src_fn)(src.as_deref().unwrap_or("")) {
            let accessible = matches!(dom.content_document(el), Ok(Some(_)));
            if let (false, Some(src)) = (accessible, src) {
                attributes.insert("rr_src".to_string(), src.into());
            }
            attributes.remove("src");
        }
    }

    RawNode {
        data: NodeData::Element(ElementNode {
            tag_name,
            attributes,
            child_nodes: Vec::new(),
            is_svg: dom.is_svg(el),
            is_shadow_host: false,
        }),
        root_id,
        need_block,
        need_mask,
        pending_image,
    }
}

fn canvas_data_url<D: Dom>(dom: &D, el: NodeId, options: &SnapshotOptions) -> Option<String> {
    match dom.canvas_context(el) {
        Some(CanvasContextKind::TwoD) => match dom.canvas_is_blank(el) {
            Ok(true) => None,
            Ok(false) => dom
                .canvas_to_data_url(el, &options.data_url_options)
                .map_err(|e| tracing::debug!("[Snapshot] Cannot read canvas pixels: {}", e))
                .ok(),
            Err(e) => {
                tracing::debug!("[Snapshot] Cannot read canvas pixels: {}", e);
                None
            }
        },
        None => {
            let data_url = dom
                .canvas_to_data_url(el, &options.data_url_options)
                .map_err(|e| tracing::debug!("[Snapshot] Cannot read canvas pixels: {}", e))
                .ok()?;
            let (width, height) = dom.canvas_size(el)?;
            let blank = dom
                .blank_canvas_data_url(width, height, &options.data_url_options)
                .ok()?;
            (data_url != blank).then_some(data_url)
        }
        // WebGL contents are captured by the canvas recorder, not the snapshot
        Some(_) => None,
    }
}

/// Draw a loaded image on the shared canvas and encode it
///
/// `crossorigin` is put back to `prior_cross_origin` (or removed) whatever
/// the outcome.
pub fn inline_image<D: Dom>(
    dom: &mut D,
    canvas: &mut InlineCanvas,
    doc: NodeId,
    image: NodeId,
    prior_cross_origin: Option<&str>,
    options: &SnapshotOptions,
) -> Option<String> {
    let result = canvas.get_or_create(dom, doc).and_then(|c| {
        dom.draw_image(c, image)?;
        dom.canvas_to_data_url(c, &options.data_url_options)
    });

    let restored = match prior_cross_origin {
        Some(prior) => dom.set_attribute(image, "crossorigin", prior),
        None => dom.remove_attribute(image, "crossorigin"),
    };
    if let Err(e) = restored {
        tracing::debug!("[Snapshot] Cannot restore crossorigin on image: {}", e);
    }

    match result {
        Ok(data_url) => Some(data_url),
        Err(e) => {
            let src = dom.image_state(image).map(|img| img.current_src).unwrap_or_default();
            tracing::warn!("[Snapshot] Cannot inline img src={}! Error: {}", src, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SnapshotConfig;
    use dom::{DomArena, DomRect, ImageState, MediaState, StyleSheet};

    struct Fixture {
        arena: DomArena,
        doc: NodeId,
        mirror: Mirror,
        options: SnapshotOptions,
        canvas: InlineCanvas,
    }

    impl Fixture {
        fn new() -> Self {
            let mut arena = DomArena::new();
            let doc = arena.create_document("https://example.com/app/index.html");
            Self {
                arena,
                doc,
                mirror: Mirror::new(),
                options: SnapshotOptions::default(),
                canvas: InlineCanvas::new(),
            }
        }

        fn element(&mut self, tag: &str) -> NodeId {
            let el = self.arena.create_element(self.doc, tag);
            self.arena.append_child(self.doc, el).unwrap();
            el
        }

        fn ctx(&self, strict: bool) -> NodeContext {
            NodeContext {
                top_document: self.doc,
                strict,
                newly_added_element: false,
            }
        }

        fn serialize(&mut self, node: NodeId) -> Option<RawNode> {
            let ctx = self.ctx(false);
            serialize_node(&mut self.arena, node, &self.mirror, &self.options, &ctx, &mut self.canvas)
        }

        fn element_record(&mut self, node: NodeId) -> ElementNode {
            match self.serialize(node).unwrap().data {
                NodeData::Element(el) => el,
                other => panic!("expected element, got {:?}", other),
            }
        }

        fn text_record(&mut self, node: NodeId, strict: bool) -> TextNode {
            let ctx = self.ctx(strict);
            match serialize_node(&mut self.arena, node, &self.mirror, &self.options, &ctx, &mut self.canvas)
                .unwrap()
                .data
            {
                NodeData::Text(t) => t,
                other => panic!("expected text, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_tag_name_normalization() {
        let mut f = Fixture::new();
        let custom = f.element("My-Widget ");
        let bad = f.element("weird$tag");
        let form = f.element("form");
        assert_eq!(get_valid_tag_name(&f.arena, custom), "my-widget");
        assert_eq!(get_valid_tag_name(&f.arena, bad), "div");
        assert_eq!(get_valid_tag_name(&f.arena, form), "form");
    }

    #[test]
    fn test_attributes_are_rewritten() {
        let mut f = Fixture::new();
        let img = f.element("img");
        f.arena.set_attr(img, "src", "../logo.png");
        f.arena.set_attr(img, "alt", "logo");
        let el = f.element_record(img);
        assert_eq!(el.tag_name, "img");
        assert_eq!(el.attr("src"), Some("https://example.com/logo.png"));
        assert_eq!(el.attr("alt"), Some("logo"));
    }

    #[test]
    fn test_link_stylesheet_is_inlined() {
        let mut f = Fixture::new();
        let link = f.element("link");
        f.arena.set_attr(link, "rel", "stylesheet");
        f.arena.set_attr(link, "href", "css/site.css");
        f.arena.document_state_mut(f.doc).unwrap().style_sheets.push(StyleSheet::new(
            Some("https://example.com/app/css/site.css".to_string()),
            vec!["body { background: url(bg.png); }".to_string()],
        ));

        let el = f.element_record(link);
        assert_eq!(el.attr("rel"), None);
        assert_eq!(el.attr("href"), None);
        assert_eq!(
            el.attr("_cssText"),
            Some("body { background: url(https://example.com/app/css/bg.png); }")
        );
    }

    #[test]
    fn test_cross_origin_stylesheet_keeps_link() {
        let mut f = Fixture::new();
        let link = f.element("link");
        f.arena.set_attr(link, "rel", "stylesheet");
        f.arena.set_attr(link, "href", "https://cdn.test/site.css");
        let mut sheet = StyleSheet::new(Some("https://cdn.test/site.css".to_string()), vec!["a{}".to_string()]);
        sheet.cross_origin = true;
        f.arena.document_state_mut(f.doc).unwrap().style_sheets.push(sheet);

        let el = f.element_record(link);
        assert_eq!(el.attr("rel"), Some("stylesheet"));
        assert_eq!(el.attr("_cssText"), None);
    }

    #[test]
    fn test_cssom_style_element() {
        let mut f = Fixture::new();
        let style = f.element("style");
        f.arena.element_state_mut(style).unwrap().sheet =
            Some(StyleSheet::new(None, vec![".a { color: red; }".to_string()]));
        let el = f.element_record(style);
        assert_eq!(el.attr("_cssText"), Some(".a { color: red; }"));
    }

    #[test]
    fn test_cssom_style_captured_without_link_inlining() {
        let mut f = Fixture::new();
        f.options.inline_stylesheet = false;
        let style = f.element("style");
        f.arena.element_state_mut(style).unwrap().sheet =
            Some(StyleSheet::new(None, vec![".a { color: red; }".to_string()]));
        let el = f.element_record(style);
        assert_eq!(el.attr("_cssText"), Some(".a { color: red; }"));
    }

    #[test]
    fn test_style_text_uses_sheet_rules_when_alone() {
        let mut f = Fixture::new();
        let style = f.element("style");
        let text = f.arena.create_text(f.doc, ".a{background:url(a.png)}");
        f.arena.append_child(style, text).unwrap();
        f.arena.element_state_mut(style).unwrap().sheet =
            Some(StyleSheet::new(None, vec![".a { background: url(\"a.png\"); }".to_string()]));

        let record = f.text_record(text, false);
        assert!(record.is_style);
        assert_eq!(
            record.text_content,
            ".a { background: url(\"https://example.com/app/a.png\"); }"
        );
    }

    #[test]
    fn test_script_and_noscript_text() {
        let mut f = Fixture::new();
        let script = f.element("script");
        let body = f.arena.create_text(f.doc, "alert('secret')");
        f.arena.append_child(script, body).unwrap();
        let noscript = f.element("noscript");
        let fallback = f.arena.create_text(f.doc, "<img src=x>");
        f.arena.append_child(noscript, fallback).unwrap();

        assert_eq!(f.text_record(body, true).text_content, SCRIPT_PLACEHOLDER);
        assert_eq!(f.text_record(fallback, false).text_content, "");
    }

    #[test]
    fn test_masked_text() {
        let mut f = Fixture::new();
        let p = f.element("p");
        f.arena.set_attr(p, "class", "rr-mask");
        let text = f.arena.create_text(f.doc, "Jane Doe");
        f.arena.append_child(p, text).unwrap();
        assert_eq!(f.text_record(text, false).text_content, "**** ***");

        f.options = SnapshotOptions::default().with_mask_text_fn(|t| t.to_uppercase());
        assert_eq!(f.text_record(text, false).text_content, "JANE DOE");
    }

    #[test]
    fn test_strict_text_obfuscation() {
        let mut f = Fixture::new();
        let p = f.element("p");
        let text = f.arena.create_text(f.doc, "Jane Doe");
        f.arena.append_child(p, text).unwrap();
        let title = f.element("title");
        let title_text = f.arena.create_text(f.doc, "Inbox");
        f.arena.append_child(title, title_text).unwrap();

        let obfuscated = f.text_record(text, true).text_content;
        assert_eq!(obfuscated.len(), 8);
        assert_eq!(obfuscated.chars().nth(4), Some(' '));
        assert!(obfuscated.chars().all(|c| c == ' ' || c.is_ascii_lowercase()));
        assert_eq!(f.text_record(title_text, true).text_content, "Inbox");
    }

    #[test]
    fn test_input_values() {
        let mut f = Fixture::new();
        let password = f.element("input");
        f.arena.set_attr(password, "type", "password");
        f.arena.element_state_mut(password).unwrap().form.value = Some("hunter2".to_string());
        let text = f.element("input");
        f.arena.element_state_mut(text).unwrap().form.value = Some("hello".to_string());
        let checkbox = f.element("input");
        f.arena.set_attr(checkbox, "type", "checkbox");
        f.arena.element_state_mut(checkbox).unwrap().form.checked = true;

        assert_eq!(f.element_record(password).attr("value"), Some("*******"));
        assert_eq!(f.element_record(text).attr("value"), Some("hello"));
        assert_eq!(
            f.element_record(checkbox).attributes.get("checked"),
            Some(&AttributeValue::Bool(true))
        );
    }

    #[test]
    fn test_custom_input_mask_hook() {
        let mut f = Fixture::new();
        f.options = SnapshotOptions::default().with_mask_input_fn(|value| format!("<{} chars>", value.len()));
        f.options.mask_input_options.email = true;
        let email = f.element("input");
        f.arena.set_attr(email, "type", "email");
        f.arena.element_state_mut(email).unwrap().form.value = Some("me@example.com".to_string());
        let search = f.element("input");
        f.arena.set_attr(search, "type", "search");
        f.arena.element_state_mut(search).unwrap().form.value = Some("shoes".to_string());

        assert_eq!(f.element_record(email).attr("value"), Some("<14 chars>"));
        assert_eq!(f.element_record(search).attr("value"), Some("shoes"));
    }

    #[test]
    fn test_option_selection_reflects_live_state() {
        let mut f = Fixture::new();
        let option = f.element("option");
        f.arena.set_attr(option, "selected", "");
        assert!(!f.element_record(option).attributes.contains_key("selected"));

        f.arena.element_state_mut(option).unwrap().form.selected = true;
        assert_eq!(
            f.element_record(option).attributes.get("selected"),
            Some(&AttributeValue::Bool(true))
        );

        f.options.mask_input_options.select = true;
        assert!(!f.element_record(option).attributes.contains_key("selected"));
    }

    #[test]
    fn test_canvas_capture() {
        let mut f = Fixture::new();
        f.options.record_canvas = true;
        let blank = f.element("canvas");
        assert!(!f.element_record(blank).attributes.contains_key("rr_dataURL"));

        let drawn = f.element("canvas");
        {
            let canvas = f.arena.element_state_mut(drawn).unwrap().canvas.as_mut().unwrap();
            canvas.context = Some(CanvasContextKind::TwoD);
            canvas.pixels[3] = 255;
        }
        let data_url = f.element_record(drawn);
        assert!(data_url.attr("rr_dataURL").unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_image_inlining_restores_crossorigin() {
        let mut f = Fixture::new();
        f.options.inline_images = true;
        let img = f.element("img");
        f.arena.set_attr(img, "src", "https://cdn.test/a.png");
        f.arena.element_state_mut(img).unwrap().image = Some(ImageState {
            complete: true,
            natural_width: 1,
            natural_height: 1,
            current_src: "https://cdn.test/a.png".to_string(),
            pixels: vec![255, 0, 0, 255],
            same_origin: false,
            cors_allowed: true,
        });

        let el = f.element_record(img);
        assert!(el.attr("rr_dataURL").unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(el.attr("crossorigin"), None);
        assert_eq!(f.arena.get_attribute(img, "crossorigin"), None);
        assert!(f.canvas.is_created());
    }

    #[test]
    fn test_unloaded_image_is_pending() {
        let mut f = Fixture::new();
        f.options.inline_images = true;
        let img = f.element("img");
        f.arena.set_attr(img, "crossorigin", "use-credentials");
        f.arena.element_state_mut(img).unwrap().image = Some(ImageState {
            complete: false,
            natural_width: 0,
            natural_height: 0,
            current_src: String::new(),
            pixels: Vec::new(),
            same_origin: true,
            cors_allowed: false,
        });

        let raw = f.serialize(img).unwrap();
        assert_eq!(
            raw.pending_image,
            Some(PendingImage {
                prior_cross_origin: Some("use-credentials".to_string())
            })
        );
        assert_eq!(f.arena.get_attribute(img, "crossorigin").as_deref(), Some("anonymous"));
    }

    #[test]
    fn test_media_and_scroll() {
        let mut f = Fixture::new();
        let video = f.element("video");
        f.arena.element_state_mut(video).unwrap().media = Some(MediaState {
            paused: false,
            current_time: 12.5,
        });
        f.arena.element_state_mut(video).unwrap().scroll_top = 40.0;

        let el = f.element_record(video);
        assert_eq!(el.attr("rr_mediaState"), Some("played"));
        assert_eq!(
            el.attributes.get("rr_mediaCurrentTime"),
            Some(&AttributeValue::Number(12.5))
        );
        assert_eq!(el.attributes.get("rr_scrollTop"), Some(&AttributeValue::Number(40.0)));
        assert!(!el.attributes.contains_key("rr_scrollLeft"));

        let ctx = NodeContext {
            newly_added_element: true,
            ..f.ctx(false)
        };
        let raw = serialize_node(&mut f.arena, video, &f.mirror, &f.options, &ctx, &mut f.canvas).unwrap();
        assert!(!raw.data_attributes().contains_key("rr_scrollTop"));
    }

    #[test]
    fn test_blocked_element_keeps_only_box() {
        let mut f = Fixture::new();
        let options = SnapshotConfig {
            block_class: crate::options::ClassRule::Name("highlight-block".to_string()),
            ..SnapshotConfig::default()
        };
        f.options = options.resolve().unwrap();
        let div = f.element("div");
        f.arena.set_attr(div, "class", "highlight-block");
        f.arena.set_attr(div, "title", "secret");
        f.arena.element_state_mut(div).unwrap().rect = DomRect::new(0.0, 0.0, 120.0, 40.5);

        let raw = f.serialize(div).unwrap();
        assert!(raw.need_block);
        let attrs = raw.data_attributes();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("class"), Some(&AttributeValue::from("highlight-block")));
        assert_eq!(attrs.get("rr_width"), Some(&AttributeValue::from("120px")));
        assert_eq!(attrs.get("rr_height"), Some(&AttributeValue::from("40.5px")));
    }

    #[test]
    fn test_strict_image_is_boxed_and_blocks() {
        let mut f = Fixture::new();
        let img = f.element("img");
        f.arena.set_attr(img, "src", "x.png");
        let ctx = f.ctx(true);
        let raw = serialize_node(&mut f.arena, img, &f.mirror, &f.options, &ctx, &mut f.canvas).unwrap();
        assert!(raw.need_block);
        let attrs = raw.data_attributes();
        assert!(!attrs.contains_key("src"));
        assert!(attrs.contains_key("rr_width"));
    }

    #[test]
    fn test_iframe_src_policy() {
        let mut f = Fixture::new();
        let iframe = f.element("iframe");
        f.arena.set_attr(iframe, "src", "https://ads.test/frame");
        let el = f.element_record(iframe);
        assert_eq!(el.attr("src"), None);
        assert_eq!(el.attr("rr_src"), Some("https://ads.test/frame"));

        let sub = f.arena.create_document("https://example.com/app/frame.html");
        f.arena.set_content_document(iframe, sub).unwrap();
        let el = f.element_record(iframe);
        assert_eq!(el.attr("src"), None);
        assert_eq!(el.attr("rr_src"), None);

        f.options = SnapshotOptions::default().with_keep_iframe_src_fn(|src| src.starts_with("https://ads.test"));
        assert_eq!(f.element_record(iframe).attr("src"), Some("https://ads.test/frame"));
    }

    #[test]
    fn test_other_kinds() {
        let mut f = Fixture::new();
        f.arena.document_state_mut(f.doc).unwrap().compat_mode = dom::CompatMode::Quirks;
        let doctype = f.arena.create_doctype(f.doc, "html", "", "");
        let comment = f.arena.create_comment(f.doc, " note ");
        let cdata = f.arena.create_cdata(f.doc, "x < y");
        let pi = f.arena.create_processing_instruction(f.doc, "xml-stylesheet", "href=a.css");

        let doc = f.serialize(f.doc).unwrap();
        assert!(matches!(doc.data, NodeData::Document(DocumentNode { compat_mode: Some(ref m), .. }) if m == "BackCompat"));
        assert!(matches!(f.serialize(doctype).unwrap().data, NodeData::DocumentType(ref d) if d.name == "html"));
        assert!(matches!(f.serialize(comment).unwrap().data, NodeData::Comment(ref c) if c.text_content == " note "));
        assert!(matches!(f.serialize(cdata).unwrap().data, NodeData::CData(ref c) if c.text_content.is_empty()));
        assert!(f.serialize(pi).is_none());
    }

    impl RawNode {
        fn data_attributes(&self) -> &Attributes {
            match &self.data {
                NodeData::Element(el) => &el.attributes,
                _ => panic!("not an element"),
            }
        }
    }
}
