//! Tree walker: recursive serialization with identity
//!
//! For each node: serialize → identify → register → recurse → defer.
//!
//! Work that can only finish later (iframe documents, linked stylesheets,
//! images that have not loaded yet) is not waited on here. The walker returns
//! it as [`Deferred`] items; whoever owns the event loop watches for the load
//! and calls back into the walker.

use crate::mirror::Mirror;
use crate::options::{SlimDomOptions, SnapshotOptions};
use crate::serializer::{serialize_node, InlineCanvas, NodeContext};
use crate::types::*;
use dom::{Dom, NodeId, ReadyState};

const BLANK_URL: &str = "about:blank";

/// How to wait for an iframe document before serializing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitFor {
    /// Already loaded: run on the next turn of the event loop
    NextTick,
    /// Loaded but still on its initial `about:blank`: wait for `load`
    LoadEvent,
    /// Still loading: `load` or the iframe timeout, whichever comes first
    LoadOrTimeout,
}

/// Work the walker could not finish synchronously
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// `strict` is the privacy state the iframe's document inherits
    Iframe { iframe: NodeId, wait: WaitFor, strict: bool },
    Stylesheet { link: NodeId },
    Image { image: NodeId, prior_cross_origin: Option<String> },
}

impl Deferred {
    /// Live node the deferred work is attached to
    pub fn node(&self) -> NodeId {
        match self {
            Deferred::Iframe { iframe, .. } => *iframe,
            Deferred::Stylesheet { link } => *link,
            Deferred::Image { image, .. } => *image,
        }
    }
}

/// Per-call knobs of [`Walker::serialize_node_with_id`]
#[derive(Debug, Clone, Copy)]
pub struct WalkArgs {
    /// Serialize the node only, not its subtree
    pub skip_child: bool,
    /// The node was just inserted (skips scroll reads)
    pub newly_added_element: bool,
    pub preserve_white_space: bool,
    /// Strict privacy inherited from ancestors
    pub strict: bool,
    /// Drop `<link rel=stylesheet>` whose sheet has not loaded yet
    pub wait_for_stylesheets: bool,
}

impl WalkArgs {
    pub fn from_options(options: &SnapshotOptions) -> Self {
        Self {
            skip_child: false,
            newly_added_element: false,
            preserve_white_space: options.preserve_white_space,
            strict: options.strict_privacy,
            wait_for_stylesheets: true,
        }
    }
}

fn attr<'a>(record: &'a ElementNode, name: &str) -> &'a str {
    record.attr(name).unwrap_or("")
}

fn lower_attr(record: &ElementNode, name: &str) -> String {
    attr(record, name).to_lowercase()
}

/// Whether slim DOM filtering drops this record
pub fn slim_dom_excluded(record: &SerializedNode, slim: &SlimDomOptions) -> bool {
    let el = match &record.data {
        NodeData::Comment(_) => return slim.comment,
        NodeData::Element(el) => el,
        _ => return false,
    };
    let tag = el.tag_name.as_str();

    if slim.script
        && (tag == "script"
            || (tag == "link" && attr(el, "rel") == "preload" && attr(el, "as") == "script")
            || (tag == "link" && attr(el, "rel") == "prefetch" && attr(el, "href").ends_with(".js")))
    {
        return true;
    }

    if slim.head_favicon {
        let name = lower_attr(el, "name");
        let rel = lower_attr(el, "rel");
        let favicon_link = tag == "link" && attr(el, "rel") == "shortcut icon";
        let favicon_meta = tag == "meta"
            && (name == "msapplication-tileimage"
                || name == "msapplication-tilecolor"
                || name == "application-name"
                || rel == "icon"
                || rel == "apple-touch-icon"
                || rel == "shortcut icon");
        if favicon_link || favicon_meta {
            return true;
        }
    }

    if tag != "meta" {
        return false;
    }
    let name = lower_attr(el, "name");
    let property = lower_attr(el, "property");

    if slim.head_meta_desc_keywords && (name.starts_with("description") || name.ends_with("keywords")) {
        return true;
    }
    if slim.head_meta_social
        && (property.starts_with("og:")
            || property.starts_with("twitter:")
            || property.starts_with("fb:")
            || name.starts_with("og:")
            || name.starts_with("twitter:")
            || name == "pinterest")
    {
        return true;
    }
    if slim.head_meta_robots && matches!(name.as_str(), "robots" | "googlebot" | "bingbot") {
        return true;
    }
    if slim.head_meta_http_equiv && el.attributes.contains_key("http-equiv") {
        return true;
    }
    if slim.head_meta_authorship
        && (matches!(
            name.as_str(),
            "author" | "generator" | "framework" | "publisher" | "progid"
        ) || property.starts_with("article:")
            || property.starts_with("product:"))
    {
        return true;
    }
    slim.head_meta_verification
        && matches!(
            name.as_str(),
            "google-site-verification"
                | "yandex-verification"
                | "csrf-token"
                | "p:domain_verify"
                | "verify-v1"
                | "verification"
                | "shopify-checkout-api-token"
        )
}

/// Recursive serializer bound to one document, mirror and option bundle
pub struct Walker<'a, D: Dom> {
    dom: &'a mut D,
    mirror: &'a mut Mirror,
    options: &'a SnapshotOptions,
    canvas: &'a mut InlineCanvas,
    top_document: NodeId,
    deferred: Vec<Deferred>,
    on_serialize: Option<&'a mut dyn FnMut(NodeId)>,
}

impl<'a, D: Dom> Walker<'a, D> {
    pub fn new(
        dom: &'a mut D,
        mirror: &'a mut Mirror,
        options: &'a SnapshotOptions,
        canvas: &'a mut InlineCanvas,
        top_document: NodeId,
    ) -> Self {
        Self {
            dom,
            mirror,
            options,
            canvas,
            top_document,
            deferred: Vec::new(),
            on_serialize: None,
        }
    }

    /// Called for every node right after it is registered in the mirror
    pub fn on_serialize(mut self, callback: &'a mut dyn FnMut(NodeId)) -> Self {
        self.on_serialize = Some(callback);
        self
    }

    /// Deferred work collected so far
    pub fn into_deferred(self) -> Vec<Deferred> {
        self.deferred
    }

    /// Serialize `node` and (unless skipped or blocked) its subtree
    ///
    /// Returns None when the node is ignored, cannot be serialized, or is a
    /// stylesheet link still waiting for its sheet.
    pub fn serialize_node_with_id(&mut self, node: NodeId, args: WalkArgs) -> Option<SerializedNode> {
        let ctx = NodeContext {
            top_document: self.top_document,
            strict: args.strict,
            newly_added_element: args.newly_added_element,
        };
        let Some(raw) = serialize_node(self.dom, node, self.mirror, self.options, &ctx, self.canvas) else {
            tracing::warn!("[Snapshot] Node {} not serialized", node);
            return None;
        };

        let mut record = SerializedNode {
            id: 0,
            root_id: raw.root_id,
            is_shadow: false,
            data: raw.data,
        };

        record.id = if self.mirror.has_node(node) {
            self.mirror.get_id(node)
        } else if slim_dom_excluded(&record, &self.options.slim_dom)
            || (!args.preserve_white_space && is_blank_text(&record))
        {
            IGNORED_NODE
        } else {
            self.mirror.gen_id()
        };

        if let Some(parent) = self.dom.parent(node) {
            let native_shadow = self
                .dom
                .shadow_root_type(parent)
                .map(|kind| kind.is_native())
                .unwrap_or(false);
            record.is_shadow = native_shadow;
        }

        let is_img = record.tag_name() == Some("img");
        if args.strict && is_img {
            // The live image keeps its src; only a stripped clone is tracked
            match self.dom.clone_node(node) {
                Ok(clone) => {
                    if let Err(e) = self.dom.set_attribute(clone, "src", "") {
                        tracing::debug!("[Snapshot] Cannot clear src on image clone: {}", e);
                    }
                    self.mirror.add(clone, &record);
                }
                Err(e) => tracing::warn!("[Snapshot] Cannot clone image {}: {}", node, e),
            }
        } else {
            self.mirror.add(node, &record);
        }

        if record.id == IGNORED_NODE {
            return None;
        }

        if let Some(callback) = self.on_serialize.as_deref_mut() {
            callback(node);
        }

        if let Some(pending) = raw.pending_image {
            self.deferred.push(Deferred::Image {
                image: node,
                prior_cross_origin: pending.prior_cross_origin,
            });
        }

        let record_child = !args.skip_child && !raw.need_block;
        let child_args = WalkArgs {
            strict: args.strict || raw.need_block || raw.need_mask,
            preserve_white_space: if self.options.slim_dom.head_whitespace && record.tag_name() == Some("head") {
                false
            } else {
                args.preserve_white_space
            },
            newly_added_element: false,
            ..args
        };

        let shadow_root = if record.kind() == NodeKind::Element {
            self.dom.shadow_root(node)
        } else {
            None
        };
        if let (Some(_), NodeData::Element(el)) = (shadow_root, &mut record.data) {
            el.is_shadow_host = true;
        }

        if record_child && matches!(record.kind(), NodeKind::Document | NodeKind::Element) {
            let mut children = Vec::new();
            for child in self.dom.children(node) {
                if let Some(serialized) = self.serialize_node_with_id(child, child_args) {
                    children.push(serialized);
                }
            }
            if let Some(shadow) = shadow_root {
                let native = self
                    .dom
                    .shadow_root_type(shadow)
                    .map(|kind| kind.is_native())
                    .unwrap_or(false);
                for child in self.dom.children(shadow) {
                    if let Some(mut serialized) = self.serialize_node_with_id(child, child_args) {
                        serialized.is_shadow = native;
                        children.push(serialized);
                    }
                }
            }
            if let Some(child_nodes) = record.child_nodes_mut() {
                *child_nodes = children;
            }
        }

        if let Some(el) = record.as_element() {
            if el.tag_name == "iframe" && !raw.need_block {
                if let Some(wait) = self.iframe_wait(node) {
                    self.deferred.push(Deferred::Iframe {
                        iframe: node,
                        wait,
                        strict: child_args.strict,
                    });
                }
            }
            if el.tag_name == "link" && el.attr("rel") == Some("stylesheet") && args.wait_for_stylesheets {
                match self.dom.sheet(node) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        self.deferred.push(Deferred::Stylesheet { link: node });
                        tracing::debug!("[Snapshot] Stylesheet link {} not loaded yet", node);
                        return None;
                    }
                    Err(e) => tracing::debug!("[Snapshot] Cannot observe stylesheet link {}: {}", node, e),
                }
            }
        }

        Some(record)
    }

    /// How to wait for an iframe, None when its document cannot be observed
    fn iframe_wait(&self, iframe: NodeId) -> Option<WaitFor> {
        let doc = match self.dom.content_document(iframe) {
            Ok(Some(doc)) => doc,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("[Snapshot] Cannot observe iframe {}: {}", iframe, e);
                return None;
            }
        };
        let ready_state = match self.dom.ready_state(doc) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!("[Snapshot] Cannot read readyState of iframe {}: {}", iframe, e);
                return None;
            }
        };
        if ready_state != ReadyState::Complete {
            return Some(WaitFor::LoadOrTimeout);
        }

        let location = self.dom.document_url(doc).unwrap_or_default();
        let src = self.dom.get_attribute(iframe, "src").unwrap_or_default();
        if location != BLANK_URL || src == BLANK_URL || src.is_empty() {
            Some(WaitFor::NextTick)
        } else {
            // Complete, but only the initial blank document so far
            Some(WaitFor::LoadEvent)
        }
    }
}

fn is_blank_text(record: &SerializedNode) -> bool {
    match &record.data {
        NodeData::Text(text) => !text.is_style && text.text_content.trim().is_empty(),
        _ => false,
    }
}
