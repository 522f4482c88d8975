//! Snapshot Service - Main entry point for serialization
//!
//! Owns everything one recording needs between calls:
//! - The mirror (ids stay stable across full and incremental snapshots)
//! - The resolved option bundle
//! - The shared offscreen canvas used for image inlining
//!
//! Resuming deferred work (loaded iframes, stylesheets and images) goes
//! through the same service so it sees the same ids and options.

use crate::error::Result;
use crate::mirror::Mirror;
use crate::options::{SnapshotConfig, SnapshotOptions};
use crate::serializer::{inline_image, InlineCanvas};
use crate::types::{Id, SerializedNode};
use crate::walker::{Deferred, WalkArgs, Walker};
use dom::{Dom, NodeId};

/// Result of one walk: the tree plus the work still waiting on loads
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub root: Option<SerializedNode>,
    pub deferred: Vec<Deferred>,
}

/// Main snapshot service
pub struct SnapshotService {
    options: SnapshotOptions,
    mirror: Mirror,
    canvas: InlineCanvas,
    top_document: Option<NodeId>,
}

impl SnapshotService {
    /// Create new service with default options
    pub fn new() -> Self {
        Self::with_options(SnapshotOptions::default())
    }

    pub fn with_config(config: &SnapshotConfig) -> Result<Self> {
        Ok(Self::with_options(config.resolve()?))
    }

    pub fn with_options(options: SnapshotOptions) -> Self {
        Self {
            options,
            mirror: Mirror::new(),
            canvas: InlineCanvas::new(),
            top_document: None,
        }
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn mirror_mut(&mut self) -> &mut Mirror {
        &mut self.mirror
    }

    /// Full snapshot of `doc`, which becomes the recorded top document
    pub fn snapshot<D: Dom>(&mut self, dom: &mut D, doc: NodeId) -> Snapshot {
        self.snapshot_with(dom, doc, &mut |_| {})
    }

    /// Full snapshot, calling `on_serialize` for every registered node
    pub fn snapshot_with<D: Dom>(
        &mut self,
        dom: &mut D,
        doc: NodeId,
        on_serialize: &mut dyn FnMut(NodeId),
    ) -> Snapshot {
        self.top_document = Some(doc);
        let args = WalkArgs::from_options(&self.options);
        let snapshot = self.walk(dom, doc, args, Some(on_serialize));
        tracing::info!(
            "[Snapshot] Serialized document: {} nodes registered, {} deferred",
            self.mirror.len(),
            snapshot.deferred.len()
        );
        snapshot
    }

    /// Incremental entry for nodes found after the full snapshot
    ///
    /// Nodes already in the mirror keep their ids.
    pub fn serialize_node_with_id<D: Dom>(&mut self, dom: &mut D, node: NodeId, args: WalkArgs) -> Snapshot {
        self.walk(dom, node, args, None)
    }

    /// Serialize the document of an iframe that has finished loading
    ///
    /// `strict` is the privacy state recorded with the deferred iframe.
    /// None when the frame has no readable document any more.
    pub fn serialize_loaded_iframe<D: Dom>(
        &mut self,
        dom: &mut D,
        iframe: NodeId,
        strict: bool,
    ) -> Option<(SerializedNode, Vec<Deferred>)> {
        let doc = match dom.content_document(iframe) {
            Ok(Some(doc)) => doc,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!("[Snapshot] Iframe {} no longer readable: {}", iframe, e);
                return None;
            }
        };
        let args = WalkArgs {
            strict: strict || self.options.strict_privacy,
            ..WalkArgs::from_options(&self.options)
        };
        let snapshot = self.walk(dom, doc, args, None);
        snapshot.root.map(|root| (root, snapshot.deferred))
    }

    /// Serialize a stylesheet link after its load (or timeout)
    pub fn serialize_loaded_stylesheet<D: Dom>(&mut self, dom: &mut D, link: NodeId) -> Option<SerializedNode> {
        let args = WalkArgs {
            skip_child: true,
            wait_for_stylesheets: false,
            ..WalkArgs::from_options(&self.options)
        };
        self.walk(dom, link, args, None).root
    }

    /// Inline an image that has loaded since it was serialized
    ///
    /// Returns the image's id and data URL.
    pub fn inline_loaded_image<D: Dom>(
        &mut self,
        dom: &mut D,
        image: NodeId,
        prior_cross_origin: Option<&str>,
    ) -> Option<(Id, String)> {
        let doc = dom.owner_document(image)?;
        let data_url = inline_image(dom, &mut self.canvas, doc, image, prior_cross_origin, &self.options)?;
        Some((self.mirror.get_id(image), data_url))
    }

    /// Restart id allocation (between independent snapshots)
    pub fn cleanup_snapshot(&mut self) {
        self.mirror.cleanup_snapshot();
    }

    /// New recording: forget every node, restart ids at 1
    pub fn reset(&mut self) {
        self.mirror.reset();
        self.canvas.reset();
        self.top_document = None;
    }

    fn walk<D: Dom>(
        &mut self,
        dom: &mut D,
        node: NodeId,
        args: WalkArgs,
        on_serialize: Option<&mut dyn FnMut(NodeId)>,
    ) -> Snapshot {
        let top_document = self
            .top_document
            .or_else(|| dom.owner_document(node))
            .unwrap_or(node);
        let mut walker = Walker::new(dom, &mut self.mirror, &self.options, &mut self.canvas, top_document);
        if let Some(callback) = on_serialize {
            walker = walker.on_serialize(callback);
        }
        let root = walker.serialize_node_with_id(node, args);
        Snapshot {
            root,
            deferred: walker.into_deferred(),
        }
    }
}

impl Default for SnapshotService {
    fn default() -> Self {
        Self::new()
    }
}
