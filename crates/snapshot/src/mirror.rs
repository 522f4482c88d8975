//! Identity registry: live node ⇄ snapshot id
//!
//! One `Mirror` per recording. It owns the id allocator, so renumbering a
//! new recording from 1 is a property of the mirror, not of global state.

use crate::types::{Id, NodeKind, SerializedNode, IGNORED_NODE, UNKNOWN_NODE};
use ahash::AHashMap;
use dom::{Dom, NodeId};

/// Monotonic id source; the first id handed out is 1
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Id,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> Id {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// What the mirror remembers about a registered record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub id: Id,
    pub kind: NodeKind,
    pub tag_name: Option<String>,
    pub root_id: Option<Id>,
}

impl NodeMeta {
    fn of(node: &SerializedNode) -> Self {
        Self {
            id: node.id,
            kind: node.kind(),
            tag_name: node.tag_name().map(str::to_string),
            root_id: node.root_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct Mirror {
    ids: IdAllocator,
    node_meta: AHashMap<NodeId, NodeMeta>,
    id_node: AHashMap<Id, NodeId>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id
    pub fn gen_id(&mut self) -> Id {
        self.ids.next_id()
    }

    /// Id of a live node, `UNKNOWN_NODE` if it was never registered
    pub fn get_id(&self, node: NodeId) -> Id {
        self.node_meta
            .get(&node)
            .map(|meta| meta.id)
            .unwrap_or(UNKNOWN_NODE)
    }

    pub fn get_node(&self, id: Id) -> Option<NodeId> {
        self.id_node.get(&id).copied()
    }

    pub fn get_meta(&self, node: NodeId) -> Option<&NodeMeta> {
        self.node_meta.get(&node)
    }

    /// Every id currently mapped to a live node
    pub fn get_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.id_node.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn has(&self, id: Id) -> bool {
        self.id_node.contains_key(&id)
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.node_meta.contains_key(&node)
    }

    /// Associate a live node with its built record (id included)
    ///
    /// Ignored nodes are remembered on the node side only, so a later
    /// re-serialization keeps them ignored without claiming an id.
    pub fn add(&mut self, node: NodeId, record: &SerializedNode) {
        if record.id != IGNORED_NODE {
            self.id_node.insert(record.id, node);
        }
        self.node_meta.insert(node, NodeMeta::of(record));
    }

    /// Point an existing id at a different live node
    pub fn replace(&mut self, id: Id, node: NodeId) {
        let Some(old) = self.id_node.insert(id, node) else {
            return;
        };
        if old != node {
            if let Some(meta) = self.node_meta.remove(&old) {
                self.node_meta.insert(node, meta);
            }
        }
    }

    /// Forget a node and its whole subtree, shadow tree included
    pub fn remove_node_from_map<D: Dom>(&mut self, dom: &D, node: NodeId) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(meta) = self.node_meta.remove(&current) {
                if self.id_node.get(&meta.id) == Some(&current) {
                    self.id_node.remove(&meta.id);
                }
            }
            stack.extend(dom.children(current));
            if let Some(shadow) = dom.shadow_root(current) {
                stack.extend(dom.children(shadow));
            }
        }
    }

    /// Restart id allocation without forgetting associations
    pub fn cleanup_snapshot(&mut self) {
        self.ids.reset();
    }

    /// Forget everything and restart ids at 1 (new recording)
    pub fn reset(&mut self) {
        self.node_meta.clear();
        self.id_node.clear();
        self.ids.reset();
    }

    pub fn len(&self) -> usize {
        self.id_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_node.is_empty()
    }
}
