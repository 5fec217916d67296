//! In-Memory Feed Document
//!
//! Implements FeedDom with an observable node tree. Insertions under the
//! document root are reported to observers as mutation batches, the way a
//! browser mutation observer reports `childList` changes.

use crate::domain::entities::MutationBatch;
use crate::domain::ports::FeedDom;
use crate::domain::value_objects::NodeId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

/// What a node represents in the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    /// Any structural element
    Container,
    /// Feed cell wrapping one timeline entry
    Cell,
    /// A post (article)
    Post,
    /// An anchor
    Link { href: String },
}

/// Serializable description of a subtree, used for feed snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    pub fn new(kind: NodeKind, children: Vec<SnapshotNode>) -> Self {
        Self { kind, children }
    }

    /// A link to `href`.
    pub fn link(href: impl Into<String>) -> Self {
        Self::new(NodeKind::Link { href: href.into() }, Vec::new())
    }

    /// A post whose author link points at `author_href`.
    pub fn post(author_href: impl Into<String>) -> Self {
        Self::new(NodeKind::Post, vec![Self::link(author_href)])
    }

    /// A feed cell wrapping `children`.
    pub fn cell(children: Vec<SnapshotNode>) -> Self {
        Self::new(NodeKind::Cell, children)
    }
}

/// Errors raised by document operations.
#[derive(Debug, Error)]
pub enum FeedDomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} already has a parent")]
    AlreadyAttached(NodeId),
    #[error("appending {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("failed to read feed snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse feed snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    suppressed: bool,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            suppressed: false,
        }
    }
}

#[derive(Default)]
struct Document {
    nodes: HashMap<NodeId, NodeData>,
    next_id: u64,
    observers: Vec<mpsc::UnboundedSender<MutationBatch>>,
}

impl Document {
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, NodeData::new(kind));
        id
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, FeedDomError> {
        self.nodes.get(&id).ok_or(FeedDomError::UnknownNode(id))
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order walk of the subtree rooted at `start`.
    fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                order.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }

        order
    }

    fn is_post(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(&id).map(|n| &n.kind), Some(NodeKind::Post))
    }

    fn notify(&mut self, batch: MutationBatch) {
        self.observers.retain(|tx| tx.send(batch.clone()).is_ok());
    }

    fn build(&mut self, snapshot: &SnapshotNode) -> NodeId {
        let id = self.alloc(snapshot.kind.clone());
        for child in &snapshot.children {
            let child_id = self.build(child);
            if let Some(node) = self.nodes.get_mut(&child_id) {
                node.parent = Some(id);
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children.push(child_id);
            }
        }
        id
    }
}

/// Observable in-memory feed document.
///
/// All operations take `&self`; the tree sits behind a `parking_lot`
/// lock so the document can be shared between the host driving it and
/// the pipeline reading it.
pub struct MemoryFeedDom {
    root: NodeId,
    doc: RwLock<Document>,
}

impl MemoryFeedDom {
    /// Create an empty document containing only its root.
    pub fn new() -> Self {
        let mut doc = Document::default();
        let root = doc.alloc(NodeKind::Container);
        Self {
            root,
            doc: RwLock::new(doc),
        }
    }

    /// The document root (the body).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Subscribe to insertions under the root.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<MutationBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.doc.write().observers.push(tx);
        rx
    }

    /// Create a detached node.
    pub fn create(&self, kind: NodeKind) -> NodeId {
        self.doc.write().alloc(kind)
    }

    /// Append one node under `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), FeedDomError> {
        self.append_children(parent, &[child])
    }

    /// Append several nodes under `parent`, reported as a single batch.
    pub fn append_children(&self, parent: NodeId, children: &[NodeId]) -> Result<(), FeedDomError> {
        let mut doc = self.doc.write();

        doc.node(parent)?;
        for &child in children {
            let node = doc.node(child)?;
            if node.parent.is_some() || child == self.root {
                return Err(FeedDomError::AlreadyAttached(child));
            }
            if doc.is_ancestor_or_self(child, parent) {
                return Err(FeedDomError::Cycle { parent, child });
            }
        }

        for &child in children {
            if let Some(node) = doc.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
            if let Some(node) = doc.nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        if doc.is_ancestor_or_self(self.root, parent) && !children.is_empty() {
            doc.notify(MutationBatch::new(children.to_vec()));
        }

        Ok(())
    }

    /// Detach a node (and its subtree) from its parent.
    pub fn remove(&self, node: NodeId) -> Result<(), FeedDomError> {
        let mut doc = self.doc.write();

        let parent = doc.node(node)?.parent;
        if let Some(parent) = parent {
            if let Some(p) = doc.nodes.get_mut(&parent) {
                p.children.retain(|&c| c != node);
            }
        }
        if let Some(n) = doc.nodes.get_mut(&node) {
            n.parent = None;
        }

        Ok(())
    }

    /// Build a subtree detached, then attach it in one mutation.
    pub fn insert_snapshot(
        &self,
        parent: NodeId,
        snapshot: &SnapshotNode,
    ) -> Result<NodeId, FeedDomError> {
        let mut ids = self.insert_snapshots(parent, std::slice::from_ref(snapshot))?;
        ids.pop().ok_or(FeedDomError::UnknownNode(parent))
    }

    /// Build several subtrees and attach them in one mutation.
    pub fn insert_snapshots(
        &self,
        parent: NodeId,
        snapshots: &[SnapshotNode],
    ) -> Result<Vec<NodeId>, FeedDomError> {
        let ids: Vec<NodeId> = {
            let mut doc = self.doc.write();
            doc.node(parent)?;
            snapshots.iter().map(|s| doc.build(s)).collect()
        };
        self.append_children(parent, &ids)?;
        Ok(ids)
    }

    /// Load a JSON array of snapshot nodes and append it under the root.
    pub fn load_snapshot_file(&self, path: impl AsRef<Path>) -> Result<Vec<NodeId>, FeedDomError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshots: Vec<SnapshotNode> = serde_json::from_str(&raw)?;
        self.insert_snapshots(self.root, &snapshots)
    }

    /// Whether the node's display has been suppressed.
    pub fn is_suppressed(&self, node: NodeId) -> bool {
        self.doc
            .read()
            .nodes
            .get(&node)
            .map(|n| n.suppressed)
            .unwrap_or(false)
    }

    /// Whether the node is attached under the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.doc.read().is_ancestor_or_self(self.root, node)
    }

    /// Posts hidden directly or through a hidden ancestor.
    pub fn hidden_posts(&self) -> Vec<NodeId> {
        let doc = self.doc.read();
        doc.preorder(self.root)
            .into_iter()
            .filter(|&id| doc.is_post(id))
            .filter(|&id| {
                let mut current = Some(id);
                while let Some(c) = current {
                    match doc.nodes.get(&c) {
                        Some(n) if n.suppressed => return true,
                        Some(n) => current = n.parent,
                        None => break,
                    }
                }
                false
            })
            .collect()
    }
}

impl Default for MemoryFeedDom {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedDom for MemoryFeedDom {
    fn rendered_posts(&self) -> Vec<NodeId> {
        self.posts_within(self.root)
    }

    fn posts_within(&self, node: NodeId) -> Vec<NodeId> {
        let doc = self.doc.read();
        doc.preorder(node)
            .into_iter()
            .filter(|&id| doc.is_post(id))
            .collect()
    }

    fn author_href(&self, post: NodeId) -> Option<String> {
        let doc = self.doc.read();
        doc.preorder(post)
            .into_iter()
            .skip(1)
            .find_map(|id| match doc.nodes.get(&id).map(|n| &n.kind) {
                Some(NodeKind::Link { href }) if href.starts_with('/') => Some(href.clone()),
                _ => None,
            })
    }

    fn feed_cell_of(&self, node: NodeId) -> Option<NodeId> {
        let doc = self.doc.read();
        let mut current = Some(node);
        while let Some(id) = current {
            let data = doc.nodes.get(&id)?;
            if data.kind == NodeKind::Cell {
                return Some(id);
            }
            current = data.parent;
        }
        None
    }

    fn suppress_display(&self, node: NodeId) {
        if let Some(n) = self.doc.write().nodes.get_mut(&node) {
            n.suppressed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // ===== Tree Construction Tests =====

    #[test]
    fn test_new_document_has_root() {
        let dom = MemoryFeedDom::new();
        assert!(dom.is_connected(dom.root()));
        assert!(dom.rendered_posts().is_empty());
    }

    #[test]
    fn test_append_child_unknown_node() {
        let dom = MemoryFeedDom::new();
        let result = dom.append_child(dom.root(), NodeId(999));
        assert!(matches!(result, Err(FeedDomError::UnknownNode(NodeId(999)))));
    }

    #[test]
    fn test_append_child_twice_rejected() {
        let dom = MemoryFeedDom::new();
        let post = dom.create(NodeKind::Post);
        dom.append_child(dom.root(), post).unwrap();

        let result = dom.append_child(dom.root(), post);
        assert!(matches!(result, Err(FeedDomError::AlreadyAttached(_))));
    }

    #[test]
    fn test_append_child_cycle_rejected() {
        let dom = MemoryFeedDom::new();
        let outer = dom.create(NodeKind::Container);
        let inner = dom.create(NodeKind::Container);
        dom.append_child(outer, inner).unwrap();

        let result = dom.append_child(inner, outer);
        assert!(matches!(result, Err(FeedDomError::Cycle { .. })));
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let dom = MemoryFeedDom::new();
        let cell = dom
            .insert_snapshot(dom.root(), &SnapshotNode::cell(vec![SnapshotNode::post("/a")]))
            .unwrap();
        assert_eq!(dom.rendered_posts().len(), 1);

        dom.remove(cell).unwrap();

        assert!(!dom.is_connected(cell));
        assert!(dom.rendered_posts().is_empty());
    }

    // ===== Query Tests =====

    #[test]
    fn test_posts_within_includes_self_and_nested() {
        let dom = MemoryFeedDom::new();
        let quoted = SnapshotNode::post("/quoted");
        let outer = SnapshotNode::new(
            NodeKind::Post,
            vec![SnapshotNode::link("/outer"), quoted],
        );
        let id = dom.insert_snapshot(dom.root(), &outer).unwrap();

        let posts = dom.posts_within(id);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0], id);
    }

    #[test]
    fn test_author_href_skips_external_links() {
        let dom = MemoryFeedDom::new();
        let post = SnapshotNode::new(
            NodeKind::Post,
            vec![
                SnapshotNode::link("https://ads.example.com"),
                SnapshotNode::new(NodeKind::Container, vec![SnapshotNode::link("/alice")]),
                SnapshotNode::link("/bob"),
            ],
        );
        let id = dom.insert_snapshot(dom.root(), &post).unwrap();

        assert_eq!(dom.author_href(id), Some("/alice".to_string()));
    }

    #[test]
    fn test_author_href_missing() {
        let dom = MemoryFeedDom::new();
        let id = dom
            .insert_snapshot(dom.root(), &SnapshotNode::new(NodeKind::Post, vec![]))
            .unwrap();
        assert_eq!(dom.author_href(id), None);
    }

    #[test]
    fn test_feed_cell_of_walks_ancestors() {
        let dom = MemoryFeedDom::new();
        let cell = dom
            .insert_snapshot(
                dom.root(),
                &SnapshotNode::cell(vec![SnapshotNode::new(
                    NodeKind::Container,
                    vec![SnapshotNode::post("/a")],
                )]),
            )
            .unwrap();
        let post = dom.posts_within(cell)[0];

        assert_eq!(dom.feed_cell_of(post), Some(cell));
        assert_eq!(dom.feed_cell_of(cell), Some(cell));
        assert_eq!(dom.feed_cell_of(dom.root()), None);
    }

    #[test]
    fn test_hidden_posts_through_cell() {
        let dom = MemoryFeedDom::new();
        let cell = dom
            .insert_snapshot(dom.root(), &SnapshotNode::cell(vec![SnapshotNode::post("/a")]))
            .unwrap();
        dom.insert_snapshot(dom.root(), &SnapshotNode::post("/b")).unwrap();

        dom.suppress_display(cell);

        let hidden = dom.hidden_posts();
        assert_eq!(hidden, dom.posts_within(cell));
    }

    // ===== Observation Tests =====

    #[tokio::test]
    async fn test_observe_reports_subtree_as_one_batch() {
        let dom = MemoryFeedDom::new();
        let mut rx = dom.observe();

        let cells = vec![
            SnapshotNode::cell(vec![SnapshotNode::post("/a")]),
            SnapshotNode::cell(vec![SnapshotNode::post("/b")]),
        ];
        let ids = dom.insert_snapshots(dom.root(), &cells).unwrap();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.added, ids);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_detached_insertions_not_reported() {
        let dom = MemoryFeedDom::new();
        let mut rx = dom.observe();

        let cell = dom.create(NodeKind::Cell);
        let post = dom.create(NodeKind::Post);
        dom.append_child(cell, post).unwrap();
        assert!(rx.try_recv().is_err());

        dom.append_child(dom.root(), cell).unwrap();
        assert_eq!(rx.recv().await.unwrap().added, vec![cell]);
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let dom = MemoryFeedDom::new();
        drop(dom.observe());

        dom.insert_snapshot(dom.root(), &SnapshotNode::post("/a")).unwrap();
        dom.insert_snapshot(dom.root(), &SnapshotNode::post("/b")).unwrap();

        assert_eq!(dom.rendered_posts().len(), 2);
    }

    // ===== Snapshot File Tests =====

    #[test]
    fn test_load_snapshot_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"kind": "cell", "children": [
                    {{"kind": "post", "children": [{{"kind": "link", "href": "/alice"}}]}}
                ]}},
                {{"kind": "post", "children": [{{"kind": "link", "href": "/bob/status/1"}}]}}
            ]"#
        )
        .unwrap();

        let dom = MemoryFeedDom::new();
        let ids = dom.load_snapshot_file(file.path()).unwrap();
        assert_eq!(ids.len(), 2);

        let hrefs: Vec<Option<String>> = dom
            .rendered_posts()
            .into_iter()
            .map(|p| dom.author_href(p))
            .collect();
        assert_eq!(
            hrefs,
            vec![Some("/alice".to_string()), Some("/bob/status/1".to_string())]
        );
    }

    #[test]
    fn test_load_snapshot_file_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let dom = MemoryFeedDom::new();
        let result = dom.load_snapshot_file(file.path());
        assert!(matches!(result, Err(FeedDomError::Parse(_))));
    }

    #[test]
    fn test_load_snapshot_file_missing() {
        let dom = MemoryFeedDom::new();
        let result = dom.load_snapshot_file("/nonexistent/feed.json");
        assert!(matches!(result, Err(FeedDomError::Io(_))));
    }
}
