//! Feed Document Port
//!
//! Defines the interface the pipeline uses to read and hide feed posts.
//! The document is owned by the host; the pipeline only queries it and
//! suppresses the display of nodes.

use crate::domain::value_objects::NodeId;

/// Read access to the rendered feed plus the single write the pipeline needs.
///
/// Implementations may be a live browser document or an in-memory tree.
/// Nodes can appear, move or disappear between calls, so callers never
/// cache results across mutations.
pub trait FeedDom: Send + Sync {
    /// All posts currently attached to the document, in document order.
    fn rendered_posts(&self) -> Vec<NodeId>;

    /// The node itself if it is a post, followed by every post beneath it.
    fn posts_within(&self, node: NodeId) -> Vec<NodeId>;

    /// `href` of the first site-relative author link inside a post.
    fn author_href(&self, post: NodeId) -> Option<String>;

    /// Closest feed cell containing the node (the node itself included).
    fn feed_cell_of(&self, node: NodeId) -> Option<NodeId>;

    /// Hide a node so that page styles cannot bring it back.
    fn suppress_display(&self, node: NodeId);
}
