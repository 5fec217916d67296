//! Block Decision Service
//!
//! Pure domain logic deciding whether a post must be hidden, plus the
//! single visibility write that follows a positive decision.

use crate::domain::ports::FeedDom;
use crate::domain::value_objects::{BlockList, NodeId};

/// Block decision engine.
///
/// A post is blocked when its author's location matches an entry of the
/// block list. Unknown locations never block. Decisions only ever hide:
/// a post that no longer matches is left as it is.
pub struct BlockDecision;

impl BlockDecision {
    /// Decide whether a location is blocked.
    ///
    /// # Example
    /// ```
    /// use feed_geoblock::{BlockDecision, BlockList};
    ///
    /// let list = BlockList::new(["germany", "de"]);
    /// assert!(BlockDecision::decide(Some("Germany"), &list));
    /// assert!(BlockDecision::decide(Some("DE"), &list));
    /// assert!(!BlockDecision::decide(None, &list));
    /// ```
    pub fn decide(location: Option<&str>, block_list: &BlockList) -> bool {
        match location {
            Some(location) => block_list.contains(location),
            None => false,
        }
    }

    /// Hide `post` if its location is blocked.
    ///
    /// The enclosing feed cell is hidden when there is one so that no empty
    /// gap is left in the feed; otherwise the post itself is hidden.
    /// Returns the node that was hidden.
    pub fn apply(
        dom: &dyn FeedDom,
        post: NodeId,
        location: Option<&str>,
        block_list: &BlockList,
    ) -> Option<NodeId> {
        if !Self::decide(location, block_list) {
            return None;
        }

        let target = dom.feed_cell_of(post).unwrap_or(post);
        dom.suppress_display(target);
        Some(target)
    }
}
