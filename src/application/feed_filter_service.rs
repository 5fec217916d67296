//! Feed Filter Service - Main application use case
//!
//! Orchestrates the filtering pipeline: scanning inserted posts, answering
//! from the location cache, pacing lookups through the queue and hiding
//! posts whose author resolves to a blocked country.

use crate::domain::entities::{ChannelMessage, MutationBatch};
use crate::domain::ports::{FeedDom, LocationCache, LookupChannel};
use crate::domain::services::BlockDecision;
use crate::domain::value_objects::{AuthorId, BlockList, NodeId, RequestToken};
use crate::infrastructure::config_bridge::{ConfigDelta, FilterSettings};
use crate::infrastructure::lookup_queue::{LookupQueue, LookupQueueConfig};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Mutable state of one pipeline instance.
///
/// Owned by a single `FeedFilterService`; nothing else touches it.
pub struct PipelineState {
    pub queue: LookupQueue,
    pub block_list: BlockList,
    pub debug: bool,
}

impl PipelineState {
    pub fn new(settings: &FilterSettings, queue_config: LookupQueueConfig) -> Self {
        Self {
            queue: LookupQueue::new(queue_config),
            block_list: BlockList::new(&settings.block_list),
            debug: settings.debug,
        }
    }
}

/// Feed filter service - main application use case.
///
/// This service orchestrates the pipeline:
/// 1. Extracts authors from newly inserted posts
/// 2. Decides immediately on a cache hit, enqueues a lookup on a miss
/// 3. Releases one paced lookup at a time over the lookup channel
/// 4. Caches responses and re-checks every rendered post by that author
pub struct FeedFilterService {
    dom: Arc<dyn FeedDom>,
    cache: Arc<dyn LocationCache>,
    channel: Arc<dyn LookupChannel>,
    state: PipelineState,
}

impl FeedFilterService {
    /// Create a new feed filter service.
    pub fn new(
        dom: Arc<dyn FeedDom>,
        cache: Arc<dyn LocationCache>,
        channel: Arc<dyn LookupChannel>,
        state: PipelineState,
    ) -> Self {
        Self {
            dom,
            cache,
            channel,
            state,
        }
    }

    // ===== Feed Scanner =====

    /// Scan every post inserted by a mutation batch.
    ///
    /// Entries may be single posts or whole subtrees holding many posts.
    pub fn on_mutation(&mut self, batch: &MutationBatch) {
        for node in &batch.added {
            for post in self.dom.posts_within(*node) {
                self.on_post(post);
            }
        }
    }

    /// Decide on a post from the cache, or queue its author for lookup.
    pub fn on_post(&mut self, post: NodeId) {
        let Some(author) = self.author_of(post) else {
            tracing::trace!(%post, "post has no author link");
            return;
        };

        match self.cache.get(&author) {
            Some(record) => {
                self.apply(post, &author, record.location.as_deref());
            }
            None => self.enqueue(author),
        }
    }

    /// Scan every post already in the document, as on first attach.
    pub fn scan_document(&mut self) {
        for post in self.dom.rendered_posts() {
            self.on_post(post);
        }
    }

    /// Re-check every rendered post against the current block list.
    ///
    /// Only cached locations are used; no lookup is ever issued from here.
    pub fn rescan_all(&mut self) {
        let posts = self.dom.rendered_posts();
        let mut hidden = 0;

        for post in &posts {
            let Some(author) = self.author_of(*post) else {
                continue;
            };
            if let Some(record) = self.cache.get(&author) {
                if self.apply(*post, &author, record.location.as_deref()).is_some() {
                    hidden += 1;
                }
            }
        }

        tracing::debug!(posts = posts.len(), hidden, "rescanned feed");
    }

    // ===== Lookup Queue =====

    /// Queue an author for lookup unless its location is already cached.
    pub fn enqueue(&mut self, author: AuthorId) {
        if self.cache.get(&author).is_some() {
            return;
        }
        if self.state.queue.enqueue(author.clone()) && self.state.debug {
            tracing::info!(%author, queued = self.state.queue.len(), "queued location lookup");
        }
        self.pump();
    }

    /// Dispatch the head of the queue if pacing and rate limits allow.
    pub fn pump(&mut self) {
        let Some(dispatch) = self.state.queue.next_dispatch(Instant::now()) else {
            return;
        };

        tracing::debug!(author = %dispatch.author, token = %dispatch.token, "dispatching lookup");
        let request = ChannelMessage::LookupRequest {
            author_id: dispatch.author.clone(),
            request_token: dispatch.token,
        };

        // The slot stays taken; the dispatch timeout frees it.
        if let Err(e) = self.channel.post(&request) {
            tracing::warn!(author = %dispatch.author, "failed to post lookup request: {}", e);
        }
    }

    // ===== Lookup Channel =====

    /// Handle a message received from the lookup channel.
    pub fn handle_message(&mut self, message: ChannelMessage) {
        match message {
            ChannelMessage::LookupResponse {
                author_id,
                location,
                rate_limited,
                request_token,
            } => self.on_response(author_id, location, rate_limited, request_token),
            ChannelMessage::RateLimitNotice {
                reset_time,
                wait_duration,
            } => self.on_rate_limit(reset_time, wait_duration),
            // Our own requests echo back on the bus
            ChannelMessage::LookupRequest { .. } => {}
        }
    }

    fn on_response(
        &mut self,
        author_id: AuthorId,
        location: Option<String>,
        rate_limited: bool,
        request_token: Option<RequestToken>,
    ) {
        let now = Instant::now();
        let Some(author) = self
            .state
            .queue
            .complete(request_token.as_ref(), &author_id, now)
        else {
            tracing::debug!(author = %author_id, "ignoring unmatched lookup response");
            return;
        };

        if rate_limited {
            tracing::warn!(%author, "lookup was rate limited, result not cached");
            return;
        }

        if self.state.debug {
            tracing::info!(%author, location = ?location, "resolved author location");
        }
        self.cache.put(author.clone(), location.clone());

        let mut hidden = 0;
        for post in self.dom.rendered_posts() {
            if self.author_of(post).as_ref() == Some(&author)
                && self.apply(post, &author, location.as_deref()).is_some()
            {
                hidden += 1;
            }
        }
        if hidden > 0 {
            tracing::debug!(%author, hidden, "hid posts after lookup");
        }
    }

    fn on_rate_limit(&mut self, reset_time: u64, wait_duration: u64) {
        let now = Instant::now();
        let unix_now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let until = rate_limit_deadline(now, unix_now, reset_time, wait_duration);

        let abandoned = self.state.queue.suspend_until(until);
        tracing::warn!(
            wait_ms = until.saturating_duration_since(now).as_millis() as u64,
            abandoned = ?abandoned.as_ref().map(AuthorId::as_str),
            queued = self.state.queue.len(),
            "location provider rate limited, pausing lookups"
        );
    }

    // ===== Timers =====

    /// Fire every timer due now, then try to dispatch.
    pub fn on_timer(&mut self) {
        let expired = self.state.queue.expire(Instant::now());

        if let Some(author) = expired.timed_out {
            tracing::warn!(%author, "lookup timed out without a response");
        }
        if expired.rate_limit_lifted {
            tracing::info!(queued = self.state.queue.len(), "rate limit lifted, resuming lookups");
        }

        self.pump();
    }

    /// Instant of the next timer, if any is pending.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.state.queue.next_wakeup()
    }

    // ===== Configuration =====

    /// Apply a settings change. A new block list triggers a full rescan.
    pub fn apply_config_delta(&mut self, delta: ConfigDelta) {
        if let Some(enabled) = delta.debug {
            self.state.debug = enabled;
            tracing::info!(enabled, "debug logging toggled");
        }
        if let Some(list) = delta.block_list {
            self.set_block_list(BlockList::new(&list));
        }
    }

    /// Replace the whole block list, then rescan.
    pub fn set_block_list(&mut self, block_list: BlockList) {
        tracing::info!(entries = ?block_list.entries(), "block list updated");
        self.state.block_list = block_list;
        self.rescan_all();
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    // ===== Helpers =====

    fn author_of(&self, post: NodeId) -> Option<AuthorId> {
        self.dom
            .author_href(post)
            .and_then(|href| AuthorId::from_href(&href))
    }

    fn apply(&self, post: NodeId, author: &AuthorId, location: Option<&str>) -> Option<NodeId> {
        let hidden = BlockDecision::apply(self.dom.as_ref(), post, location, &self.state.block_list);
        if self.state.debug {
            if let Some(node) = hidden {
                tracing::info!(%author, %post, %node, location = ?location, "hid post from blocked country");
            }
        }
        hidden
    }
}

/// Longest pause a single rate-limit notice can impose.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Instant until which lookups stay suspended after a rate-limit notice.
///
/// The later of `now + wait_duration` (milliseconds) and the provider
/// reset time (unix seconds, 0 when unknown) measured against `unix_now`,
/// capped at `MAX_RATE_LIMIT_WAIT` from `now`.
pub fn rate_limit_deadline(
    now: Instant,
    unix_now: Duration,
    reset_time: u64,
    wait_duration: u64,
) -> Instant {
    let wait = Duration::from_millis(wait_duration);
    let until_reset = Duration::from_secs(reset_time).saturating_sub(unix_now);
    let pause = wait.max(until_reset).min(MAX_RATE_LIMIT_WAIT);
    now.checked_add(pause).unwrap_or(now)
}
