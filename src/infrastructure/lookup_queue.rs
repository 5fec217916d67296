//! Lookup Queue
//!
//! Deduplicating FIFO of authors awaiting a location lookup, paced so that
//! at most one lookup is outstanding and consecutive lookups are spaced by
//! a minimum interval plus random jitter. Provider rate-limit notices
//! suspend dispatch until the provider window reopens.
//!
//! The queue is a plain state machine driven with explicit timestamps.
//! It never sleeps itself; the owner asks for `next_wakeup` and calls
//! `expire` when that instant is reached.

use crate::domain::value_objects::{AuthorId, RequestToken};
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Lookup pacing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQueueConfig {
    /// Minimum delay between a response and the next dispatch
    pub min_interval: Duration,
    /// Maximum random delay added on top of `min_interval`
    pub jitter: Duration,
    /// How long to wait for a response before giving up on it
    pub dispatch_timeout: Duration,
}

impl Default for LookupQueueConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(2000),
            jitter: Duration::from_millis(1000),
            dispatch_timeout: Duration::from_secs(30),
        }
    }
}

/// Where the single dispatch slot currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPhase {
    /// Nothing outstanding; the next author may be dispatched
    Idle,
    /// A request is on the wire
    AwaitingResponse {
        author: AuthorId,
        token: RequestToken,
        deadline: Instant,
    },
    /// A response arrived; pacing delay before the slot frees up
    CoolingDown { until: Instant },
}

/// A lookup released for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub author: AuthorId,
    pub token: RequestToken,
}

/// What `expire` found when timers came due.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expired {
    /// Author whose request got no response in time
    pub timed_out: Option<AuthorId>,
    /// The rate-limit window closed
    pub rate_limit_lifted: bool,
}

/// Deduplicating, paced lookup queue.
pub struct LookupQueue {
    config: LookupQueueConfig,
    pending: VecDeque<AuthorId>,
    /// Mirror of `pending` for O(1) dedup
    queued: HashSet<AuthorId>,
    phase: DispatchPhase,
    rate_limited_until: Option<Instant>,
}

impl LookupQueue {
    /// Create a new lookup queue.
    pub fn new(config: LookupQueueConfig) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            phase: DispatchPhase::Idle,
            rate_limited_until: None,
        }
    }

    /// Append an author unless it is already queued or being looked up.
    ///
    /// Returns true if the author was added.
    pub fn enqueue(&mut self, author: AuthorId) -> bool {
        if self.queued.contains(&author) || self.awaiting(&author) {
            return false;
        }

        self.queued.insert(author.clone());
        self.pending.push_back(author);
        true
    }

    /// Release the head of the queue if the dispatch slot is free.
    ///
    /// Nothing is released while a request is outstanding, while the pacing
    /// cooldown runs, or while the provider rate limit is in force.
    pub fn next_dispatch(&mut self, now: Instant) -> Option<Dispatch> {
        if self.in_flight() || self.is_rate_limited(now) {
            return None;
        }

        let author = self.pending.pop_front()?;
        self.queued.remove(&author);

        let token = RequestToken::generate();
        self.phase = DispatchPhase::AwaitingResponse {
            author: author.clone(),
            token,
            deadline: now + self.config.dispatch_timeout,
        };

        Some(Dispatch { author, token })
    }

    /// Accept a response for the outstanding request and start the cooldown.
    ///
    /// A response matches when its token equals the outstanding token, or,
    /// for a response that carries no token, when it names the outstanding
    /// author. Anything else is ignored and `None` is returned.
    pub fn complete(
        &mut self,
        token: Option<&RequestToken>,
        author: &AuthorId,
        now: Instant,
    ) -> Option<AuthorId> {
        let matched = match (&self.phase, token) {
            (DispatchPhase::AwaitingResponse { token: expected, author: pending, .. }, Some(t)) => {
                (expected == t).then(|| pending.clone())
            }
            (DispatchPhase::AwaitingResponse { author: pending, .. }, None) => {
                (pending == author).then(|| pending.clone())
            }
            _ => None,
        }?;

        self.phase = DispatchPhase::CoolingDown {
            until: now + self.pacing_delay(),
        };
        Some(matched)
    }

    /// Suspend dispatch until `until`, abandoning any outstanding request.
    ///
    /// Returns the abandoned author, which is not re-enqueued.
    pub fn suspend_until(&mut self, until: Instant) -> Option<AuthorId> {
        self.rate_limited_until = Some(match self.rate_limited_until {
            Some(current) => current.max(until),
            None => until,
        });

        match std::mem::replace(&mut self.phase, DispatchPhase::Idle) {
            DispatchPhase::AwaitingResponse { author, .. } => Some(author),
            _ => None,
        }
    }

    /// Advance timers that are due at `now`.
    pub fn expire(&mut self, now: Instant) -> Expired {
        let mut expired = Expired::default();

        let slot_free = match &self.phase {
            DispatchPhase::CoolingDown { until } => *until <= now,
            DispatchPhase::AwaitingResponse { deadline, author, .. } if *deadline <= now => {
                expired.timed_out = Some(author.clone());
                true
            }
            _ => false,
        };
        if slot_free {
            self.phase = DispatchPhase::Idle;
        }

        if self.rate_limited_until.is_some_and(|until| until <= now) {
            self.rate_limited_until = None;
            expired.rate_limit_lifted = true;
        }

        expired
    }

    /// Earliest instant at which `expire` has something to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        let phase_deadline = match &self.phase {
            DispatchPhase::Idle => None,
            DispatchPhase::AwaitingResponse { deadline, .. } => Some(*deadline),
            DispatchPhase::CoolingDown { until } => Some(*until),
        };

        match (phase_deadline, self.rate_limited_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether the dispatch slot is taken (request outstanding or cooling down).
    pub fn in_flight(&self) -> bool {
        self.phase != DispatchPhase::Idle
    }

    /// Whether a rate-limit window is still open at `now`.
    pub fn is_rate_limited(&self, now: Instant) -> bool {
        self.rate_limited_until.is_some_and(|until| until > now)
    }

    pub fn rate_limited_until(&self) -> Option<Instant> {
        self.rate_limited_until
    }

    pub fn phase(&self) -> &DispatchPhase {
        &self.phase
    }

    /// Whether the author is waiting in the queue.
    pub fn contains(&self, author: &AuthorId) -> bool {
        self.queued.contains(author)
    }

    /// Number of authors waiting (the outstanding one excluded).
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn awaiting(&self, author: &AuthorId) -> bool {
        matches!(&self.phase, DispatchPhase::AwaitingResponse { author: a, .. } if a == author)
    }

    /// Uniform draw from `[min_interval, min_interval + jitter]`.
    fn pacing_delay(&self) -> Duration {
        let jitter_ms = self.config.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.config.min_interval + Duration::from_millis(extra)
    }
}

impl Default for LookupQueue {
    fn default() -> Self {
        Self::new(LookupQueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(name: &str) -> AuthorId {
        AuthorId::new(name)
    }

    fn fast_config() -> LookupQueueConfig {
        LookupQueueConfig {
            min_interval: Duration::from_millis(100),
            jitter: Duration::ZERO,
            dispatch_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_lookup_queue_config_default() {
        let config = LookupQueueConfig::default();
        assert_eq!(config.min_interval, Duration::from_millis(2000));
        assert_eq!(config.jitter, Duration::from_millis(1000));
        assert_eq!(config.dispatch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_lookup_queue_new() {
        let queue = LookupQueue::default();
        assert!(queue.is_empty());
        assert!(!queue.in_flight());
        assert_eq!(queue.next_wakeup(), None);
    }

    // ===== Enqueue Tests =====

    #[test]
    fn test_enqueue_dedups() {
        let mut queue = LookupQueue::default();

        assert!(queue.enqueue(author("alice")));
        assert!(!queue.enqueue(author("alice")));
        assert!(queue.enqueue(author("bob")));

        assert_eq!(queue.len(), 2);
        assert!(queue.contains(&author("alice")));
    }

    #[test]
    fn test_enqueue_skips_author_in_flight() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.enqueue(author("alice"));
        queue.next_dispatch(now).unwrap();

        assert!(!queue.enqueue(author("alice")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_enqueue_allowed_again_after_dispatch_completes() {
        let mut queue = LookupQueue::new(fast_config());
        let now = Instant::now();

        queue.enqueue(author("alice"));
        let d = queue.next_dispatch(now).unwrap();
        queue.complete(Some(&d.token), &d.author, now);

        assert!(queue.enqueue(author("alice")));
    }

    // ===== Dispatch Tests =====

    #[test]
    fn test_dispatch_in_fifo_order() {
        let mut queue = LookupQueue::new(fast_config());
        let mut now = Instant::now();

        for name in ["a", "b", "c"] {
            queue.enqueue(author(name));
        }

        let mut order = Vec::new();
        while let Some(d) = queue.next_dispatch(now) {
            order.push(d.author.to_string());
            queue.complete(Some(&d.token), &d.author, now);
            now += Duration::from_millis(100);
            queue.expire(now);
        }

        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_single_request_in_flight() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.enqueue(author("a"));
        queue.enqueue(author("b"));

        assert!(queue.next_dispatch(now).is_some());
        assert!(queue.next_dispatch(now).is_none());
        assert!(queue.in_flight());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dispatch_empty_queue() {
        let mut queue = LookupQueue::default();
        assert!(queue.next_dispatch(Instant::now()).is_none());
        assert!(!queue.in_flight());
    }

    #[test]
    fn test_tokens_fresh_per_dispatch() {
        let mut queue = LookupQueue::new(fast_config());
        let now = Instant::now();

        queue.enqueue(author("a"));
        queue.enqueue(author("b"));

        let first = queue.next_dispatch(now).unwrap();
        queue.complete(Some(&first.token), &first.author, now);
        queue.expire(now + Duration::from_millis(100));
        let second = queue.next_dispatch(now + Duration::from_millis(100)).unwrap();

        assert_ne!(first.token, second.token);
    }

    // ===== Completion Tests =====

    #[test]
    fn test_complete_starts_cooldown() {
        let mut queue = LookupQueue::new(fast_config());
        let now = Instant::now();

        queue.enqueue(author("a"));
        queue.enqueue(author("b"));
        let d = queue.next_dispatch(now).unwrap();

        assert_eq!(queue.complete(Some(&d.token), &d.author, now), Some(author("a")));
        assert_eq!(
            queue.phase(),
            &DispatchPhase::CoolingDown {
                until: now + Duration::from_millis(100)
            }
        );

        // Still paced
        assert!(queue.next_dispatch(now + Duration::from_millis(99)).is_none());

        queue.expire(now + Duration::from_millis(100));
        assert!(!queue.in_flight());
        assert!(queue.next_dispatch(now + Duration::from_millis(100)).is_some());
    }

    #[test]
    fn test_cooldown_within_jitter_bounds() {
        let config = LookupQueueConfig::default();
        let now = Instant::now();

        for _ in 0..50 {
            let mut queue = LookupQueue::new(config.clone());
            queue.enqueue(author("a"));
            let d = queue.next_dispatch(now).unwrap();
            queue.complete(Some(&d.token), &d.author, now);

            let until = queue.next_wakeup().unwrap();
            assert!(until >= now + Duration::from_millis(2000));
            assert!(until <= now + Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_complete_mismatched_token_ignored() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.enqueue(author("a"));
        let d = queue.next_dispatch(now).unwrap();

        let stranger = RequestToken::generate();
        assert_eq!(queue.complete(Some(&stranger), &d.author, now), None);
        assert!(matches!(queue.phase(), DispatchPhase::AwaitingResponse { .. }));
    }

    #[test]
    fn test_complete_without_token_matches_by_author() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.enqueue(author("a"));
        queue.next_dispatch(now).unwrap();

        assert_eq!(queue.complete(None, &author("zed"), now), None);
        assert_eq!(queue.complete(None, &author("a"), now), Some(author("a")));
    }

    #[test]
    fn test_complete_when_idle_ignored() {
        let mut queue = LookupQueue::default();
        let token = RequestToken::generate();
        assert_eq!(queue.complete(Some(&token), &author("a"), Instant::now()), None);
        assert!(!queue.in_flight());
    }

    #[test]
    fn test_duplicate_response_ignored_during_cooldown() {
        let mut queue = LookupQueue::new(fast_config());
        let now = Instant::now();

        queue.enqueue(author("a"));
        let d = queue.next_dispatch(now).unwrap();
        queue.complete(Some(&d.token), &d.author, now);
        let until = queue.next_wakeup();

        assert_eq!(queue.complete(Some(&d.token), &d.author, now), None);
        assert_eq!(queue.next_wakeup(), until);
    }

    // ===== Rate Limit Tests =====

    #[test]
    fn test_suspend_abandons_in_flight() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.enqueue(author("a"));
        queue.enqueue(author("b"));
        queue.next_dispatch(now).unwrap();

        let abandoned = queue.suspend_until(now + Duration::from_secs(60));

        assert_eq!(abandoned, Some(author("a")));
        assert!(!queue.in_flight());
        assert!(!queue.contains(&author("a")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_no_dispatch_while_rate_limited() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();
        let until = now + Duration::from_secs(60);

        queue.enqueue(author("a"));
        queue.suspend_until(until);

        assert!(queue.next_dispatch(now).is_none());
        assert!(queue.next_dispatch(until - Duration::from_millis(1)).is_none());
        assert_eq!(queue.next_wakeup(), Some(until));

        let expired = queue.expire(until);
        assert!(expired.rate_limit_lifted);
        assert_eq!(queue.next_dispatch(until).map(|d| d.author), Some(author("a")));
    }

    #[test]
    fn test_suspend_keeps_latest_window() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.suspend_until(now + Duration::from_secs(60));
        queue.suspend_until(now + Duration::from_secs(10));

        assert_eq!(queue.rate_limited_until(), Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_late_response_after_suspend_ignored() {
        let mut queue = LookupQueue::default();
        let now = Instant::now();

        queue.enqueue(author("a"));
        let d = queue.next_dispatch(now).unwrap();
        queue.suspend_until(now + Duration::from_secs(60));

        assert_eq!(queue.complete(Some(&d.token), &d.author, now), None);
        assert!(!queue.in_flight());
    }

    // ===== Timeout Tests =====

    #[test]
    fn test_dispatch_timeout_frees_slot() {
        let mut queue = LookupQueue::new(fast_config());
        let now = Instant::now();

        queue.enqueue(author("a"));
        queue.enqueue(author("b"));
        queue.next_dispatch(now).unwrap();

        let deadline = now + Duration::from_secs(1);
        assert_eq!(queue.next_wakeup(), Some(deadline));

        let early = queue.expire(deadline - Duration::from_millis(1));
        assert_eq!(early.timed_out, None);
        assert!(queue.in_flight());

        let expired = queue.expire(deadline);
        assert_eq!(expired.timed_out, Some(author("a")));
        assert_eq!(queue.next_dispatch(deadline).map(|d| d.author), Some(author("b")));
    }

    #[test]
    fn test_next_wakeup_prefers_earliest() {
        let mut queue = LookupQueue::new(fast_config());
        let now = Instant::now();

        queue.enqueue(author("a"));
        let d = queue.next_dispatch(now).unwrap();
        queue.complete(Some(&d.token), &d.author, now);
        queue.rate_limited_until = Some(now + Duration::from_secs(5));

        assert_eq!(queue.next_wakeup(), Some(now + Duration::from_millis(100)));
    }
}
