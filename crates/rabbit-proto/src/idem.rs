//! `Idem:` deduplication (spec §9 Open Question (c)): a bounded per-lane
//! LRU keyed on `(selector, Idem)`, so a retransmitted request with the
//! same idempotency token is recognized instead of reprocessed.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct LaneEntries {
    order: VecDeque<(String, Instant)>,
}

impl LaneEntries {
    fn new() -> Self {
        Self { order: VecDeque::new() }
    }
}

/// Tracks `(selector, Idem)` pairs seen per lane within a TTL window.
///
/// Spec §9: resolved as "bounded per-lane LRU keyed on `(selector, Idem)`
/// with 60s TTL" — a request whose key is still present is a duplicate the
/// caller should answer from the prior response rather than re-dispatch.
pub struct IdemCache {
    capacity_per_lane: usize,
    ttl: Duration,
    lanes: Mutex<HashMap<u16, LaneEntries>>,
}

impl IdemCache {
    pub fn new(capacity_per_lane: usize, ttl: Duration) -> Self {
        Self {
            capacity_per_lane,
            ttl,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    fn key(selector: &str, idem: &str) -> String {
        format!("{selector}\u{0}{idem}")
    }

    /// Check whether `(selector, idem)` was already seen on `lane` within
    /// the TTL, and record it either way. Returns `true` the first time a
    /// key is seen (the caller should dispatch), `false` on a repeat (the
    /// caller should treat this as a duplicate).
    pub fn check_and_record(&self, lane: u16, selector: &str, idem: &str) -> bool {
        let now = Instant::now();
        let key = Self::key(selector, idem);
        let mut lanes = self.lanes.lock();
        let entries = lanes.entry(lane).or_insert_with(LaneEntries::new);

        entries.order.retain(|(_, seen_at)| now.duration_since(*seen_at) <= self.ttl);

        if entries.order.iter().any(|(k, _)| *k == key) {
            return false;
        }

        entries.order.push_back((key, now));
        while entries.order.len() > self.capacity_per_lane {
            entries.order.pop_front();
        }
        true
    }
}
