//! Bounded usage trackers
//!
//! Per-key state for rate limits and per-boot use counts. Each tracker holds at
//! most `capacity` entries; inserting a new key id into a full tracker evicts
//! the least useful entry, the one with the smallest `(value, key id)` pair.
//! For the time tracker that is the oldest access, for the count tracker the
//! least-used key. Ties on value go to the lowest key id.

use keyguard_core::KmId;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

/// Fixed-capacity map from key id to an ordered value.
#[derive(Debug, Clone)]
pub struct BoundedUsageTracker<V> {
    entries: BTreeMap<KmId, V>,
    capacity: NonZeroUsize,
}

/// Last access time per key, in milliseconds of monotonic time
pub type AccessTimeTracker = BoundedUsageTracker<u64>;

/// Begun operations per key during this boot
pub type AccessCountTracker = BoundedUsageTracker<u32>;

impl<V: Ord + Copy> BoundedUsageTracker<V> {
    /// Create an empty tracker. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
        }
    }

    /// Current value for `key_id`, if tracked
    pub fn lookup(&self, key_id: KmId) -> Option<V> {
        self.entries.get(&key_id).copied()
    }

    /// Insert or overwrite the value for `key_id`.
    ///
    /// Returns the entry evicted to make room, if any. Overwriting an existing
    /// key never evicts.
    pub fn update(&mut self, key_id: KmId, value: V) -> Option<(KmId, V)> {
        if let Some(slot) = self.entries.get_mut(&key_id) {
            *slot = value;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity.get() {
            self.eviction_victim().and_then(|victim| {
                self.entries
                    .remove(&victim)
                    .map(|old_value| (victim, old_value))
            })
        } else {
            None
        };

        if let Some((victim, _)) = evicted {
            tracing::debug!(
                evicted = %victim,
                inserted = %key_id,
                "usage tracker full, evicted entry"
            );
        }

        self.entries.insert(key_id, value);
        evicted
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of tracked keys
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Entry with the smallest value; the BTreeMap iterates ids in ascending
    /// order so `min_by_key` keeps the lowest id among equal values.
    fn eviction_victim(&self) -> Option<KmId> {
        self.entries
            .iter()
            .min_by_key(|(id, value)| (**value, **id))
            .map(|(id, _)| *id)
    }
}

impl AccessTimeTracker {
    /// Whether at least `min_interval_secs` have passed since the last recorded access.
    pub fn min_interval_elapsed(&self, key_id: KmId, now_ms: u64, min_interval_secs: u32) -> bool {
        match self.lookup(key_id) {
            None => true,
            Some(last_ms) => {
                now_ms.saturating_sub(last_ms) >= u64::from(min_interval_secs).saturating_mul(1000)
            }
        }
    }

    /// Record an access at `now_ms`
    pub fn record_access(&mut self, key_id: KmId, now_ms: u64) -> Option<(KmId, u64)> {
        self.update(key_id, now_ms)
    }
}

impl AccessCountTracker {
    /// Whether the key has been used fewer than `max_uses` times.
    pub fn below_limit(&self, key_id: KmId, max_uses: u32) -> bool {
        self.lookup(key_id).unwrap_or(0) < max_uses
    }

    /// Count one more use of `key_id`
    pub fn increment(&mut self, key_id: KmId) -> Option<(KmId, u32)> {
        let next = self.lookup(key_id).unwrap_or(0).saturating_add(1);
        self.update(key_id, next)
    }
}
