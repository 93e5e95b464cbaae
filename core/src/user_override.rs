//! User-override cache (C5): a fixed-capacity, recency-and-decay-weighted cache that
//! suggests a previously chosen value for a position given its surrounding context.
//! Backed by `lru::LruCache`, the same crate the teacher uses for its own
//! engine-level candidate cache, generalized here to decay-weighted suggestions.

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::walker::NodeAnchor;

#[derive(Debug, Clone)]
struct Record {
    chosen: String,
    last_seen: f64,
    count: u32,
}

pub struct OverrideCache {
    entries: LruCache<String, Record>,
    half_life_secs: f64,
    suggest_threshold: f64,
    min_recorded_score: f32,
}

/// Builds the context key for a cursor position from the walked path: the value of
/// the node at the cursor, plus the values of its immediate neighbors.
pub fn context_key(values: &[&str], path: &[NodeAnchor], cursor: usize) -> Option<String> {
    let idx = path.iter().position(|a| cursor >= a.start && cursor < a.end())?;
    let here = values.get(idx).copied().unwrap_or_default();
    let before = idx.checked_sub(1).and_then(|i| values.get(i)).copied().unwrap_or("");
    let after = values.get(idx + 1).copied().unwrap_or("");
    Some(format!("{before}\u{1}{here}\u{1}{after}"))
}

impl OverrideCache {
    pub fn new(capacity: usize, half_life_secs: f64, suggest_threshold: f64, min_recorded_score: f32) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        OverrideCache {
            entries: LruCache::new(capacity),
            half_life_secs,
            suggest_threshold,
            min_recorded_score,
        }
    }

    /// Records a choice made at `context`, unless `score` is at or below the floor that
    /// keeps garbage out of the cache.
    pub fn observe(&mut self, context: &str, chosen: &str, score: f32, now: f64) {
        if score <= self.min_recorded_score {
            return;
        }
        if let Some(record) = self.entries.get_mut(context) {
            if record.chosen == chosen {
                record.count = record.count.saturating_add(1);
            } else {
                record.chosen = chosen.to_string();
                record.count = 1;
            }
            record.last_seen = now;
        } else {
            self.entries.put(
                context.to_string(),
                Record { chosen: chosen.to_string(), last_seen: now, count: 1 },
            );
        }
    }

    /// Returns the stored choice for `context` if its decayed weight still exceeds the
    /// suggestion threshold.
    pub fn suggest(&mut self, context: &str, now: f64) -> Option<String> {
        let record = self.entries.get(context)?;
        let weight = self.effective_weight(record, now);
        if weight > self.suggest_threshold {
            Some(record.chosen.clone())
        } else {
            None
        }
    }

    fn effective_weight(&self, record: &Record, now: f64) -> f64 {
        let age = (now - record.last_seen).max(0.0);
        record.count as f64 * (-std::f64::consts::LN_2 * age / self.half_life_secs).exp()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};

    #[test]
    fn suggests_a_recently_observed_choice() {
        let mut cache = OverrideCache::new(500, 5400.0, 0.1, -8.0);
        cache.observe("ctx", "妳", 0.0, 0.0);
        assert_eq!(cache.suggest("ctx", 0.0).as_deref(), Some("妳"));
    }

    #[test]
    fn does_not_record_scores_at_or_below_the_floor() {
        let mut cache = OverrideCache::new(500, 5400.0, 0.1, -8.0);
        cache.observe("ctx", "妳", -8.0, 0.0);
        assert_eq!(cache.suggest("ctx", 0.0), None);
    }

    #[test]
    fn weight_halves_after_one_half_life() {
        let clock = FakeClock::new(0.0);
        let mut cache = OverrideCache::new(500, 5400.0, 0.001, -8.0);
        cache.observe("ctx", "妳", 0.0, clock.now_secs());
        let w0 = cache.effective_weight(cache.entries.peek("ctx").unwrap(), clock.now_secs());
        clock.advance(5400.0);
        let w1 = cache.effective_weight(cache.entries.peek("ctx").unwrap(), clock.now_secs());
        assert!((w1 - w0 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let mut cache = OverrideCache::new(2, 5400.0, 0.1, -8.0);
        cache.observe("a", "A", 0.0, 0.0);
        cache.observe("b", "B", 0.0, 0.0);
        cache.observe("c", "C", 0.0, 0.0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.suggest("a", 0.0), None);
    }

    #[test]
    fn context_key_includes_neighbors() {
        let path = vec![
            NodeAnchor { start: 0, length: 1 },
            NodeAnchor { start: 1, length: 1 },
            NodeAnchor { start: 2, length: 1 },
        ];
        let values = ["你", "好", "嗎"];
        let key = context_key(&values, &path, 1).unwrap();
        assert!(key.contains('你'));
        assert!(key.contains('好'));
        assert!(key.contains('嗎'));
    }
}
