//! Detection cache and confidence refilter.
//!
//! The scheduler writes a whole new `DetectionSet` once per completed
//! cycle; UI-side readers refilter the cached set on every threshold tick
//! without touching the preprocessor or the inference backend. Writes are
//! whole-object snapshot replacements, so readers never observe a
//! partially-written set.

use std::sync::{Arc, RwLock};

use crate::detect::{Detection, DetectionSet};

#[derive(Default)]
pub struct DetectionCache {
    latest: RwLock<Arc<DetectionSet>>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached set with this cycle's full unfiltered output.
    pub fn set_latest(&self, set: DetectionSet) {
        let mut guard = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(set);
    }

    /// Snapshot of the most recently completed cycle.
    pub fn latest(&self) -> Arc<DetectionSet> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Detections at or above `threshold` from the cached set. Pure and
    /// O(n); safe to call at slider frequency.
    pub fn apply_threshold(&self, threshold: f32) -> Vec<Detection> {
        self.latest().filter_by_confidence(threshold)
    }

    /// Drop the cached set (stop/reset path).
    pub fn clear(&self) {
        self.set_latest(DetectionSet::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn set_with_confidences(confs: &[f32]) -> DetectionSet {
        DetectionSet {
            detections: confs
                .iter()
                .map(|c| Detection {
                    class_id: 0,
                    class_name: "mouse".into(),
                    confidence: *c,
                    bbox: BoundingBox {
                        x1: 0.0,
                        y1: 0.0,
                        x2: 1.0,
                        y2: 1.0,
                    },
                })
                .collect(),
            original_width: 320,
            original_height: 240,
            frame_index: 1,
        }
    }

    #[test]
    fn refilter_returns_at_or_above_threshold() {
        let cache = DetectionCache::new();
        cache.set_latest(set_with_confidences(&[0.9, 0.5, 0.3]));

        assert_eq!(cache.apply_threshold(0.5).len(), 2);
        assert_eq!(cache.apply_threshold(0.0).len(), 3);
        assert_eq!(cache.apply_threshold(0.95).len(), 0);
    }

    #[test]
    fn refilter_is_monotonic_in_threshold() {
        let cache = DetectionCache::new();
        cache.set_latest(set_with_confidences(&[0.9, 0.7, 0.5, 0.3, 0.1]));

        let loose = cache.apply_threshold(0.3);
        let tight = cache.apply_threshold(0.7);

        assert!(tight.len() <= loose.len());
        for d in &tight {
            assert!(loose.iter().any(|l| l.confidence == d.confidence));
        }
    }

    #[test]
    fn set_latest_replaces_whole_set() {
        let cache = DetectionCache::new();
        cache.set_latest(set_with_confidences(&[0.9]));
        cache.set_latest(set_with_confidences(&[0.4, 0.2]));

        let latest = cache.latest();
        assert_eq!(latest.len(), 2);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = DetectionCache::new();
        cache.set_latest(set_with_confidences(&[0.9]));
        cache.clear();
        assert!(cache.latest().is_empty());
        assert!(cache.apply_threshold(0.0).is_empty());
    }
}
