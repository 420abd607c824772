//! View diversity tracker (C9): per-patch angular-bucket novelty scoring
//! with deterministic sorted storage.

use std::collections::BTreeMap;

use crate::ident::PatchId;

/// Bucket width, in degrees, over `[0, 360)`.
pub const BUCKET_SIZE_DEG: f64 = 15.0;
/// Number of distinct angle buckets: `360 / BUCKET_SIZE_DEG`.
pub const MAX_BUCKETS: u32 = 24;

/// One angular bucket of observations for a single patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AngleBucket {
    bucket_index: u32,
    observation_count: u32,
    last_update_ms: i64,
}

/// Per-patch sorted list of observed angle buckets, capped to bound memory.
#[derive(Clone, Debug, Default)]
struct PatchBuckets {
    buckets: Vec<AngleBucket>,
}

impl PatchBuckets {
    fn add(&mut self, bucket_index: u32, now_ms: i64, max_buckets_tracked: usize) {
        if let Some(existing) = self.buckets.iter_mut().find(|b| b.bucket_index == bucket_index) {
            existing.observation_count += 1;
            existing.last_update_ms = now_ms;
            return;
        }
        self.buckets.push(AngleBucket {
            bucket_index,
            observation_count: 1,
            last_update_ms: now_ms,
        });
        self.buckets.sort_by_key(|b| b.bucket_index);
        if self.buckets.len() > max_buckets_tracked {
            let oldest_pos = self
                .buckets
                .iter()
                .enumerate()
                .min_by_key(|(_, b)| b.last_update_ms)
                .map(|(i, _)| i);
            if let Some(pos) = oldest_pos {
                self.buckets.remove(pos);
            }
            self.buckets.sort_by_key(|b| b.bucket_index);
        }
    }

    fn score(&self) -> f64 {
        if self.buckets.is_empty() {
            return 1.0;
        }
        let unique = self.buckets.len() as f64;
        let coverage = (unique / f64::from(MAX_BUCKETS)).clamp(0.0, 1.0);

        let total: u32 = self.buckets.iter().map(|b| b.observation_count).sum();
        let entropy = if total == 0 {
            0.0
        } else {
            -self
                .buckets
                .iter()
                .map(|b| {
                    let p = f64::from(b.observation_count) / f64::from(total);
                    if p > 0.0 {
                        p * p.log2()
                    } else {
                        0.0
                    }
                })
                .sum::<f64>()
        };
        let max_entropy = f64::from(MAX_BUCKETS).log2();
        let normalized_entropy = if max_entropy > 0.0 {
            (entropy / max_entropy).clamp(0.0, 1.0)
        } else {
            0.0
        };

        (0.6 * coverage + 0.4 * normalized_entropy).clamp(0.0, 1.0)
    }
}

/// `map<PatchId, PatchBuckets>` view-diversity tracker.
#[derive(Clone, Debug, Default)]
pub struct ViewDiversity {
    patches: BTreeMap<PatchId, PatchBuckets>,
}

impl ViewDiversity {
    /// Builds an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `angle_deg` into `[0, 360)`, buckets it, and records the
    /// observation for `patch_id`, per §4.9.
    pub fn add_observation(&mut self, patch_id: &PatchId, angle_deg: f64, now_ms: i64, max_buckets_tracked: usize) {
        let normalized = angle_deg.rem_euclid(360.0);
        let bucket_index = (normalized / BUCKET_SIZE_DEG).floor() as u32;
        self.patches
            .entry(patch_id.clone())
            .or_default()
            .add(bucket_index, now_ms, max_buckets_tracked);
    }

    /// Current diversity score for `patch_id`. `1.0` (everything is novel)
    /// if the patch has no recorded observations.
    #[must_use]
    pub fn score(&self, patch_id: &PatchId) -> f64 {
        self.patches.get(patch_id).map_or(1.0, PatchBuckets::score)
    }

    /// Clears all tracked patches for an explicit session reset.
    pub fn reset(&mut self) {
        self.patches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_is_fully_novel() {
        let tracker = ViewDiversity::new();
        assert_eq!(tracker.score(&PatchId::new("p")), 1.0);
    }

    #[test]
    fn single_bucket_has_low_score() {
        let mut tracker = ViewDiversity::new();
        let p = PatchId::new("p");
        for i in 0..5 {
            tracker.add_observation(&p, 10.0, i64::from(i), 24);
        }
        let score = tracker.score(&p);
        assert!(score < 1.0);
        assert!(score > 0.0);
    }

    #[test]
    fn spreading_observations_raises_score() {
        let mut tracker = ViewDiversity::new();
        let narrow = PatchId::new("narrow");
        let wide = PatchId::new("wide");
        for i in 0..8 {
            tracker.add_observation(&narrow, 10.0, i64::from(i), 24);
        }
        for i in 0..8 {
            tracker.add_observation(&wide, f64::from(i) * 45.0, i64::from(i), 24);
        }
        assert!(tracker.score(&wide) > tracker.score(&narrow));
    }

    #[test]
    fn cap_evicts_oldest_bucket() {
        let mut tracker = ViewDiversity::new();
        let p = PatchId::new("p");
        for i in 0..3 {
            tracker.add_observation(&p, f64::from(i) * 15.0, i64::from(i), 2);
        }
        let buckets = tracker.patches.get(&p).expect("entry").buckets.len();
        assert_eq!(buckets, 2);
    }

    #[test]
    fn negative_and_overflowing_angles_wrap() {
        let mut tracker = ViewDiversity::new();
        let p = PatchId::new("p");
        tracker.add_observation(&p, -10.0, 0, 24);
        tracker.add_observation(&p, 370.0, 0, 24);
        // -10 -> 350 (bucket 23); 370 -> 10 (bucket 0): two distinct buckets.
        assert_eq!(tracker.patches.get(&p).expect("entry").buckets.len(), 2);
    }
}
