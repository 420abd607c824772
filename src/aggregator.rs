//! Bucketed amortized aggregator (C8): an O(k) time-decayed weighted mean of
//! blended evidence across all patches, with periodic recalibration to
//! correct incremental floating-point drift.

use std::collections::BTreeMap;

use crate::ident::PatchId;

/// Bucket duration, in milliseconds (15 s).
pub const BUCKET_DURATION_MS: i64 = 15_000;
/// Maximum number of buckets retained (covers 120 s).
pub const MAX_BUCKETS: usize = 8;
/// Recalibration is marked due after this many `update_patch` calls.
const RECALIBRATION_FRAME_INTERVAL: u32 = 60;

/// One 15-second window of weighted evidence.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Bucket {
    weighted_sum: f64,
    total_weight: f64,
    patch_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct IndexEntry {
    bucket_index: usize,
    evidence: f64,
    weight: f64,
}

/// The bucketed aggregator. `buckets[0]` is always the most recent window.
#[derive(Clone, Debug)]
pub struct Aggregator {
    buckets: Vec<Bucket>,
    bucket_start_ms: Option<i64>,
    index: BTreeMap<PatchId, IndexEntry>,
    frame_count: u32,
    recalibration_due: bool,
    half_life_sec: f64,
}

impl Aggregator {
    /// Builds an empty aggregator with the given decay half-life.
    #[must_use]
    pub fn new(half_life_sec: f64) -> Self {
        Self {
            buckets: Vec::new(),
            bucket_start_ms: None,
            index: BTreeMap::new(),
            frame_count: 0,
            recalibration_due: false,
            half_life_sec,
        }
    }

    fn decay_weight(&self, bucket_index: usize) -> f64 {
        let age_sec = (bucket_index as f64) * (BUCKET_DURATION_MS as f64 / 1000.0);
        (-std::f64::consts::LN_2 * age_sec / self.half_life_sec).exp()
    }

    fn rotate_if_needed(&mut self, now_ms: i64) {
        match self.bucket_start_ms {
            None => {
                self.buckets.push(Bucket::default());
                self.bucket_start_ms = Some(now_ms);
            }
            Some(start) => {
                let elapsed = now_ms.saturating_sub(start).max(0);
                if elapsed >= BUCKET_DURATION_MS {
                    let shift = ((elapsed / BUCKET_DURATION_MS) as usize).min(MAX_BUCKETS);
                    for _ in 0..shift {
                        self.buckets.insert(0, Bucket::default());
                    }
                    self.buckets.truncate(MAX_BUCKETS);
                    for entry in self.index.values_mut() {
                        entry.bucket_index += shift;
                    }
                    self.index.retain(|_, e| e.bucket_index < MAX_BUCKETS);
                    self.bucket_start_ms = Some(start + (shift as i64) * BUCKET_DURATION_MS);
                }
            }
        }
    }

    /// Updates `patch_id`'s contribution in the current bucket, per §4.8.
    /// `base_weight` is the caller's frequency-cap weight only; decay is
    /// applied entirely by [`Self::total_evidence`].
    pub fn update_patch(&mut self, patch_id: &PatchId, evidence: f64, base_weight: f64, now_ms: i64) {
        self.rotate_if_needed(now_ms);

        if let Some(old) = self.index.get(patch_id).copied() {
            if let Some(bucket) = self.buckets.get_mut(old.bucket_index) {
                bucket.weighted_sum -= old.evidence * old.weight;
                bucket.total_weight -= old.weight;
                bucket.patch_count = bucket.patch_count.saturating_sub(1);
            }
        }

        if let Some(bucket) = self.buckets.first_mut() {
            bucket.weighted_sum += evidence * base_weight;
            bucket.total_weight += base_weight;
            bucket.patch_count += 1;
        }

        self.index.insert(
            patch_id.clone(),
            IndexEntry {
                bucket_index: 0,
                evidence,
                weight: base_weight,
            },
        );

        self.frame_count += 1;
        if self.frame_count >= RECALIBRATION_FRAME_INTERVAL {
            self.recalibration_due = true;
        }
    }

    /// Time-decayed weighted mean of blended evidence across all patches.
    /// `O(8)`. Returns `0.0` if total decayed weight is `0.0`.
    #[must_use]
    pub fn total_evidence(&self) -> f64 {
        let mut weighted = 0.0;
        let mut weight = 0.0;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let decay = self.decay_weight(i);
            weighted += bucket.weighted_sum * decay;
            weight += bucket.total_weight * decay;
        }
        if weight == 0.0 {
            0.0
        } else {
            weighted / weight
        }
    }

    /// Whether 60 updates have accrued since the last recalibration.
    #[must_use]
    pub fn recalibration_due(&self) -> bool {
        self.recalibration_due
    }

    /// Flags recalibration as due without touching bucket state, for
    /// callers (e.g. snapshot load) that know the patch index is stale but
    /// have no patches on hand to re-bin immediately.
    pub fn mark_recalibration_due(&mut self) {
        self.recalibration_due = true;
    }

    /// Re-bins every patch by its age from `now_ms`, clearing incremental
    /// floating-point drift (§4.8, P7). `entries` yields
    /// `(patch_id, evidence, base_weight, last_update_ms)`.
    pub fn recalibrate(
        &mut self,
        entries: impl Iterator<Item = (PatchId, f64, f64, i64)>,
        now_ms: i64,
    ) {
        self.buckets = vec![Bucket::default(); MAX_BUCKETS];
        self.bucket_start_ms = Some(now_ms);
        self.index.clear();

        for (patch_id, evidence, weight, last_update_ms) in entries {
            let age_sec = (now_ms - last_update_ms).max(0) as f64 / 1000.0;
            let bucket_index = ((age_sec / (BUCKET_DURATION_MS as f64 / 1000.0)) as usize).min(MAX_BUCKETS - 1);
            if let Some(bucket) = self.buckets.get_mut(bucket_index) {
                bucket.weighted_sum += evidence * weight;
                bucket.total_weight += weight;
                bucket.patch_count += 1;
            }
            self.index.insert(
                patch_id,
                IndexEntry {
                    bucket_index,
                    evidence,
                    weight,
                },
            );
        }

        self.frame_count = 0;
        self.recalibration_due = false;
    }

    /// Clears all state for an explicit session reset.
    pub fn reset(&mut self) {
        self.buckets.clear();
        self.bucket_start_ms = None;
        self.index.clear();
        self.frame_count = 0;
        self.recalibration_due = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s4_decay_table_single_patch_stays_at_one() {
        let mut agg = Aggregator::new(60.0);
        let p = PatchId::new("p1");
        agg.update_patch(&p, 1.0, 1.0, 0);
        assert!((agg.total_evidence() - 1.0).abs() < 1e-9);

        // Advance 15s with no updates: force a rotation via a no-op update
        // on the same patch re-asserting its bucket-0 weight at t=15000,
        // then re-check after the shift has happened on the *next* tick.
        agg.update_patch(&p, 1.0, 1.0, 15_000);
        assert!((agg.total_evidence() - 1.0).abs() < 1e-9);

        agg.update_patch(&p, 1.0, 1.0, 120_000);
        assert!((agg.total_evidence() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_s4_second_patch_changes_aggregate() {
        let mut agg = Aggregator::new(60.0);
        let p1 = PatchId::new("p1");
        let p2 = PatchId::new("p2");
        agg.update_patch(&p1, 1.0, 1.0, 0);
        agg.update_patch(&p1, 1.0, 1.0, 120_000);
        agg.update_patch(&p2, 0.0, 1.0, 120_000);
        // p1 sits at bucket 7 (decay 0.30), p2 fresh in bucket 0 (decay 1.00).
        let expected = (1.0 * 0.30_f64 + 0.0 * 1.00_f64) / (1.0 * 0.30_f64 + 1.0 * 1.00_f64);
        assert!((agg.total_evidence() - expected).abs() < 0.01);
    }

    #[test]
    fn empty_aggregator_returns_zero() {
        let agg = Aggregator::new(60.0);
        assert_eq!(agg.total_evidence(), 0.0);
    }

    #[test]
    fn recalibrate_matches_incremental_within_epsilon() {
        let mut agg = Aggregator::new(60.0);
        let patches: Vec<_> = (0..10)
            .map(|i| (PatchId::new(format!("p{i}")), 0.5, 1.0, i64::from(i) * 1_000))
            .collect();
        for (id, ev, w, t) in &patches {
            agg.update_patch(id, *ev, *w, *t);
        }
        let incremental = agg.total_evidence();
        agg.recalibrate(patches.into_iter(), 9_000);
        let recalibrated = agg.total_evidence();
        assert!((incremental - recalibrated).abs() < 1e-9);
    }
}
