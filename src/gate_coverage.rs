//! Gate coverage tracker (C10): bitset-based θ/φ span and L2+/L3 counts for
//! the geometric coverage gate, bucketed with a zero-trigonometric
//! octant/ratio lookup instead of `atan2`/`asin`.

use std::collections::{BTreeMap, BTreeSet};

use crate::ident::PatchId;

/// Number of θ buckets (azimuth, 360° / 15°).
pub const THETA_BUCKETS: u32 = 24;
/// Number of φ buckets (elevation, 180° / 15°).
pub const PHI_BUCKETS: u32 = 12;
/// Bucket width in degrees for both axes.
pub const BUCKET_SIZE_DEG: f64 = 15.0;
/// Maximum records retained per patch before oldest-by-`frameIndex` eviction.
pub const RECORD_CAP: usize = 200;

const TAN_15: f64 = 0.267_949_192_431_122_7;
const TAN_30: f64 = 0.577_350_269_189_625_8;

/// Splits a 45° octant into 3 sub-buckets of 15° by the ratio of the
/// smaller to the larger leg, without evaluating any trig function.
fn sub_bucket_forward(ratio: f64) -> u32 {
    if ratio < TAN_15 {
        0
    } else if ratio < TAN_30 {
        1
    } else {
        2
    }
}

/// Bucketizes a direction's azimuthal component `(dx, dz)` into one of 24
/// 15° buckets around the full circle, using sign tests and a single ratio
/// comparison per octant rather than `atan2`.
#[must_use]
pub fn theta_bucket(dx: f64, dz: f64) -> u32 {
    let (ax, az) = (dx.abs(), dz.abs());
    let larger = ax.max(az);
    let ratio = if larger > 0.0 { ax.min(az) / larger } else { 0.0 };

    let octant = match (dx >= 0.0, dz >= 0.0, ax >= az) {
        (true, true, true) => 0,
        (true, true, false) => 1,
        (false, true, false) => 2,
        (false, true, true) => 3,
        (false, false, true) => 4,
        (false, false, false) => 5,
        (true, false, false) => 6,
        (true, false, true) => 7,
    };

    let forward = sub_bucket_forward(ratio);
    let sub = if octant % 2 == 0 { forward } else { 2 - forward };
    octant * 3 + sub
}

/// Bucketizes a direction's elevation component `(dy, horizontal magnitude)`
/// into one of 12 15° buckets spanning `[-90°, 90°)`, with bucket 6 centered
/// at the horizon.
#[must_use]
pub fn phi_bucket(dy: f64, horiz: f64) -> u32 {
    let horiz = horiz.abs();
    if horiz == 0.0 {
        return if dy >= 0.0 { 11 } else { 0 };
    }

    let half_bucket = |far: f64, near: f64| -> u32 {
        let larger = far.max(near);
        let ratio = if larger > 0.0 { far.min(near) / larger } else { 0.0 };
        if far >= near {
            sub_bucket_forward(ratio)
        } else {
            3 + (2 - sub_bucket_forward(ratio))
        }
    };

    if dy >= 0.0 {
        6 + half_bucket(horiz, dy)
    } else {
        5 - half_bucket(horiz, -dy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Record {
    frame_index: u64,
    theta: u32,
    phi: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PairCount {
    l2_plus: bool,
    l3: bool,
}

#[derive(Clone, Debug, Default)]
struct PatchCoverage {
    theta_bits: u32,
    phi_bits: u16,
    records: Vec<Record>,
    counted_pairs: BTreeMap<(u32, u32), PairCount>,
    l2_plus_count: u32,
    l3_count: u32,
}

impl PatchCoverage {
    fn record(&mut self, theta: u32, phi: u32, pr3_quality: f64, frame_index: u64) {
        self.theta_bits |= 1 << theta;
        self.phi_bits |= 1 << phi;
        self.records.push(Record { frame_index, theta, phi });

        self.counted_pairs.entry((theta, phi)).or_insert_with(|| {
            let l2_plus = pr3_quality >= 0.3;
            let l3 = pr3_quality >= 0.6;
            if l2_plus {
                self.l2_plus_count += 1;
            }
            if l3 {
                self.l3_count += 1;
            }
            PairCount { l2_plus, l3 }
        });

        if self.records.len() > RECORD_CAP {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let Some(pos) = self
            .records
            .iter()
            .enumerate()
            .min_by_key(|(_, r)| r.frame_index)
            .map(|(i, _)| i)
        else {
            return;
        };
        let evicted = self.records.remove(pos);

        if !self.records.iter().any(|r| r.theta == evicted.theta) {
            self.theta_bits &= !(1 << evicted.theta);
        }
        if !self.records.iter().any(|r| r.phi == evicted.phi) {
            self.phi_bits &= !(1 << evicted.phi);
        }
        if !self
            .records
            .iter()
            .any(|r| r.theta == evicted.theta && r.phi == evicted.phi)
        {
            if let Some(count) = self.counted_pairs.remove(&(evicted.theta, evicted.phi)) {
                if count.l2_plus {
                    self.l2_plus_count = self.l2_plus_count.saturating_sub(1);
                }
                if count.l3 {
                    self.l3_count = self.l3_count.saturating_sub(1);
                }
            }
        }
    }

    fn theta_span_deg(&self) -> f64 {
        circular_span(self.theta_bits, THETA_BUCKETS)
    }

    fn phi_span_deg(&self) -> f64 {
        linear_span(u32::from(self.phi_bits), PHI_BUCKETS)
    }
}

fn circular_span(bits: u32, total_buckets: u32) -> f64 {
    let set: Vec<u32> = (0..total_buckets).filter(|i| bits & (1 << i) != 0).collect();
    if set.is_empty() {
        return 0.0;
    }
    if set.len() == total_buckets as usize {
        return f64::from(total_buckets) * BUCKET_SIZE_DEG;
    }
    let mut max_gap = 0u32;
    for w in 0..set.len() {
        let cur = set[w];
        let next = set[(w + 1) % set.len()];
        let gap = if next > cur {
            next - cur - 1
        } else {
            total_buckets - cur - 1 + next
        };
        max_gap = max_gap.max(gap);
    }
    f64::from(total_buckets - max_gap) * BUCKET_SIZE_DEG
}

fn linear_span(bits: u32, total_buckets: u32) -> f64 {
    let set: Vec<u32> = (0..total_buckets).filter(|i| bits & (1 << i) != 0).collect();
    match (set.first(), set.last()) {
        (Some(min), Some(max)) => f64::from(max - min + 1) * BUCKET_SIZE_DEG,
        _ => 0.0,
    }
}

/// Read-only result of a coverage query for one patch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverageSpan {
    /// Shortest circular arc (degrees) of azimuth covered by set θ buckets.
    pub theta_span_deg: f64,
    /// Linear span (degrees) of elevation covered by set φ buckets.
    pub phi_span_deg: f64,
    /// Distinct (θ,φ) pairs observed with `pr3Quality ≥ 0.3`.
    pub l2_plus_count: u32,
    /// Distinct (θ,φ) pairs observed with `pr3Quality ≥ 0.6`.
    pub l3_count: u32,
}

/// `map<PatchId, PatchCoverage>` gate coverage tracker.
#[derive(Clone, Debug, Default)]
pub struct GateCoverageTracker {
    patches: BTreeMap<PatchId, PatchCoverage>,
}

impl GateCoverageTracker {
    /// Builds an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one observation's direction `(dx, dy, dz)` (need not be
    /// normalized) and `pr3_quality` for `patch_id` at `frame_index`.
    pub fn record(&mut self, patch_id: &PatchId, dx: f64, dy: f64, dz: f64, pr3_quality: f64, frame_index: u64) {
        let theta = theta_bucket(dx, dz);
        let horiz = dx.hypot(dz);
        let phi = phi_bucket(dy, horiz);
        self.patches
            .entry(patch_id.clone())
            .or_default()
            .record(theta, phi, pr3_quality, frame_index);
    }

    /// Returns the current coverage span for `patch_id`, or all-zero if
    /// unobserved.
    #[must_use]
    pub fn span(&self, patch_id: &PatchId) -> CoverageSpan {
        self.patches.get(patch_id).map_or(
            CoverageSpan {
                theta_span_deg: 0.0,
                phi_span_deg: 0.0,
                l2_plus_count: 0,
                l3_count: 0,
            },
            |p| CoverageSpan {
                theta_span_deg: p.theta_span_deg(),
                phi_span_deg: p.phi_span_deg(),
                l2_plus_count: p.l2_plus_count,
                l3_count: p.l3_count,
            },
        )
    }

    /// Clears all tracked patches for an explicit session reset.
    pub fn reset(&mut self) {
        self.patches.clear();
    }
}

/// Test-only introspection helper: the set of distinct (θ,φ) pairs a patch
/// has accumulated, for verifying eviction behavior.
#[cfg(test)]
fn pairs_of(tracker: &GateCoverageTracker, patch_id: &PatchId) -> BTreeSet<(u32, u32)> {
    tracker
        .patches
        .get(patch_id)
        .map(|p| p.counted_pairs.keys().copied().collect())
        .unwrap_or_default()
}
