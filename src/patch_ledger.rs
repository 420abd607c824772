//! Per-ledger-kind patch ledger (C5): evidence, counts, error streak, lock
//! flag, gradual penalty with cooldown and corpse protection.

use std::collections::BTreeMap;

use crate::clamped::ClampedValue;
use crate::ident::{FrameId, PatchId, Verdict};

/// Base penalty magnitude for a single `bad` observation before the streak
/// multiplier, in evidence units.
const BASE_PENALTY_PER_OBSERVATION: f64 = 0.01;
/// Ceiling on accrued penalty per second of wall time, to keep the penalty
/// frame-rate independent.
const MAX_PENALTY_PER_SEC: f64 = 1.0;
/// Assumed capture frame rate used to convert `MAX_PENALTY_PER_SEC` into a
/// per-observation ceiling. The core does not itself measure frame pacing
/// (out of scope, see `SPEC_FULL.md` §1); callers may override via
/// [`PatchLedger::update_with_fps`].
pub const DEFAULT_FPS: f64 = 30.0;
/// No penalty is applied once this many seconds have elapsed since the last
/// `good` observation: a long-neglected patch is not further punished.
const CORPSE_PROTECTION_SEC: f64 = 10.0;
/// Minimum spacing, in seconds, between penalized `bad` observations.
const PENALTY_COOLDOWN_SEC: f64 = 0.5;
/// Streak multiplier ceiling.
const MAX_STREAK_MULTIPLIER: f64 = 3.0;

/// One (ledger-kind, patch) entry.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchEntry {
    /// Current evidence for this patch in this ledger.
    pub evidence: ClampedValue,
    /// Monotonic timestamp of the most recent observation of any verdict.
    pub last_update_ms: i64,
    /// Total observations folded into this entry.
    pub observation_count: u32,
    /// Frame id that produced the current evidence high-water mark.
    pub best_frame_id: Option<FrameId>,
    /// Total `bad` observations ever recorded.
    pub error_count: u32,
    /// Consecutive `bad` observations since the last `good` one.
    pub error_streak: u32,
    /// Monotonic timestamp of the most recent `good` observation.
    pub last_good_update_ms: Option<i64>,
    /// Total `suspect` (and coerced `unknown`) observations.
    pub suspect_count: u32,
    /// Whether this entry has crossed the lock threshold. Monotonic for the
    /// life of the session except on explicit [`PatchLedger::reset`].
    locked: bool,
}

impl PatchEntry {
    fn new(now_ms: i64) -> Self {
        Self {
            evidence: ClampedValue::ZERO,
            last_update_ms: now_ms,
            observation_count: 0,
            best_frame_id: None,
            error_count: 0,
            error_streak: 0,
            last_good_update_ms: None,
            suspect_count: 0,
            locked: false,
        }
    }

    /// `evidence >= lockThreshold && observationCount >= minObservationsForLock`,
    /// latched once true.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn refresh_lock(&mut self, lock_threshold: f64, min_observations_for_lock: u32) {
        if !self.locked
            && self.evidence.get() >= lock_threshold
            && self.observation_count >= min_observations_for_lock
        {
            self.locked = true;
        }
    }
}

/// `map<PatchId, PatchEntry>` for a single ledger kind (gate or soft).
#[derive(Clone, Debug, Default)]
pub struct PatchLedger {
    entries: BTreeMap<PatchId, PatchEntry>,
}

impl PatchLedger {
    /// Builds an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a patch entry by id.
    #[must_use]
    pub fn entry(&self, patch_id: &PatchId) -> Option<&PatchEntry> {
        self.entries.get(patch_id)
    }

    /// Iterates all entries in ascending `PatchId` order (I7).
    pub fn iter(&self) -> impl Iterator<Item = (&PatchId, &PatchEntry)> {
        self.entries.iter()
    }

    /// Number of tracked patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger tracks no patches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies an observation, at the assumed default capture rate
    /// ([`DEFAULT_FPS`]). See [`Self::update_with_fps`] for the full
    /// semantics.
    pub fn update(
        &mut self,
        patch_id: &PatchId,
        ledger_quality: f64,
        verdict: Verdict,
        frame_id: &str,
        now_ms: i64,
        lock_threshold: f64,
        min_observations_for_lock: u32,
    ) {
        self.update_with_fps(
            patch_id,
            ledger_quality,
            verdict,
            frame_id,
            now_ms,
            lock_threshold,
            min_observations_for_lock,
            DEFAULT_FPS,
        );
    }

    /// Applies an observation to `patch_id`'s entry, per `SPEC_FULL.md` §4.5.
    #[allow(clippy::too_many_arguments)]
    pub fn update_with_fps(
        &mut self,
        patch_id: &PatchId,
        ledger_quality: f64,
        verdict: Verdict,
        frame_id: &str,
        now_ms: i64,
        lock_threshold: f64,
        min_observations_for_lock: u32,
        current_fps: f64,
    ) {
        let entry = self
            .entries
            .entry(patch_id.clone())
            .or_insert_with(|| PatchEntry::new(now_ms));

        let quality = ClampedValue::new(ledger_quality).get();

        if entry.locked {
            match verdict {
                Verdict::Good => {
                    if quality > entry.evidence.get() {
                        entry.evidence = ClampedValue::new(quality);
                        entry.best_frame_id = Some(frame_id.to_string());
                    }
                }
                Verdict::Suspect => entry.suspect_count += 1,
                Verdict::Bad => entry.error_count += 1,
                Verdict::Unknown => {
                    crate::diagnostics::warn(
                        crate::diagnostics::Event::UnknownVerdictCoerced,
                        patch_id.as_str(),
                    );
                    entry.suspect_count += 1;
                }
            }
            entry.observation_count += 1;
            entry.last_update_ms = now_ms;
            entry.refresh_lock(lock_threshold, min_observations_for_lock);
            return;
        }

        match verdict {
            Verdict::Good => {
                entry.error_streak = 0;
                entry.last_good_update_ms = Some(now_ms);
                if quality > entry.evidence.get() {
                    entry.evidence = ClampedValue::new(quality);
                    entry.best_frame_id = Some(frame_id.to_string());
                }
            }
            Verdict::Suspect => {
                entry.suspect_count += 1;
            }
            Verdict::Bad => {
                entry.error_streak += 1;
                entry.error_count += 1;
                let penalty = gradual_penalty(
                    entry.last_good_update_ms,
                    now_ms,
                    entry.error_streak,
                    current_fps,
                );
                entry.evidence = ClampedValue::new((entry.evidence.get() - penalty).max(0.0));
            }
            Verdict::Unknown => {
                crate::diagnostics::warn(
                    crate::diagnostics::Event::UnknownVerdictCoerced,
                    patch_id.as_str(),
                );
                entry.suspect_count += 1;
            }
        }

        entry.observation_count += 1;
        entry.last_update_ms = now_ms;
        entry.refresh_lock(lock_threshold, min_observations_for_lock);
    }

    /// Drops `patch_id` from the ledger. Callers are responsible for
    /// recalibrating the aggregator afterwards (§4.5, "Pruning").
    pub fn remove(&mut self, patch_id: &PatchId) {
        self.entries.remove(patch_id);
    }

    /// Clears all entries, including lock state, for an explicit session reset.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// `age`/cooldown/corpse-protection gated penalty (§4.5).
fn gradual_penalty(
    last_good_update_ms: Option<i64>,
    now_ms: i64,
    error_streak: u32,
    current_fps: f64,
) -> f64 {
    let Some(last_good_ms) = last_good_update_ms else {
        return 0.0;
    };
    let age_sec = (now_ms - last_good_ms).max(0) as f64 / 1000.0;
    if age_sec > CORPSE_PROTECTION_SEC {
        return 0.0;
    }
    if age_sec < PENALTY_COOLDOWN_SEC {
        return 0.0;
    }
    let streak_multiplier = (1.0 + 0.2 * f64::from(error_streak)).min(MAX_STREAK_MULTIPLIER);
    let fps = if current_fps > 0.0 {
        current_fps
    } else {
        DEFAULT_FPS
    };
    (BASE_PENALTY_PER_OBSERVATION * streak_multiplier).min(MAX_PENALTY_PER_SEC / fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(id: &str) -> PatchId {
        PatchId::new(id)
    }

    #[test]
    fn scenario_s2_locking_prevents_penalty() {
        let mut ledger = PatchLedger::new();
        let b = patch("B");
        for i in 0..12 {
            ledger.update(&b, 0.95, Verdict::Good, "f", i64::from(i) * 100, 0.8, 10);
        }
        let entry = ledger.entry(&b).expect("entry exists");
        assert!(entry.is_locked());
        assert_eq!(entry.evidence.get(), 0.95);
        assert_eq!(entry.observation_count, 12);

        ledger.update(&b, 0.0, Verdict::Bad, "f", 1_300, 0.8, 10);
        let entry = ledger.entry(&b).expect("entry exists");
        assert_eq!(entry.evidence.get(), 0.95);
        assert_eq!(entry.error_count, 1);
    }

    #[test]
    fn scenario_s3_penalty_cooldown_and_corpse_protection() {
        let mut ledger = PatchLedger::new();
        let c = patch("C");
        ledger.update(&c, 0.9, Verdict::Good, "f", 0, 0.8, 10);
        assert_eq!(ledger.entry(&c).expect("e").evidence.get(), 0.9);

        ledger.update(&c, 0.0, Verdict::Bad, "f", 400, 0.8, 10);
        assert_eq!(ledger.entry(&c).expect("e").evidence.get(), 0.9);

        ledger.update(&c, 0.0, Verdict::Bad, "f", 700, 0.8, 10);
        let entry = ledger.entry(&c).expect("e");
        assert_eq!(entry.error_streak, 2);
        assert!((entry.evidence.get() - (0.9 - 0.014)).abs() < 1e-9);

        let evidence_before = ledger.entry(&c).expect("e").evidence.get();
        ledger.update(&c, 0.0, Verdict::Bad, "f", 11_000, 0.8, 10);
        assert_eq!(ledger.entry(&c).expect("e").evidence.get(), evidence_before);
    }

    #[test]
    fn suspect_does_not_touch_error_streak() {
        let mut ledger = PatchLedger::new();
        let p = patch("P");
        ledger.update(&p, 0.5, Verdict::Good, "f", 0, 0.8, 10);
        ledger.update(&p, 0.0, Verdict::Suspect, "f", 100, 0.8, 10);
        let entry = ledger.entry(&p).expect("e");
        assert_eq!(entry.error_streak, 0);
        assert_eq!(entry.suspect_count, 1);
    }

    #[test]
    fn evidence_never_leaves_unit_range() {
        let mut ledger = PatchLedger::new();
        let p = patch("P");
        for i in 0..50 {
            ledger.update(&p, 1.0, Verdict::Bad, "f", i64::from(i) * 1_000, 0.8, 10);
            assert!((0.0..=1.0).contains(&ledger.entry(&p).expect("e").evidence.get()));
        }
    }
}
