//! Split ledger (C6): the (gate, soft) ledger pair and the dynamic blending
//! weights between them.

use crate::ident::{PatchId, Verdict};
use crate::patch_ledger::PatchLedger;

/// Gate-share weight and its soft complement, always summing to 1 (P8).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendWeights {
    /// Share of blended evidence drawn from the gate ledger.
    pub gate: f64,
    /// Share of blended evidence drawn from the soft ledger. `1 - gate`.
    pub soft: f64,
}

/// Computes the dynamic gate/soft blend for the given aggregate `progress`,
/// per §4.6. Gate weight is non-increasing in `progress`; soft is
/// non-decreasing (P8).
#[must_use]
pub fn dynamic_weights(
    progress: f64,
    early_gate: f64,
    late_gate: f64,
    transition_start: f64,
    transition_end: f64,
) -> BlendWeights {
    let gate = if progress <= transition_start {
        early_gate
    } else if progress >= transition_end {
        late_gate
    } else {
        let span = transition_end - transition_start;
        let t = if span > 0.0 {
            (progress - transition_start) / span
        } else {
            1.0
        };
        let smoothstep = t * t * (3.0 - 2.0 * t);
        early_gate + (late_gate - early_gate) * smoothstep
    };
    let gate = gate.clamp(0.0, 1.0);
    BlendWeights {
        gate,
        soft: (1.0 - gate).clamp(0.0, 1.0),
    }
}

/// A pair of parallel [`PatchLedger`]s: gate (geometric reachability) and
/// soft (refined quality), blended per patch by [`dynamic_weights`].
#[derive(Clone, Debug, Default)]
pub struct SplitLedger {
    /// Geometric-reachability ledger.
    pub gate: PatchLedger,
    /// Refined-quality ledger.
    pub soft: PatchLedger,
}

impl SplitLedger {
    /// Builds an empty split ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an observation to both ledgers with their respective
    /// qualities and the shared verdict.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        patch_id: &PatchId,
        gate_quality: f64,
        soft_quality: f64,
        verdict: Verdict,
        frame_id: &str,
        now_ms: i64,
        lock_threshold: f64,
        min_observations_for_lock: u32,
    ) {
        self.gate.update(
            patch_id,
            gate_quality,
            verdict,
            frame_id,
            now_ms,
            lock_threshold,
            min_observations_for_lock,
        );
        self.soft.update(
            patch_id,
            soft_quality,
            verdict,
            frame_id,
            now_ms,
            lock_threshold,
            min_observations_for_lock,
        );
    }

    /// Blended per-patch evidence at the given aggregate `progress`.
    /// Missing entries contribute `0.0`, matching a patch that has not yet
    /// been observed in that ledger.
    #[must_use]
    pub fn blended(
        &self,
        patch_id: &PatchId,
        progress: f64,
        early_gate: f64,
        late_gate: f64,
        transition_start: f64,
        transition_end: f64,
    ) -> f64 {
        let weights = dynamic_weights(progress, early_gate, late_gate, transition_start, transition_end);
        let gate_evidence = self.gate.entry(patch_id).map_or(0.0, |e| e.evidence.get());
        let soft_evidence = self.soft.entry(patch_id).map_or(0.0, |e| e.evidence.get());
        weights.gate * gate_evidence + weights.soft * soft_evidence
    }

    /// Whether `patch_id` is locked in the gate ledger, the authoritative
    /// lock signal used by the display map (§4.19 step 4).
    #[must_use]
    pub fn is_gate_locked(&self, patch_id: &PatchId) -> bool {
        self.gate
            .entry(patch_id)
            .is_some_and(crate::patch_ledger::PatchEntry::is_locked)
    }

    /// Clears both ledgers for an explicit session reset.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.soft.reset();
    }
}
