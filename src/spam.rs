//! Spam/frequency provider (C12): per-patch update-density scale factor,
//! plus the hard minimum-interval check invoked by the admission controller.

use std::collections::BTreeMap;

use crate::ident::PatchId;

/// Window length over which `recentUpdateCount` is measured.
const WINDOW_MS: i64 = 1_000;
/// How much scale is shed per observation over the per-window cap.
const EXCESS_PENALTY_PER_OBSERVATION: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
struct SpamState {
    last_update_ms: i64,
    recent_update_count: u32,
    last_reset_ms: i64,
}

/// `map<PatchId, SpamState>` frequency provider, per §4.12.
#[derive(Clone, Debug, Default)]
pub struct FrequencyProvider {
    states: BTreeMap<PatchId, SpamState>,
}

impl FrequencyProvider {
    /// Builds an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The only hard block in the admission path: whether at least
    /// `min_interval_ms` has elapsed since `patch_id`'s last recorded
    /// update. Does not mutate state; callers still must call
    /// [`Self::update`] to record the observation.
    #[must_use]
    pub fn should_allow_update(&self, patch_id: &PatchId, now_ms: i64, min_interval_ms: i64) -> bool {
        self.states
            .get(patch_id)
            .is_none_or(|s| now_ms - s.last_update_ms >= min_interval_ms)
    }

    /// Resets the 1-second window if elapsed, increments the count, and
    /// returns the frequency scale: `1.0` at or under `max_per_window`,
    /// linearly decreasing to `floor` as the excess grows.
    pub fn update(&mut self, patch_id: &PatchId, now_ms: i64, max_per_window: u32, floor: f64) -> f64 {
        let state = self.states.entry(patch_id.clone()).or_insert(SpamState {
            last_update_ms: now_ms,
            recent_update_count: 0,
            last_reset_ms: now_ms,
        });

        if now_ms - state.last_reset_ms >= WINDOW_MS {
            state.recent_update_count = 0;
            state.last_reset_ms = now_ms;
        }
        state.recent_update_count += 1;
        state.last_update_ms = now_ms;

        if state.recent_update_count <= max_per_window {
            1.0
        } else {
            let excess = f64::from(state.recent_update_count - max_per_window);
            (1.0 - EXCESS_PENALTY_PER_OBSERVATION * excess).max(floor)
        }
    }

    /// Clears all tracked patches for an explicit session reset.
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

/// Applies the low-novelty penalty to an already-computed frequency `scale`:
/// patches seen from too few distinct angles are further discounted.
#[must_use]
pub fn apply_novelty_penalty(scale: f64, diversity_score: f64, low_novelty_threshold: f64, low_novelty_penalty: f64) -> f64 {
    if diversity_score < low_novelty_threshold {
        scale * low_novelty_penalty
    } else {
        scale
    }
}
