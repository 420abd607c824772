//! Patch display map (C7): per-patch monotonic display with EMA smoothing
//! and locked-acceleration (I1).

use std::collections::BTreeMap;

use crate::ident::PatchId;

/// One patch's display state. `display` never decreases for the life of the
/// map (I1); enforced entirely by [`PatchDisplayMap::update`], the only
/// mutator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayEntry {
    /// Monotonic, UI-facing display value.
    pub display: f64,
    /// Smoothed EMA feeding `display`'s next target.
    pub ema: f64,
    /// Number of updates folded into this entry.
    pub observation_count: u32,
    /// Monotonic timestamp of the most recent update.
    pub last_update_ms: i64,
}

/// `map<PatchId, DisplayEntry>`, monotonic per I1.
#[derive(Clone, Debug, Default)]
pub struct PatchDisplayMap {
    entries: BTreeMap<PatchId, DisplayEntry>,
}

impl PatchDisplayMap {
    /// Builds an empty display map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a patch's display entry.
    #[must_use]
    pub fn entry(&self, patch_id: &PatchId) -> Option<&DisplayEntry> {
        self.entries.get(patch_id)
    }

    /// Iterates all entries in ascending `PatchId` order.
    pub fn iter(&self) -> impl Iterator<Item = (&PatchId, &DisplayEntry)> {
        self.entries.iter()
    }

    /// Applies `target` (clamped into `[0, 1]`) to `patch_id`'s display,
    /// per §4.7. When `locked`, the EMA-produced growth delta is multiplied
    /// by `locked_acceleration` before being floored by the previous value.
    pub fn update(
        &mut self,
        patch_id: &PatchId,
        target: f64,
        now_ms: i64,
        locked: bool,
        alpha: f64,
        locked_acceleration: f64,
    ) -> DisplayEntry {
        let target = target.clamp(0.0, 1.0);
        let prev = self.entries.get(patch_id).copied().unwrap_or(DisplayEntry {
            display: 0.0,
            ema: 0.0,
            observation_count: 0,
            last_update_ms: now_ms,
        });

        let new_ema = alpha.mul_add(target, (1.0 - alpha) * prev.ema);
        let base_next = new_ema;

        let next_display = if locked {
            let growth = base_next - prev.display;
            (prev.display + growth * locked_acceleration).clamp(prev.display, 1.0)
        } else {
            base_next.clamp(prev.display, 1.0)
        };

        let next = DisplayEntry {
            display: next_display,
            ema: new_ema,
            observation_count: prev.observation_count + 1,
            last_update_ms: now_ms,
        };
        self.entries.insert(patch_id.clone(), next);
        next
    }

    /// Clears all entries for an explicit session reset.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Color-evidence hybrid for downstream rendering (§4.7): a weighted blend
/// of a patch's local display and the session's global display.
#[must_use]
pub fn color_evidence(local_display: f64, global_display: f64, local_weight: f64, global_weight: f64) -> f64 {
    (local_weight * local_display + global_weight * global_display).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_never_decreases() {
        let mut map = PatchDisplayMap::new();
        let p = PatchId::new("A");
        let mut prev = 0.0;
        for (i, target) in [0.5, 0.1, 0.9, 0.2, 0.95].into_iter().enumerate() {
            let entry = map.update(&p, target, i64::try_from(i).expect("small"), false, 0.2, 1.5);
            assert!(entry.display >= prev - 1e-12);
            prev = entry.display;
        }
    }

    #[test]
    fn locked_acceleration_still_floors_at_previous_display() {
        let mut map = PatchDisplayMap::new();
        let p = PatchId::new("A");
        map.update(&p, 0.5, 0, false, 0.2, 1.5);
        let before = map.entry(&p).expect("entry").display;
        let after = map.update(&p, 0.0, 1, true, 0.2, 1.5);
        assert!(after.display >= before);
    }

    #[test]
    fn color_evidence_blends_local_and_global() {
        assert!((color_evidence(1.0, 0.0, 0.7, 0.3) - 0.7).abs() < 1e-12);
    }
}
