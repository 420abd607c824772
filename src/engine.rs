//! Evidence engine (C19): the actor boundary. Owns every mutable leaf
//! component and is the single writer; readers obtain immutable
//! [`EvidenceSnapshot`]s by value (§4.19, §5).

use crate::aggregator::Aggregator;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::delta::DeltaTracker;
use crate::diagnostics;
use crate::diversity::ViewDiversity;
use crate::display_map::PatchDisplayMap;
use crate::error::SnapshotError;
use crate::gate_coverage::GateCoverageTracker;
use crate::ident::{Observation, PatchId, Verdict};
use crate::patch_ledger::PatchEntry;
use crate::snapshot::{PatchEntrySnapshot, Snapshot, CURRENT_SCHEMA_MAJOR, CURRENT_SCHEMA_MINOR};
use crate::split_ledger::SplitLedger;

/// One entry of a replay log: an observation plus the already-admitted
/// gate/soft qualities and verdict that would have reached
/// [`EvidenceEngine::process_observation`] on first ingestion (§4.18).
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayLogEntry {
    /// The observation being replayed.
    pub observation: Observation,
    /// Admitted gate-ledger quality for this observation.
    pub gate_quality: f64,
    /// Admitted soft-ledger quality for this observation.
    pub soft_quality: f64,
    /// Verdict to apply (mirrors `observation.verdict`; kept explicit to
    /// match the recorded log format).
    pub verdict: Verdict,
    /// Dimensional-completeness factor in effect for this observation, if
    /// any (C16).
    pub dimensional_completeness: Option<f64>,
}

/// Immutable, by-value snapshot of engine-visible derived signals, handed to
/// readers after every [`EvidenceEngine::process_observation`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvidenceSnapshot {
    /// Global monotonic-max gate display.
    pub gate_display: f64,
    /// Global monotonic-max soft display.
    pub soft_display: f64,
    /// Current bucketed-aggregator total evidence (`progress`).
    pub total_evidence: f64,
    /// Current smoothed gate delta.
    pub gate_delta: f64,
    /// Current smoothed soft delta.
    pub soft_delta: f64,
}

/// `PatchWeightComputer` (§4.19 step 6): recency- and diversity-weighted
/// base weight fed to the aggregator. `age_sec` is the gap since the
/// ledger entry's previous touch; diversity and (optional) dimensional
/// completeness further discount an entry seen from too few angles or with
/// too sparse a dimensional score set.
#[must_use]
pub fn patch_weight(
    observation_count: u32,
    age_sec: f64,
    half_life_sec: f64,
    weight_cap_denominator: f64,
    diversity: f64,
    completeness: Option<f64>,
) -> f64 {
    let base = (f64::from(observation_count) / weight_cap_denominator).min(1.0);
    let recency = (-std::f64::consts::LN_2 * age_sec / half_life_sec).exp();
    let diversity_factor = 0.5 + 0.5 * diversity;
    let completeness_factor = completeness.map_or(1.0, |c| 0.5 + 0.5 * c);
    base * recency * diversity_factor * completeness_factor
}

/// The single-writer evidence engine. Construct one per capture session.
pub struct EvidenceEngine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    split_ledger: SplitLedger,
    patch_display: PatchDisplayMap,
    aggregator: Aggregator,
    view_diversity: ViewDiversity,
    gate_coverage: GateCoverageTracker,
    gate_delta: DeltaTracker,
    soft_delta: DeltaTracker,
    gate_display: f64,
    soft_display: f64,
    last_total_display: f64,
}

impl EvidenceEngine {
    /// Builds a fresh engine, validating `config` first.
    ///
    /// # Errors
    /// Propagates [`crate::error::ConfigError`] from [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, clock: Box<dyn Clock>) -> Result<Self, crate::error::ConfigError> {
        config.validate()?;
        let half_life = config.confidence_half_life_sec;
        Ok(Self {
            config,
            clock,
            split_ledger: SplitLedger::new(),
            patch_display: PatchDisplayMap::new(),
            aggregator: Aggregator::new(half_life),
            view_diversity: ViewDiversity::new(),
            gate_coverage: GateCoverageTracker::new(),
            gate_delta: DeltaTracker::new(0.5, 0.1),
            soft_delta: DeltaTracker::new(0.5, 0.1),
            gate_display: 0.0,
            soft_display: 0.0,
            last_total_display: 0.0,
        })
    }

    /// Read-only access to the engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Records a view-diversity observation for `patch_id`, ahead of a
    /// [`Self::process_observation`] call that needs its resulting score.
    pub fn record_view(&mut self, patch_id: &PatchId, angle_deg: f64, now_ms: i64) {
        self.view_diversity
            .add_observation(patch_id, angle_deg, now_ms, self.config.diversity_max_buckets_tracked);
    }

    /// Records a gate-coverage observation for `patch_id`.
    pub fn record_gate_coverage(&mut self, patch_id: &PatchId, dx: f64, dy: f64, dz: f64, pr3_quality: f64, frame_index: u64) {
        self.gate_coverage.record(patch_id, dx, dy, dz, pr3_quality, frame_index);
    }

    /// Current view-diversity score for `patch_id` (`1.0` if unobserved).
    #[must_use]
    pub fn diversity_score(&self, patch_id: &PatchId) -> f64 {
        self.view_diversity.score(patch_id)
    }

    /// Commits one observation, per the 10-step algorithm of §4.19.
    /// `obs.timestamp_ms` MUST be a monotonic reading.
    pub fn process_observation(
        &mut self,
        obs: &Observation,
        gate_quality: f64,
        soft_quality: f64,
        verdict: Verdict,
        dimensional_completeness: Option<f64>,
    ) -> EvidenceSnapshot {
        let mono_ms = obs.timestamp_ms;

        // Step 1.
        self.split_ledger.update(
            &obs.patch_id,
            gate_quality,
            soft_quality,
            verdict,
            &obs.frame_id,
            mono_ms,
            self.config.lock_threshold,
            self.config.min_observations_for_lock,
        );

        let age_sec = self
            .split_ledger
            .gate
            .entry(&obs.patch_id)
            .map_or(0.0, |e| (mono_ms - e.last_update_ms).max(0) as f64 / 1000.0);
        let observation_count = self
            .split_ledger
            .gate
            .entry(&obs.patch_id)
            .map_or(0, |e| e.observation_count);

        // Step 2.
        let progress = self.aggregator.total_evidence();

        // Step 3.
        let patch_evidence = self.split_ledger.blended(
            &obs.patch_id,
            progress,
            self.config.dynamic_weights_gate_early,
            self.config.dynamic_weights_gate_late,
            self.config.dynamic_weights_transition_start,
            self.config.dynamic_weights_transition_end,
        );

        // Step 4.
        let locked = self.split_ledger.is_gate_locked(&obs.patch_id);

        // Step 5.
        self.patch_display.update(
            &obs.patch_id,
            patch_evidence,
            mono_ms,
            locked,
            self.config.patch_display_alpha,
            self.config.patch_display_locked_acceleration,
        );

        // Step 6.
        let diversity = self.view_diversity.score(&obs.patch_id);
        let w = patch_weight(
            observation_count,
            age_sec,
            self.config.confidence_half_life_sec,
            self.config.weight_cap_denominator,
            diversity,
            dimensional_completeness,
        );

        // Step 7.
        self.aggregator.update_patch(&obs.patch_id, patch_evidence, w, mono_ms);
        self.last_total_display = self.aggregator.total_evidence();

        // Step 8.
        let prev_gate = self.gate_display;
        let prev_soft = self.soft_display;

        // Step 9.
        let alpha = self.config.patch_display_alpha;
        self.gate_display = self.gate_display.max(alpha.mul_add(gate_quality, (1.0 - alpha) * self.gate_display));
        self.soft_display = self.soft_display.max(alpha.mul_add(soft_quality, (1.0 - alpha) * self.soft_display));

        // Step 10 (I6: computed from the pre-overwrite values captured above).
        self.gate_delta.update(self.gate_display - prev_gate);
        self.soft_delta.update(self.soft_display - prev_soft);

        self.evidence_snapshot()
    }

    /// Builds the current reader-facing snapshot.
    #[must_use]
    pub fn evidence_snapshot(&self) -> EvidenceSnapshot {
        EvidenceSnapshot {
            gate_display: self.gate_display,
            soft_display: self.soft_display,
            total_evidence: self.aggregator.total_evidence(),
            gate_delta: self.gate_delta.read(),
            soft_delta: self.soft_delta.read(),
        }
    }

    /// Exports the current gate-ledger-backed state as a canonical
    /// snapshot, per §4.18.
    #[must_use]
    pub fn export_state(&self, wall_clock_now_ms: Option<i64>) -> Snapshot {
        let exported_at_ms = wall_clock_now_ms.unwrap_or_else(|| self.clock.wall_clock_now_ms());
        let patches = self
            .split_ledger
            .gate
            .iter()
            .map(|(id, entry)| (id.clone(), to_patch_entry_snapshot(entry)))
            .collect();
        Snapshot {
            exported_at_ms,
            gate_display: self.gate_display,
            soft_display: self.soft_display,
            last_total_display: self.last_total_display,
            patches,
            schema_version: (CURRENT_SCHEMA_MAJOR, CURRENT_SCHEMA_MINOR),
        }
    }

    /// Exports the current state directly to canonical bytes.
    ///
    /// # Errors
    /// Propagates [`SnapshotError::SerializationFailed`].
    pub fn export_state_json(&self, wall_clock_now_ms: Option<i64>) -> Result<Vec<u8>, SnapshotError> {
        self.export_state(wall_clock_now_ms).encode()
    }

    /// Restores global displays from `bytes` and marks the aggregator for
    /// recalibration. Per-patch ledger state is **not** reconstructed from a
    /// flat snapshot (§9, open question 3) — use [`Self::replay`] to rebuild
    /// full state from an observation log instead.
    ///
    /// # Errors
    /// Propagates decode and schema-compatibility errors from
    /// [`Snapshot::decode`].
    pub fn load_state_json(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::decode(bytes)?;
        self.split_ledger.reset();
        self.patch_display.reset();
        self.view_diversity.reset();
        self.gate_coverage.reset();
        self.gate_delta.reset();
        self.soft_delta.reset();
        self.aggregator.reset();
        self.aggregator.mark_recalibration_due();
        self.gate_display = snapshot.gate_display;
        self.soft_display = snapshot.soft_display;
        self.last_total_display = snapshot.last_total_display;
        Ok(())
    }

    /// Clears all engine state for an explicit session reset.
    pub fn reset(&mut self) {
        self.split_ledger.reset();
        self.patch_display.reset();
        self.view_diversity.reset();
        self.gate_coverage.reset();
        self.gate_delta.reset();
        self.soft_delta.reset();
        self.aggregator.reset();
        self.gate_display = 0.0;
        self.soft_display = 0.0;
        self.last_total_display = 0.0;
    }

    /// Creates a fresh engine, optionally seeded from `initial_state_json`,
    /// then replays `log` in order through [`Self::process_observation`].
    /// Returns the final canonical snapshot bytes. Two runs on any platform
    /// with the same inputs produce byte-identical output (P6).
    ///
    /// # Errors
    /// Propagates [`SnapshotError`] from loading `initial_state_json` or
    /// from the final export.
    pub fn replay(
        config: EngineConfig,
        clock: Box<dyn Clock>,
        initial_state_json: Option<&[u8]>,
        log: &[ReplayLogEntry],
    ) -> Result<Vec<u8>, SnapshotError> {
        let mut engine = Self::new(config, clock).map_err(|e| SnapshotError::DeserializationFailed { reason: e.to_string() })?;
        if let Some(bytes) = initial_state_json {
            engine.load_state_json(bytes)?;
        }
        let mut last_ms = None;
        for entry in log {
            engine.process_observation(
                &entry.observation,
                entry.gate_quality,
                entry.soft_quality,
                entry.verdict,
                entry.dimensional_completeness,
            );
            last_ms = Some(entry.observation.timestamp_ms);
        }
        engine.export_state_json(last_ms)
    }
}

fn to_patch_entry_snapshot(entry: &PatchEntry) -> PatchEntrySnapshot {
    PatchEntrySnapshot {
        best_frame_id: entry.best_frame_id.clone(),
        error_count: entry.error_count,
        error_streak: entry.error_streak,
        evidence: entry.evidence.get(),
        last_good_update_ms: entry.last_good_update_ms,
        last_update_ms: entry.last_update_ms,
        observation_count: entry.observation_count,
    }
}

/// Handles a backward monotonic reading by treating `Δt` as `0` and
/// logging a warning, per §5 "Time source discipline". Call sites that
/// accept externally supplied timestamps (rather than reading
/// [`Clock::monotonic_now_ms`] directly) should route through this.
#[must_use]
pub fn clamp_monotonic_delta(now_ms: i64, previous_ms: i64) -> i64 {
    if now_ms < previous_ms {
        diagnostics::warn(diagnostics::Event::BackwardMonotonicTime, &format!("now={now_ms} prev={previous_ms}"));
        0
    } else {
        now_ms - previous_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::ident::ErrorType;

    fn observation(patch: &str, ts: i64, frame: &str, verdict: Verdict) -> Observation {
        Observation {
            patch_id: PatchId::new(patch),
            timestamp_ms: ts,
            frame_id: frame.to_string(),
            verdict,
            error_type: None::<ErrorType>,
        }
    }

    fn engine() -> EvidenceEngine {
        EvidenceEngine::new(EngineConfig::default(), Box::new(FakeClock::new(0))).expect("valid config")
    }

    #[test]
    fn scenario_s1_monotonic_max_smoothing() {
        let mut engine = engine();
        let a = "A";
        let snap1 = engine.process_observation(&observation(a, 1000, "f1", Verdict::Good), 0.5, 0.5, Verdict::Good, None);
        assert!((snap1.gate_display - 0.10).abs() < 1e-9);

        let snap2 = engine.process_observation(&observation(a, 2000, "f2", Verdict::Good), 0.4, 0.4, Verdict::Good, None);
        assert!((snap2.gate_display - 0.18).abs() < 1e-9);

        let snap3 = engine.process_observation(&observation(a, 3000, "f3", Verdict::Good), 0.6, 0.6, Verdict::Good, None);
        assert!((snap3.gate_display - 0.264).abs() < 1e-9);
    }

    #[test]
    fn display_never_decreases_across_a_mixed_sequence() {
        let mut engine = engine();
        let a = PatchId::new("A");
        let mut prev_gate = 0.0;
        let mut prev_soft = 0.0;
        for (i, (q, verdict)) in [
            (0.8, Verdict::Good),
            (0.1, Verdict::Bad),
            (0.9, Verdict::Good),
            (0.2, Verdict::Suspect),
        ]
        .into_iter()
        .enumerate()
        {
            let obs = observation(a.as_str(), i64::try_from(i).expect("small") * 1000, "f", verdict);
            let snap = engine.process_observation(&obs, q, q, verdict, None);
            assert!(snap.gate_display >= prev_gate - 1e-12);
            assert!(snap.soft_display >= prev_soft - 1e-12);
            prev_gate = snap.gate_display;
            prev_soft = snap.soft_display;
        }
    }

    #[test]
    fn export_then_load_restores_global_displays_only() {
        let mut engine = engine();
        let a = observation("A", 0, "f", Verdict::Good);
        engine.process_observation(&a, 0.9, 0.9, Verdict::Good, None);
        let bytes = engine.export_state_json(Some(0)).expect("encode");

        let mut fresh = engine();
        fresh.load_state_json(&bytes).expect("decode");
        assert_eq!(fresh.evidence_snapshot().gate_display, engine.evidence_snapshot().gate_display);
        assert!(fresh.split_ledger.gate.is_empty());
    }

    #[test]
    fn replay_is_deterministic_across_two_runs() {
        let log = vec![
            ReplayLogEntry {
                observation: observation("A", 0, "f1", Verdict::Good),
                gate_quality: 0.5,
                soft_quality: 0.4,
                verdict: Verdict::Good,
                dimensional_completeness: None,
            },
            ReplayLogEntry {
                observation: observation("B", 100, "f2", Verdict::Bad),
                gate_quality: 0.0,
                soft_quality: 0.0,
                verdict: Verdict::Bad,
                dimensional_completeness: None,
            },
        ];

        let run1 = EvidenceEngine::replay(EngineConfig::default(), Box::new(FakeClock::new(0)), None, &log).expect("replay 1");
        let run2 = EvidenceEngine::replay(EngineConfig::default(), Box::new(FakeClock::new(0)), None, &log).expect("replay 2");
        assert_eq!(run1, run2);
    }
}
