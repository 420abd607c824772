//! Ingest pipeline: the composition of C11–C14 in front of the evidence
//! engine, implementing the observation data-flow of §2 — reorder, then
//! admit, then commit. [`crate::engine::EvidenceEngine::process_observation`]
//! itself stays admission-free so [`crate::engine::EvidenceEngine::replay`]
//! can re-run a log of already-admitted observations directly.

use crate::admission::AdmissionController;
use crate::config::EngineConfig;
use crate::engine::EvidenceEngine;
use crate::ident::{ErrorType, Observation, PatchId, SeqNo, Verdict};
use crate::reorder::ReorderBuffer;
use crate::spam::{apply_novelty_penalty, FrequencyProvider};
use crate::token_bucket::TokenBucketLimiter;

/// Minimum spacing between admitted updates for a single patch, the C12
/// hard block (§4.12, "~33 ms" i.e. one frame at 30 fps).
const MIN_UPDATE_INTERVAL_MS: i64 = 33;
/// Updates allowed per patch per one-second window before the frequency
/// scale starts decaying.
const MAX_UPDATES_PER_WINDOW: u32 = 10;
/// Reorder buffer acceptance window, in milliseconds.
const REORDER_WINDOW_MS: i64 = 120;

/// Raw, pre-admission observation plus the qualities and context an
/// upstream geometric/refinement stage would have already computed.
#[derive(Clone, Debug, PartialEq)]
pub struct RawObservation {
    /// The observation itself.
    pub observation: Observation,
    /// Externally assigned reorder sequence number.
    pub seq: SeqNo,
    /// Gate-ledger quality before any admission scaling.
    pub gate_quality: f64,
    /// Soft-ledger quality before any admission scaling.
    pub soft_quality: f64,
    /// View angle, in degrees, this observation was captured from, for
    /// view-diversity scoring (C9/C10).
    pub angle_deg: f64,
    /// Camera-relative direction components for gate-coverage tracking
    /// (C10), or `None` to skip coverage recording for this observation.
    pub gate_direction: Option<(f64, f64, f64, f64, u64)>,
    /// Dimensional-completeness factor in effect, if any (C16).
    pub dimensional_completeness: Option<f64>,
}

/// Outcome of submitting one [`RawObservation`] through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Buffered by the reorder window; nothing committed yet.
    Buffered,
    /// Denied by the admission controller; nothing committed.
    Denied,
    /// Committed to the engine; carries the resulting snapshot.
    Committed(crate::engine::EvidenceSnapshot),
}

/// Wires the reorder buffer, token bucket, frequency provider, and
/// admission controller in front of an [`EvidenceEngine`] (§2, §4.14).
pub struct IngestPipeline {
    engine: EvidenceEngine,
    reorder: ReorderBuffer<RawObservation>,
    token_bucket: TokenBucketLimiter,
    frequency: FrequencyProvider,
    admission: AdmissionController,
    config: EngineConfig,
}

impl IngestPipeline {
    /// Builds a pipeline around a fresh [`EvidenceEngine`].
    ///
    /// # Errors
    /// Propagates [`crate::error::ConfigError`] from [`EngineConfig::validate`].
    pub fn new(config: EngineConfig, clock: Box<dyn crate::clock::Clock>) -> Result<Self, crate::error::ConfigError> {
        let admission = AdmissionController::new(config.minimum_soft_scale);
        let engine = EvidenceEngine::new(config.clone(), clock)?;
        Ok(Self {
            engine,
            reorder: ReorderBuffer::new(),
            token_bucket: TokenBucketLimiter::new(),
            frequency: FrequencyProvider::new(),
            admission,
            config,
        })
    }

    /// Read-only access to the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &EvidenceEngine {
        &self.engine
    }

    /// Submits a raw observation. Returns one outcome per item the reorder
    /// buffer releases as a result of this call (usually zero or one, more
    /// if this call closes a gap).
    pub fn submit(&mut self, raw: RawObservation, now_ms: i64) -> Vec<SubmitOutcome> {
        let released = self
            .reorder
            .push(raw.seq, raw.observation.timestamp_ms, raw, now_ms, REORDER_WINDOW_MS);

        if released.is_empty() {
            return vec![SubmitOutcome::Buffered];
        }

        released
            .into_iter()
            .map(|(raw, lateness_scale)| self.admit_and_commit(raw, lateness_scale, now_ms))
            .collect()
    }

    fn admit_and_commit(&mut self, raw: RawObservation, lateness_scale: f64, now_ms: i64) -> SubmitOutcome {
        let patch_id = raw.observation.patch_id.clone();

        if let Some((dx, dy, dz, pr3_quality, frame_index)) = raw.gate_direction {
            self.engine.record_gate_coverage(&patch_id, dx, dy, dz, pr3_quality, frame_index);
        }
        self.engine.record_view(&patch_id, raw.angle_deg, now_ms);
        let diversity_score = self.engine.diversity_score(&patch_id);

        let allowed_by_spam = self.frequency.should_allow_update(&patch_id, now_ms, MIN_UPDATE_INTERVAL_MS);

        let allowed_by_token_bucket = self.token_bucket.try_consume(
            &patch_id,
            self.config.token_cost_per_observation,
            now_ms,
            self.config.token_refill_rate_per_sec,
            self.config.token_bucket_max_tokens,
        );
        let frequency_scale = self.frequency.update(&patch_id, now_ms, MAX_UPDATES_PER_WINDOW, self.config.minimum_soft_scale);
        let novelty_scale = apply_novelty_penalty(1.0, diversity_score, self.config.low_novelty_threshold, self.config.low_novelty_penalty);

        let decision = self.admission.decide(allowed_by_spam, allowed_by_token_bucket, frequency_scale, novelty_scale, lateness_scale);
        if !decision.allowed {
            return SubmitOutcome::Denied;
        }

        let snapshot = self.engine.process_observation(
            &raw.observation,
            raw.gate_quality * decision.quality_scale,
            raw.soft_quality * decision.quality_scale,
            raw.observation.verdict,
            raw.dimensional_completeness,
        );
        SubmitOutcome::Committed(snapshot)
    }

    /// Clears all pipeline and engine state for an explicit session reset.
    pub fn reset(&mut self) {
        self.reorder.reset();
        self.token_bucket.reset();
        self.frequency.reset();
        self.engine.reset();
    }
}
