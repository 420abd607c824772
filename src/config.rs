//! Closed-set engine configuration (`SPEC_FULL.md` §6, §10.4).
//!
//! A plain data struct passed into the engine constructor, the way
//! `warp-core::sandbox::EchoConfig` is -- there is no file/env configuration
//! layer in scope, since the engine is embedded and its host owns
//! configuration. Every field defaults per the spec's table; construction
//! validates cross-field invariants and returns `Err` rather than panicking
//! on a bad value.

use crate::error::ConfigError;

/// Closed-set engine configuration. See `SPEC_FULL.md` §6 for the
/// authoritative default/effect table.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Aggregator decay and `PatchWeightComputer` recency half-life, in
    /// seconds.
    pub confidence_half_life_sec: f64,
    /// Token bucket refill rate, tokens per second.
    pub token_refill_rate_per_sec: f64,
    /// Token bucket capacity.
    pub token_bucket_max_tokens: f64,
    /// Default token cost charged per observation.
    pub token_cost_per_observation: f64,
    /// Display EMA smoothing factor.
    pub patch_display_alpha: f64,
    /// Locked-patch display growth acceleration multiplier.
    pub patch_display_locked_acceleration: f64,
    /// Evidence threshold, combined with `min_observations_for_lock`, above
    /// which a patch entry locks.
    pub lock_threshold: f64,
    /// Minimum observation count, combined with `lock_threshold`, required
    /// to lock a patch entry.
    pub min_observations_for_lock: u32,
    /// Denominator for the aggregator's frequency-cap base weight.
    pub weight_cap_denominator: f64,
    /// Minimum admission-produced quality scale (I5 floor).
    pub minimum_soft_scale: f64,
    /// Gate share of the blend at/below `dynamic_weights_transition_start`.
    pub dynamic_weights_gate_early: f64,
    /// Gate share of the blend at/above `dynamic_weights_transition_end`.
    pub dynamic_weights_gate_late: f64,
    /// Progress value at which the early gate weight still applies.
    pub dynamic_weights_transition_start: f64,
    /// Progress value at which the late gate weight fully applies.
    pub dynamic_weights_transition_end: f64,
    /// View-diversity angle bucket width, in degrees.
    pub diversity_angle_bucket_size_deg: f64,
    /// Maximum number of angle buckets tracked per patch.
    pub diversity_max_buckets_tracked: usize,
    /// Local-display share of the color-evidence hybrid.
    pub color_evidence_local_weight: f64,
    /// Global-display share of the color-evidence hybrid.
    pub color_evidence_global_weight: f64,
    /// Update-density threshold below which spam scaling does not apply.
    pub low_novelty_threshold: f64,
    /// Scale penalty applied once spam scaling kicks in.
    pub low_novelty_penalty: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_half_life_sec: 60.0,
            token_refill_rate_per_sec: 10.0,
            token_bucket_max_tokens: 20.0,
            token_cost_per_observation: 1.0,
            patch_display_alpha: 0.2,
            patch_display_locked_acceleration: 1.5,
            lock_threshold: 0.8,
            min_observations_for_lock: 10,
            weight_cap_denominator: 8.0,
            minimum_soft_scale: 0.25,
            dynamic_weights_gate_early: 0.8,
            dynamic_weights_gate_late: 0.2,
            dynamic_weights_transition_start: 0.3,
            dynamic_weights_transition_end: 0.7,
            diversity_angle_bucket_size_deg: 15.0,
            diversity_max_buckets_tracked: 24,
            color_evidence_local_weight: 0.7,
            color_evidence_global_weight: 0.3,
            low_novelty_threshold: 0.2,
            low_novelty_penalty: 0.5,
        }
    }
}

impl EngineConfig {
    /// Validates cross-field invariants. Called by [`crate::engine::EvidenceEngine::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_range_fields: &[(&str, f64)] = &[
            ("patchDisplayAlpha", self.patch_display_alpha),
            ("lockThreshold", self.lock_threshold),
            ("minimumSoftScale", self.minimum_soft_scale),
            ("dynamicWeightsGateEarly", self.dynamic_weights_gate_early),
            ("dynamicWeightsGateLate", self.dynamic_weights_gate_late),
            (
                "dynamicWeightsTransitionStart",
                self.dynamic_weights_transition_start,
            ),
            (
                "dynamicWeightsTransitionEnd",
                self.dynamic_weights_transition_end,
            ),
            (
                "colorEvidenceLocalWeight",
                self.color_evidence_local_weight,
            ),
            (
                "colorEvidenceGlobalWeight",
                self.color_evidence_global_weight,
            ),
            ("lowNoveltyThreshold", self.low_novelty_threshold),
            ("lowNoveltyPenalty", self.low_novelty_penalty),
        ];
        for (field, value) in unit_range_fields {
            if !(0.0..=1.0).contains(value) {
                return Err(ConfigError::OutOfUnitRange {
                    field,
                    value: *value,
                });
            }
        }

        let positive_fields: &[(&str, f64)] = &[
            ("confidenceHalfLifeSec", self.confidence_half_life_sec),
            ("tokenRefillRatePerSec", self.token_refill_rate_per_sec),
            ("tokenBucketMaxTokens", self.token_bucket_max_tokens),
            ("tokenCostPerObservation", self.token_cost_per_observation),
            (
                "patchDisplayLockedAcceleration",
                self.patch_display_locked_acceleration,
            ),
            ("weightCapDenominator", self.weight_cap_denominator),
            (
                "diversityAngleBucketSizeDeg",
                self.diversity_angle_bucket_size_deg,
            ),
        ];
        for (field, value) in positive_fields {
            if *value <= 0.0 {
                return Err(ConfigError::NotPositive {
                    field,
                    value: *value,
                });
            }
        }

        if self.dynamic_weights_transition_start >= self.dynamic_weights_transition_end {
            return Err(ConfigError::InvertedTransitionWindow {
                start: self.dynamic_weights_transition_start,
                end: self.dynamic_weights_transition_end,
            });
        }

        if self.dynamic_weights_gate_early <= self.dynamic_weights_gate_late {
            return Err(ConfigError::InvertedGateEndpoints {
                early: self.dynamic_weights_gate_early,
                late: self.dynamic_weights_gate_late,
            });
        }

        Ok(())
    }
}
