//! Admission controller (C14): the single authoritative "may this
//! observation contribute?" gate. No other component hard-blocks (I4).

/// Why an observation was blocked or had its quality scale floored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionReason {
    /// The minimum inter-update interval (C12 hard block) was not met.
    SpamHardBlock,
    /// The per-patch token bucket (C11) denied this observation.
    TokenBucketDenied,
    /// `frequencyScale · noveltyScale · latenessScale` fell below the
    /// configured floor and was raised to it.
    FloorApplied,
}

/// Outcome of an admission decision.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionDecision {
    /// Whether the observation may contribute at all.
    pub allowed: bool,
    /// Quality scale in `[floor, 1]` if allowed, else `0.0` (P10).
    pub quality_scale: f64,
    /// Reasons contributing to this decision, for diagnostics.
    pub reasons: Vec<AdmissionReason>,
}

/// Combines C11/C12/C13 outputs into the one authoritative gate, per §4.14.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdmissionController {
    minimum_soft_scale: f64,
}

impl AdmissionController {
    /// Builds a controller with the configured throughput floor (I5).
    #[must_use]
    pub fn new(minimum_soft_scale: f64) -> Self {
        Self { minimum_soft_scale }
    }

    /// Decides whether an observation may contribute. `allowed_by_spam` is
    /// the result of the C12 hard-block check; `allowed_by_token_bucket` is
    /// the result of a C11 `try_consume` call. `frequency_scale`,
    /// `novelty_scale`, and `lateness_scale` are each in `[0, 1]`.
    #[must_use]
    pub fn decide(
        &self,
        allowed_by_spam: bool,
        allowed_by_token_bucket: bool,
        frequency_scale: f64,
        novelty_scale: f64,
        lateness_scale: f64,
    ) -> AdmissionDecision {
        if !allowed_by_spam {
            return AdmissionDecision {
                allowed: false,
                quality_scale: 0.0,
                reasons: vec![AdmissionReason::SpamHardBlock],
            };
        }
        if !allowed_by_token_bucket {
            return AdmissionDecision {
                allowed: false,
                quality_scale: 0.0,
                reasons: vec![AdmissionReason::TokenBucketDenied],
            };
        }

        let raw = frequency_scale * novelty_scale * lateness_scale;
        let scale = raw.max(self.minimum_soft_scale);
        let mut reasons = Vec::new();
        if scale > raw {
            reasons.push(AdmissionReason::FloorApplied);
        }
        AdmissionDecision {
            allowed: true,
            quality_scale: scale,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spam_block_takes_priority() {
        let controller = AdmissionController::new(0.25);
        let decision = controller.decide(false, true, 1.0, 1.0, 1.0);
        assert!(!decision.allowed);
        assert_eq!(decision.quality_scale, 0.0);
        assert_eq!(decision.reasons, vec![AdmissionReason::SpamHardBlock]);
    }

    #[test]
    fn token_bucket_denial_blocks() {
        let controller = AdmissionController::new(0.25);
        let decision = controller.decide(true, false, 1.0, 1.0, 1.0);
        assert!(!decision.allowed);
        assert_eq!(decision.reasons, vec![AdmissionReason::TokenBucketDenied]);
    }

    #[test]
    fn floor_applies_when_product_is_low() {
        let controller = AdmissionController::new(0.25);
        let decision = controller.decide(true, true, 0.1, 0.1, 0.1);
        assert!(decision.allowed);
        assert_eq!(decision.quality_scale, 0.25);
        assert_eq!(decision.reasons, vec![AdmissionReason::FloorApplied]);
    }

    #[test]
    fn full_scale_passes_through_unfloored() {
        let controller = AdmissionController::new(0.25);
        let decision = controller.decide(true, true, 1.0, 1.0, 1.0);
        assert!(decision.allowed);
        assert_eq!(decision.quality_scale, 1.0);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn property_p10_scale_is_zero_or_at_least_floor() {
        for allowed_spam in [true, false] {
            for allowed_tb in [true, false] {
                let controller = AdmissionController::new(0.25);
                let decision = controller.decide(allowed_spam, allowed_tb, 0.0, 0.0, 0.0);
                assert!(decision.quality_scale == 0.0 || decision.quality_scale >= 0.25);
            }
        }
    }
}
