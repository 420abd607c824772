//! Per-patch token bucket limiter (C11): deterministic refill, non-blocking
//! `try_consume`.

use std::collections::BTreeMap;

use crate::ident::PatchId;

#[derive(Clone, Copy, Debug, PartialEq)]
struct BucketState {
    tokens: f64,
    last_refill_ms: i64,
}

/// `map<PatchId, BucketState>` token bucket limiter, per §4.11.
#[derive(Clone, Debug, Default)]
pub struct TokenBucketLimiter {
    buckets: BTreeMap<PatchId, BucketState>,
}

impl TokenBucketLimiter {
    /// Builds an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refills `patch_id`'s bucket for elapsed time, then attempts to
    /// consume `cost` tokens. Returns `true` and deducts tokens on success;
    /// returns `false` and leaves the bucket untouched on denial. Never
    /// blocks.
    pub fn try_consume(
        &mut self,
        patch_id: &PatchId,
        cost: f64,
        now_ms: i64,
        refill_rate_per_sec: f64,
        max_tokens: f64,
    ) -> bool {
        let state = self.buckets.entry(patch_id.clone()).or_insert(BucketState {
            tokens: max_tokens,
            last_refill_ms: now_ms,
        });

        if now_ms < state.last_refill_ms {
            crate::diagnostics::warn(crate::diagnostics::Event::BackwardMonotonicTime, patch_id.as_str());
            state.last_refill_ms = now_ms;
        } else {
            let elapsed_sec = (now_ms - state.last_refill_ms) as f64 / 1000.0;
            state.tokens = (state.tokens + refill_rate_per_sec * elapsed_sec).min(max_tokens);
            state.last_refill_ms = now_ms;
        }

        if state.tokens >= cost {
            state.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Clears all bucket state for an explicit session reset.
    pub fn reset(&mut self) {
        self.buckets.clear();
    }
}
