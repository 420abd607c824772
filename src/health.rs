//! Health monitor (C17): aggregate health scoring and recovery strategy
//! selection, the system's circuit breaker for runaway behavior.

/// No progress for this many seconds marks a patch as stalled.
const STALL_THRESHOLD_SEC: f64 = 30.0;

/// Inputs to [`health_score`] and [`select_strategy`], gathered from the
/// engine's leaf components at call time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthMetrics {
    /// Fraction of active patches with no update in the last 30 s.
    pub stalled_ratio: f64,
    /// Mean age, in seconds, of active patches' last update.
    pub average_age_sec: f64,
    /// Mean of recent per-frame display deltas.
    pub average_delta: f64,
    /// Fraction of active patches currently locked.
    pub locked_ratio: f64,
}

/// Folds a `(last_update_ms, is_locked)` stream into [`HealthMetrics`].
/// `average_delta` is supplied by the caller since delta tracking lives in
/// the engine's split delta trackers, not here.
pub fn compute_metrics(patches: impl Iterator<Item = (i64, bool)>, average_delta: f64, now_ms: i64) -> HealthMetrics {
    let mut total = 0u32;
    let mut stalled = 0u32;
    let mut locked = 0u32;
    let mut age_sum_sec = 0.0;

    for (last_update_ms, is_locked) in patches {
        total += 1;
        let age_sec = (now_ms - last_update_ms).max(0) as f64 / 1000.0;
        age_sum_sec += age_sec;
        if age_sec > STALL_THRESHOLD_SEC {
            stalled += 1;
        }
        if is_locked {
            locked += 1;
        }
    }

    if total == 0 {
        return HealthMetrics {
            stalled_ratio: 0.0,
            average_age_sec: 0.0,
            average_delta,
            locked_ratio: 0.0,
        };
    }

    HealthMetrics {
        stalled_ratio: f64::from(stalled) / f64::from(total),
        average_age_sec: age_sum_sec / f64::from(total),
        average_delta,
        locked_ratio: f64::from(locked) / f64::from(total),
    }
}

/// `healthScore = max(0, 1 − 0.4·stalledRatio − min(0.2, averageAgeSec/300)
/// − (averageDelta < 0.001 ? 0.2 : 0))`, per §4.17.
#[must_use]
pub fn health_score(metrics: &HealthMetrics) -> f64 {
    let age_penalty = (metrics.average_age_sec / 300.0).min(0.2);
    let stall_penalty = metrics.average_delta < 0.001;
    (1.0 - 0.4 * metrics.stalled_ratio - age_penalty - if stall_penalty { 0.2 } else { 0.0 }).max(0.0)
}

/// The recovery action recommended for the current health state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Load the last safe-point snapshot.
    Rollback,
    /// Stop advancing display; diagnostics-only operation continues.
    FreezeDisplay,
    /// Recommend the user change viewpoint; `boost` when severely stalled.
    SuggestViewChange {
        /// Whether `stalledRatio > 0.5`, warranting a stronger nudge.
        boost: bool,
    },
    /// Clear decay timers that have drifted too far out of date.
    ResetDecayTimers,
    /// Force the bucketed aggregator to recalibrate.
    RecalibrateAggregator,
    /// Surface a non-actionable warning.
    Alert,
    /// No intervention needed.
    None,
}

/// Selects a recovery strategy by first-match priority, per §4.17.
#[must_use]
pub fn select_strategy(metrics: &HealthMetrics, score: f64) -> RecoveryStrategy {
    if score < 0.25 {
        return RecoveryStrategy::Rollback;
    }
    if score < 0.40 {
        return RecoveryStrategy::FreezeDisplay;
    }
    if metrics.stalled_ratio > 0.3 {
        return RecoveryStrategy::SuggestViewChange {
            boost: metrics.stalled_ratio > 0.5,
        };
    }
    if metrics.average_age_sec > 120.0 {
        return RecoveryStrategy::ResetDecayTimers;
    }
    if metrics.average_delta < 0.0001 && metrics.locked_ratio < 0.8 {
        return RecoveryStrategy::RecalibrateAggregator;
    }
    if score < 0.5 {
        return RecoveryStrategy::Alert;
    }
    RecoveryStrategy::None
}

/// Supplies the last-known-good snapshot bytes for [`RecoveryStrategy::Rollback`].
pub trait SafePointManager {
    /// Returns the most recently recorded safe snapshot, if any.
    fn last_safe_snapshot(&self) -> Option<Vec<u8>>;

    /// Records `bytes` as the new safe point.
    fn record_safe_point(&mut self, bytes: Vec<u8>);
}

/// An in-memory [`SafePointManager`] retaining exactly one snapshot.
#[derive(Clone, Debug, Default)]
pub struct SingleSlotSafePointManager {
    last: Option<Vec<u8>>,
}

impl SingleSlotSafePointManager {
    /// Builds a manager with no recorded safe point.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SafePointManager for SingleSlotSafePointManager {
    fn last_safe_snapshot(&self) -> Option<Vec<u8>> {
        self.last.clone()
    }

    fn record_safe_point(&mut self, bytes: Vec<u8>) {
        self.last = Some(bytes);
    }
}
