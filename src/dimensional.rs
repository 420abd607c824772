//! Dimensional score set (C16): a 15-dimension clamped score bundle (10
//! active, 5 reserved), soft-aggregated over its active dimensions.

use crate::clamped::ClampedValue;

/// Total dimensions tracked, including reserved slots.
pub const DIMENSION_COUNT: usize = 15;
/// Active dimensions folded into the soft aggregate.
pub const ACTIVE_DIMENSION_COUNT: usize = 10;

/// Raised when a dimension index is out of the closed `[0, 15)` range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("dimension index {0} out of range [0, {DIMENSION_COUNT})")]
pub struct DimensionIndexError(pub usize);

/// A fixed 15-tuple of clamped scalars. Dimensions `0..10` are active and
/// feed the soft aggregate; `10..15` are reserved for future use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DimensionalScoreSet {
    dims: [ClampedValue; DIMENSION_COUNT],
}

impl Default for DimensionalScoreSet {
    fn default() -> Self {
        Self {
            dims: [ClampedValue::ZERO; DIMENSION_COUNT],
        }
    }
}

impl DimensionalScoreSet {
    /// Builds a score set with every dimension at `0.0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets dimension `index` to `value` (clamped into `[0, 1]`).
    ///
    /// # Errors
    /// Returns [`DimensionIndexError`] if `index ≥ 15`.
    pub fn set(&mut self, index: usize, value: f64) -> Result<(), DimensionIndexError> {
        if index >= DIMENSION_COUNT {
            return Err(DimensionIndexError(index));
        }
        self.dims[index] = ClampedValue::new(value);
        Ok(())
    }

    /// Reads dimension `index`, or `None` if out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.dims.get(index).map(ClampedValue::get)
    }

    /// Clamped mean of the active dimensions (`0..10`), used both as the
    /// dimensional-completeness factor and as a `softQuality` surrogate.
    #[must_use]
    pub fn soft_aggregate(&self) -> f64 {
        let sum: f64 = self.dims[..ACTIVE_DIMENSION_COUNT].iter().map(|d| d.get()).sum();
        ClampedValue::new(sum / ACTIVE_DIMENSION_COUNT as f64).get()
    }

    /// Resets every dimension to `0.0`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_aggregate_is_zero() {
        let set = DimensionalScoreSet::new();
        assert_eq!(set.soft_aggregate(), 0.0);
    }

    #[test]
    fn aggregate_averages_only_active_dimensions() {
        let mut set = DimensionalScoreSet::new();
        for i in 0..ACTIVE_DIMENSION_COUNT {
            set.set(i, 1.0).expect("valid index");
        }
        set.set(12, 1.0).expect("reserved dimension still settable");
        assert_eq!(set.soft_aggregate(), 1.0);
    }

    #[test]
    fn out_of_range_index_errors() {
        let mut set = DimensionalScoreSet::new();
        assert!(set.set(15, 0.5).is_err());
    }

    #[test]
    fn values_are_clamped_on_write() {
        let mut set = DimensionalScoreSet::new();
        set.set(0, 5.0).expect("valid index");
        assert_eq!(set.get(0), Some(1.0));
    }
}
