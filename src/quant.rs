//! Per-field numeric precision policy consulted by the canonical encoder (C3).
//!
//! A closed set of field names is "quantized": serialized as fixed-point
//! with 4 decimals. Every other field uses the 15-significant-digit plain
//! form. The policy is keyed by field name rather than by Rust type because
//! the same `f64` representation (evidence vs. a raw timestamp-derived
//! ratio, say) can need different precision depending on where it sits in
//! the snapshot tree.

/// Field names serialized as fixed-point with 4 decimals.
const QUANTIZED_FIELDS: &[&str] = &["evidence", "quality", "weight", "delta", "display", "scale"];

/// Returns whether `field` is in the closed quantized set.
#[must_use]
pub fn is_quantized(field: &str) -> bool {
    QUANTIZED_FIELDS.contains(&field)
}
