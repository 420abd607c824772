//! The closed error taxonomy (`SPEC_FULL.md` §6/§10.2). One `thiserror`
//! enum per fallible boundary, the way `warp-core::engine_impl::EngineError`
//! and `warp-core::tick_patch::TickPatchError` are split by subsystem rather
//! than collapsed into a single catch-all.

use thiserror::Error;

/// Errors surfaced by snapshot encode/decode and schema/version checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The loaded snapshot's major schema version does not match the
    /// engine's current major version.
    #[error("incompatible schema version: expected {expected}, found {found}")]
    IncompatibleSchemaVersion {
        /// The engine's current major version.
        expected: u32,
        /// The major version recorded in the snapshot.
        found: u32,
    },
    /// A decoded evidence-typed field fell outside `[0, 1]` in a way the
    /// clamping policy for that site does not allow recovering from.
    #[error("invalid evidence value {value}: {reason}")]
    InvalidEvidenceValue {
        /// The offending decoded value.
        value: f64,
        /// Why the value could not be accepted.
        reason: String,
    },
    /// A lookup required a patch that is not present in the ledger.
    #[error("patch not found: {patch_id}")]
    PatchNotFound {
        /// The id that was looked up.
        patch_id: String,
    },
    /// The canonical encoder failed to produce bytes for the current state.
    #[error("serialization failed: {reason}")]
    SerializationFailed {
        /// Encoder-reported reason.
        reason: String,
    },
    /// The canonical decoder failed to parse the supplied bytes, or the
    /// parsed tree did not match the expected snapshot shape.
    #[error("deserialization failed: {reason}")]
    DeserializationFailed {
        /// Decoder-reported reason.
        reason: String,
    },
}

/// Errors returned by [`crate::config::EngineConfig::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field that must lie in `[0, 1]` did not.
    #[error("{field} must be in [0, 1], got {value}")]
    OutOfUnitRange {
        /// Name of the offending field.
        field: &'static str,
        /// The out-of-range value supplied.
        value: f64,
    },
    /// A field that must be strictly positive was zero or negative.
    #[error("{field} must be > 0, got {value}")]
    NotPositive {
        /// Name of the offending field.
        field: &'static str,
        /// The non-positive value supplied.
        value: f64,
    },
    /// The dynamic-weight transition window was not well-ordered
    /// (`transitionStart < transitionEnd`).
    #[error("dynamic weight transition window is empty or inverted: start={start}, end={end}")]
    InvertedTransitionWindow {
        /// Configured transition start.
        start: f64,
        /// Configured transition end.
        end: f64,
    },
    /// The early/late gate weights were not ordered as the spec requires
    /// (`earlyGate > lateGate`, gate share decreases with progress).
    #[error("dynamic weight gate endpoints must satisfy early > late: early={early}, late={late}")]
    InvertedGateEndpoints {
        /// Configured early-progress gate weight.
        early: f64,
        /// Configured late-progress gate weight.
        late: f64,
    },
}
