//! Feature-gated diagnostic log (`SPEC_FULL.md` §10.3).
//!
//! `warp-core` has no `tracing`/`log` dependency in its deterministic core;
//! it hand-formats single-line JSON telemetry behind a feature flag instead,
//! explicitly to keep a non-deterministic dependency out of a path the
//! canonical encoder never touches. This module does the same: one JSON
//! line per warning-class event, written only when the `diagnostics`
//! feature is enabled. With the feature off, every function here is a
//! zero-cost no-op.

/// A warning-class event the engine degrades to rather than surfacing as an
/// error (`SPEC_FULL.md` §7, "Recoverable (global)").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Monotonic time moved backwards; treated as `Δt = 0`.
    BackwardMonotonicTime,
    /// An `unknown` verdict was coerced to `suspect`.
    UnknownVerdictCoerced,
    /// A decode path fell back to a default instead of failing outright.
    DecodeFallback,
    /// The reorder buffer exceeded its window and dropped gap observations.
    ReorderBufferOverflowDrop,
    /// A fatal invariant was violated; in a release build this degrades to
    /// a logged warning and a best-effort correction instead of a panic.
    FatalInvariantViolation,
}

impl Event {
    fn as_str(self) -> &'static str {
        match self {
            Self::BackwardMonotonicTime => "backward_monotonic_time",
            Self::UnknownVerdictCoerced => "unknown_verdict_coerced",
            Self::DecodeFallback => "decode_fallback",
            Self::ReorderBufferOverflowDrop => "reorder_buffer_overflow_drop",
            Self::FatalInvariantViolation => "fatal_invariant_violation",
        }
    }
}

/// Emits a one-line JSON diagnostic for `event`, with `detail` as a free-form
/// message. No-op unless the `diagnostics` feature is enabled; best-effort
/// (I/O errors are swallowed) even when it is.
#[cfg(feature = "diagnostics")]
pub fn warn(event: Event, detail: &str) {
    use std::io::Write as _;
    let mut out = std::io::stderr().lock();
    let mut escaped = String::new();
    for c in detail.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    let _ = writeln!(out, r#"{{"event":"{}","detail":"{}"}}"#, event.as_str(), escaped);
}

/// No-op build of [`warn`] for when the `diagnostics` feature is disabled.
#[cfg(not(feature = "diagnostics"))]
#[allow(clippy::missing_const_for_fn)]
pub fn warn(_event: Event, _detail: &str) {}
