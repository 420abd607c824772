//! Stable identifiers and the small closed enums shared across the engine.

use std::fmt;

/// Opaque identifier for a surface patch, derived externally from normalized
/// patch coordinates. Unique within a capture session.
///
/// `PatchId` is a thin newtype over `String` so that patch identifiers are
/// never accidentally confused with frame identifiers or other engine
/// strings at a call site.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchId(String);

impl PatchId {
    /// Builds a patch id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatchId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PatchId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Identifier for the frame a patch observation was captured from. Opaque;
/// compared only for equality and used as a display hint (`bestFrameId`).
pub type FrameId = String;

/// Monotonically increasing sequence number assigned externally at ingress,
/// consumed by the reorder buffer (C13).
pub type SeqNo = u64;

/// Closed-set classification of a single patch observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Full credit: raises evidence, resets the error streak.
    Good,
    /// Partial credit (`deltaMultiplier` 0.3 at the caller); increments
    /// `suspectCount` only.
    Suspect,
    /// Applies the gradual penalty, subject to cooldown and corpse
    /// protection.
    Bad,
    /// Not classifiable by the upstream pipeline. Treated as [`Verdict::Suspect`]
    /// and logged (see [`crate::diagnostics`]).
    Unknown,
}

/// Closed-set classification of why a `bad`/`unknown` observation was flagged.
/// Informational only; it does not currently change penalty magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorType {
    /// A moving object crossed the patch during capture.
    DynamicObject,
    /// Depth reconstruction was distorted (e.g. reflective or transparent surface).
    DepthDistortion,
    /// Exposure changed mid-capture.
    ExposureDrift,
    /// White balance changed mid-capture.
    WhiteBalanceDrift,
    /// Camera motion blurred the frame.
    MotionBlur,
    /// Upstream could not classify the error.
    Unknown,
}

/// A single per-patch observation entering the engine.
///
/// `timestamp` MUST be a monotonic millisecond reading (see [`crate::clock`]);
/// using wall-clock time here is a contract violation the engine cannot
/// detect but callers must not commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    /// Patch this observation pertains to.
    pub patch_id: PatchId,
    /// Monotonic capture timestamp, in milliseconds.
    pub timestamp_ms: i64,
    /// Frame the observation was extracted from.
    pub frame_id: FrameId,
    /// Closed-set verdict for this observation.
    pub verdict: Verdict,
    /// Optional closed-set error classification (present for `bad`/`unknown`).
    pub error_type: Option<ErrorType>,
}
