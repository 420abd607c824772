// SPDX-License-Identifier: Apache-2.0
//! Deterministic evidence aggregation engine for a 3D scene-reconstruction
//! capture pipeline.
//!
//! Patch-level observations arrive from an external geometric-reachability
//! pass (gate) and a refinement pass (soft); this crate blends them into a
//! single monotonic display signal per patch and for the whole session,
//! tracks view diversity and gate coverage, rate-limits and reorders
//! incoming observations, and can snapshot/replay its state bit-for-bit
//! identically across runs. See `SPEC_FULL.md` for the full module map.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::cognitive_complexity,
    clippy::option_if_let_else,
    clippy::significant_drop_tightening,
    clippy::doc_markdown,
    clippy::too_many_lines,
    clippy::struct_excessive_bools,
    clippy::too_long_first_doc_paragraph,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::similar_names,
    clippy::trivially_copy_pass_by_ref,
    clippy::needless_collect,
    clippy::manual_let_else,
    clippy::needless_pass_by_value,
    clippy::multiple_crate_versions
)]
// Test modules favor `expect`/`unwrap` with descriptive messages over `?`
// plumbing; the deterministic core itself never uses either.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

/// Stable identifiers and the small closed enums shared across the engine.
pub mod ident;

/// Time sources: wall-clock vs. monotonic, and the fake used by tests.
pub mod clock;

/// A scalar constrained to `[0, 1]`.
pub mod clamped;

/// Field-name-driven quantization policy for canonical encoding.
pub mod quant;

/// Hand-rolled canonical JSON: value tree, encoder, decoder.
pub mod canon;

/// The closed error taxonomy, one `thiserror` enum per fallible boundary.
pub mod error;

/// Closed-set engine configuration.
pub mod config;

/// Feature-gated diagnostic JSONL emitter.
pub mod diagnostics;

/// Per-ledger-kind patch ledger (C5).
pub mod patch_ledger;

/// The (gate, soft) ledger pair and their dynamic blend (C6).
pub mod split_ledger;

/// Per-patch monotonic display with EMA smoothing (C7).
pub mod display_map;

/// Bucketed amortized aggregator (C8).
pub mod aggregator;

/// Per-patch view-diversity scoring (C9).
pub mod diversity;

/// Zero-trigonometric gate coverage tracking (C10).
pub mod gate_coverage;

/// Per-patch token bucket limiter (C11).
pub mod token_bucket;

/// Spam/frequency provider (C12).
pub mod spam;

/// Sequence-numbered reorder buffer (C13).
pub mod reorder;

/// The single authoritative admission gate (C14).
pub mod admission;

/// Asymmetric EMA delta tracker (C15).
pub mod delta;

/// 15-dimension clamped score set (C16).
pub mod dimensional;

/// Aggregate health scoring and recovery strategy selection (C17).
pub mod health;

/// Snapshot export/import and deterministic replay (C18).
pub mod snapshot;

/// The single-writer evidence engine actor (C19).
pub mod engine;

/// Composition of the admission pipeline (C11-C14) in front of the engine.
pub mod ingest;

pub use admission::{AdmissionController, AdmissionDecision, AdmissionReason};
pub use aggregator::Aggregator;
pub use clamped::ClampedValue;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::EngineConfig;
pub use delta::DeltaTracker;
pub use dimensional::{DimensionIndexError, DimensionalScoreSet};
pub use diversity::ViewDiversity;
pub use engine::{EvidenceEngine, EvidenceSnapshot, ReplayLogEntry};
pub use error::{ConfigError, SnapshotError};
pub use gate_coverage::GateCoverageTracker;
pub use health::{HealthMetrics, RecoveryStrategy, SafePointManager, SingleSlotSafePointManager};
pub use ident::{ErrorType, FrameId, Observation, PatchId, SeqNo, Verdict};
pub use ingest::{IngestPipeline, RawObservation, SubmitOutcome};
pub use reorder::ReorderBuffer;
pub use snapshot::Snapshot;
pub use split_ledger::SplitLedger;
pub use token_bucket::TokenBucketLimiter;
