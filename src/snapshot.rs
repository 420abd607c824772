//! Snapshot / replay (C18): export/import of engine-visible state and
//! deterministic replay of an observation log.
//!
//! The per-patch state snapshotted here is the **gate ledger**'s entries —
//! the geometric-reachability ledger is the authoritative one for a
//! capture-complete decision. Per §4.18/§9 this is a deliberate, documented
//! simplification: `loadState` restores only the two global displays and
//! marks the aggregator for recalibration, never reconstructing the soft
//! ledger, diversity buckets, or gate coverage bitsets. Full engine state
//! recovery is the job of [`crate::engine::EvidenceEngine::replay`], which
//! re-derives everything by re-running the observation log.

use std::collections::BTreeMap;

use crate::canon::{self, CanonValue};
use crate::error::SnapshotError;
use crate::ident::PatchId;

/// Current schema major version. Bumped only on a breaking wire-format
/// change.
pub const CURRENT_SCHEMA_MAJOR: u32 = 1;
/// Current schema minor version. Bumped on additive, compatible changes.
pub const CURRENT_SCHEMA_MINOR: u32 = 0;

/// Per-patch fields carried in a snapshot, a subset of the full
/// [`crate::patch_ledger::PatchEntry`] (no `suspectCount`, no lock flag —
/// both are re-derived on replay).
#[derive(Clone, Debug, PartialEq)]
pub struct PatchEntrySnapshot {
    /// Frame id that produced the current evidence high-water mark.
    pub best_frame_id: Option<String>,
    /// Total `bad` observations ever recorded.
    pub error_count: u32,
    /// Consecutive `bad` observations since the last `good` one.
    pub error_streak: u32,
    /// Current evidence value.
    pub evidence: f64,
    /// Monotonic timestamp of the most recent `good` observation.
    pub last_good_update_ms: Option<i64>,
    /// Monotonic timestamp of the most recent observation of any verdict.
    pub last_update_ms: i64,
    /// Total observations folded into this entry.
    pub observation_count: u32,
}

/// A fully decoded snapshot of engine-visible state, per §3/§6.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Wall-clock time the snapshot was produced, for display/logging only.
    pub exported_at_ms: i64,
    /// Global monotonic-max gate display.
    pub gate_display: f64,
    /// Global monotonic-max soft display.
    pub soft_display: f64,
    /// Last observed aggregator `totalEvidence`.
    pub last_total_display: f64,
    /// Gate-ledger entries, keyed by patch id.
    pub patches: BTreeMap<PatchId, PatchEntrySnapshot>,
    /// `(major, minor)` schema version this snapshot was written under.
    pub schema_version: (u32, u32),
}

fn patch_entry_canon(p: &PatchEntrySnapshot) -> CanonValue {
    CanonValue::object([
        (
            "bestFrameId".to_string(),
            p.best_frame_id.clone().map_or(CanonValue::Null, CanonValue::Str),
        ),
        ("errorCount".to_string(), CanonValue::Int(i64::from(p.error_count))),
        ("errorStreak".to_string(), CanonValue::Int(i64::from(p.error_streak))),
        ("evidence".to_string(), CanonValue::for_field("evidence", p.evidence)),
        (
            "lastGoodUpdateMs".to_string(),
            p.last_good_update_ms.map_or(CanonValue::Null, CanonValue::Int),
        ),
        ("lastUpdateMs".to_string(), CanonValue::Int(p.last_update_ms)),
        (
            "observationCount".to_string(),
            CanonValue::Int(i64::from(p.observation_count)),
        ),
    ])
}

fn field<'a>(fields: &'a BTreeMap<String, CanonValue>, key: &str) -> Result<&'a CanonValue, SnapshotError> {
    fields.get(key).ok_or_else(|| SnapshotError::DeserializationFailed {
        reason: format!("missing field `{key}`"),
    })
}

fn as_f64(value: &CanonValue, key: &str) -> Result<f64, SnapshotError> {
    match value {
        CanonValue::Num { value, .. } => Ok(*value),
        CanonValue::Int(i) => Ok(*i as f64),
        _ => Err(SnapshotError::DeserializationFailed {
            reason: format!("`{key}` is not a number"),
        }),
    }
}

fn as_i64(value: &CanonValue, key: &str) -> Result<i64, SnapshotError> {
    match value {
        CanonValue::Int(i) => Ok(*i),
        CanonValue::Num { value, .. } => Ok(*value as i64),
        _ => Err(SnapshotError::DeserializationFailed {
            reason: format!("`{key}` is not an integer"),
        }),
    }
}

fn as_opt_i64(value: &CanonValue, key: &str) -> Result<Option<i64>, SnapshotError> {
    match value {
        CanonValue::Null => Ok(None),
        other => as_i64(other, key).map(Some),
    }
}

fn as_opt_string(value: &CanonValue, key: &str) -> Result<Option<String>, SnapshotError> {
    match value {
        CanonValue::Null => Ok(None),
        CanonValue::Str(s) => Ok(Some(s.clone())),
        _ => Err(SnapshotError::DeserializationFailed {
            reason: format!("`{key}` is not a string or null"),
        }),
    }
}

fn as_object<'a>(value: &'a CanonValue, key: &str) -> Result<&'a BTreeMap<String, CanonValue>, SnapshotError> {
    match value {
        CanonValue::Object(fields) => Ok(fields),
        _ => Err(SnapshotError::DeserializationFailed {
            reason: format!("`{key}` is not an object"),
        }),
    }
}

fn parse_patch_entry(fields: &BTreeMap<String, CanonValue>) -> Result<PatchEntrySnapshot, SnapshotError> {
    Ok(PatchEntrySnapshot {
        best_frame_id: as_opt_string(field(fields, "bestFrameId")?, "bestFrameId")?,
        error_count: as_i64(field(fields, "errorCount")?, "errorCount")? as u32,
        error_streak: as_i64(field(fields, "errorStreak")?, "errorStreak")? as u32,
        evidence: as_f64(field(fields, "evidence")?, "evidence")?,
        last_good_update_ms: as_opt_i64(field(fields, "lastGoodUpdateMs")?, "lastGoodUpdateMs")?,
        last_update_ms: as_i64(field(fields, "lastUpdateMs")?, "lastUpdateMs")?,
        observation_count: as_i64(field(fields, "observationCount")?, "observationCount")? as u32,
    })
}

impl Snapshot {
    /// Builds the canonical value tree for this snapshot, per §4.3/§6.
    #[must_use]
    pub fn to_canon(&self) -> CanonValue {
        let patches = self
            .patches
            .iter()
            .map(|(id, entry)| (id.as_str().to_string(), patch_entry_canon(entry)))
            .collect::<BTreeMap<_, _>>();

        CanonValue::object([
            ("exportedAtMs".to_string(), CanonValue::Int(self.exported_at_ms)),
            ("gateDisplay".to_string(), CanonValue::for_field("display", self.gate_display)),
            (
                "lastTotalDisplay".to_string(),
                CanonValue::for_field("display", self.last_total_display),
            ),
            ("patches".to_string(), CanonValue::Object(patches)),
            (
                "schemaVersion".to_string(),
                CanonValue::Str(format!("{}.{}", self.schema_version.0, self.schema_version.1)),
            ),
            ("softDisplay".to_string(), CanonValue::for_field("display", self.soft_display)),
        ])
    }

    /// Encodes this snapshot to canonical bytes.
    ///
    /// # Errors
    /// Returns [`SnapshotError::SerializationFailed`] if the canonical
    /// encoder rejects the tree (e.g. an unencodable string).
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        canon::encode(&self.to_canon()).map_err(|e| SnapshotError::SerializationFailed { reason: e.to_string() })
    }

    /// Content hash of this snapshot's canonical encoding: `blake3`, hex
    /// encoded. Two snapshots with identical hashes have byte-identical
    /// canonical bytes, so callers can dedupe or compare snapshots without
    /// keeping the full encoding around.
    ///
    /// # Errors
    /// Propagates [`SnapshotError::SerializationFailed`] from [`Self::encode`].
    pub fn content_hash(&self) -> Result<String, SnapshotError> {
        let bytes = self.encode()?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    /// Decodes a snapshot from canonical bytes, verifying schema
    /// compatibility (major version equality).
    ///
    /// # Errors
    /// Returns [`SnapshotError::DeserializationFailed`] on malformed bytes
    /// or a shape mismatch, or [`SnapshotError::IncompatibleSchemaVersion`]
    /// if the major version does not match [`CURRENT_SCHEMA_MAJOR`].
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let value = canon::decode(bytes).map_err(|e| SnapshotError::DeserializationFailed { reason: e.to_string() })?;
        let CanonValue::Object(root) = &value else {
            return Err(SnapshotError::DeserializationFailed {
                reason: "root is not an object".to_string(),
            });
        };

        let schema_version_str = match field(root, "schemaVersion")? {
            CanonValue::Str(s) => s.clone(),
            _ => {
                return Err(SnapshotError::DeserializationFailed {
                    reason: "schemaVersion is not a string".to_string(),
                })
            }
        };
        let (major, minor) = parse_schema_version(&schema_version_str)?;
        if major != CURRENT_SCHEMA_MAJOR {
            return Err(SnapshotError::IncompatibleSchemaVersion {
                expected: CURRENT_SCHEMA_MAJOR,
                found: major,
            });
        }

        let patches_obj = as_object(field(root, "patches")?, "patches")?;
        let mut patches = BTreeMap::new();
        for (id, value) in patches_obj {
            let entry_fields = as_object(value, "patches[_]")?;
            patches.insert(PatchId::new(id.clone()), parse_patch_entry(entry_fields)?);
        }

        Ok(Self {
            exported_at_ms: as_i64(field(root, "exportedAtMs")?, "exportedAtMs")?,
            gate_display: as_f64(field(root, "gateDisplay")?, "gateDisplay")?,
            soft_display: as_f64(field(root, "softDisplay")?, "softDisplay")?,
            last_total_display: as_f64(field(root, "lastTotalDisplay")?, "lastTotalDisplay")?,
            patches,
            schema_version: (major, minor),
        })
    }

    /// Compares two encoded snapshots: byte-equal bytes are trivially equal;
    /// otherwise both are decoded and compared field-by-field within
    /// `1e-6`, per §4.18. Returns a human-readable diff list, empty if
    /// equivalent.
    #[must_use]
    pub fn compare_bytes(expected: &[u8], actual: &[u8]) -> Vec<String> {
        if expected == actual {
            return Vec::new();
        }
        let (Ok(expected_snap), Ok(actual_snap)) = (Self::decode(expected), Self::decode(actual)) else {
            return vec!["one or both snapshots failed to decode".to_string()];
        };
        expected_snap.diff(&actual_snap)
    }

    /// Structural diff against another decoded snapshot, within `1e-6` for
    /// numeric fields.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Vec<String> {
        const EPS: f64 = 1e-6;
        let mut diffs = Vec::new();

        if (self.gate_display - other.gate_display).abs() > EPS {
            diffs.push(format!("gateDisplay: {} vs {}", self.gate_display, other.gate_display));
        }
        if (self.soft_display - other.soft_display).abs() > EPS {
            diffs.push(format!("softDisplay: {} vs {}", self.soft_display, other.soft_display));
        }
        if (self.last_total_display - other.last_total_display).abs() > EPS {
            diffs.push(format!(
                "lastTotalDisplay: {} vs {}",
                self.last_total_display, other.last_total_display
            ));
        }

        let self_keys: std::collections::BTreeSet<_> = self.patches.keys().collect();
        let other_keys: std::collections::BTreeSet<_> = other.patches.keys().collect();
        if self_keys != other_keys {
            diffs.push("patch key sets differ".to_string());
        }
        for (id, entry) in &self.patches {
            if let Some(other_entry) = other.patches.get(id) {
                if (entry.evidence - other_entry.evidence).abs() > EPS {
                    diffs.push(format!("{id}: evidence {} vs {}", entry.evidence, other_entry.evidence));
                }
            }
        }
        diffs
    }
}

fn parse_schema_version(s: &str) -> Result<(u32, u32), SnapshotError> {
    let (major_str, minor_str) = s.split_once('.').ok_or_else(|| SnapshotError::DeserializationFailed {
        reason: format!("malformed schemaVersion `{s}`"),
    })?;
    let major = major_str.parse().map_err(|_| SnapshotError::DeserializationFailed {
        reason: format!("malformed schemaVersion major `{major_str}`"),
    })?;
    let minor = minor_str.parse().map_err(|_| SnapshotError::DeserializationFailed {
        reason: format!("malformed schemaVersion minor `{minor_str}`"),
    })?;
    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut patches = BTreeMap::new();
        patches.insert(
            PatchId::new("a"),
            PatchEntrySnapshot {
                best_frame_id: Some("f1".to_string()),
                error_count: 2,
                error_streak: 0,
                evidence: 0.7531,
                last_good_update_ms: Some(900),
                last_update_ms: 1000,
                observation_count: 5,
            },
        );
        patches.insert(
            PatchId::new("日本"),
            PatchEntrySnapshot {
                best_frame_id: None,
                error_count: 0,
                error_streak: 0,
                evidence: 0.0,
                last_good_update_ms: None,
                last_update_ms: 500,
                observation_count: 1,
            },
        );
        Snapshot {
            exported_at_ms: 12_345,
            gate_display: 0.264,
            soft_display: 0.1,
            last_total_display: 0.5,
            patches,
            schema_version: (CURRENT_SCHEMA_MAJOR, CURRENT_SCHEMA_MINOR),
        }
    }

    #[test]
    fn scenario_s5_ascii_sorts_before_multibyte_and_is_stable() {
        let snap = sample();
        let bytes1 = snap.encode().expect("encode");
        let bytes2 = snap.encode().expect("encode");
        assert_eq!(bytes1, bytes2);
        let text = String::from_utf8(bytes1).expect("utf8");
        let a_pos = text.find("\"a\"").expect("a present");
        let nihon_pos = text.find('\u{65e5}').expect("日本 present");
        assert!(a_pos < nihon_pos);
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let snap = sample();
        let bytes = snap.encode().expect("encode");
        let decoded = Snapshot::decode(&bytes).expect("decode");
        assert_eq!(decoded, snap);
    }

    #[test]
    fn rejects_incompatible_major_version() {
        let mut snap = sample();
        snap.schema_version = (99, 0);
        let bytes = snap.encode().expect("encode");
        let err = Snapshot::decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::IncompatibleSchemaVersion {
                expected: CURRENT_SCHEMA_MAJOR,
                found: 99
            }
        );
    }

    #[test]
    fn compare_bytes_is_empty_for_identical_snapshots() {
        let snap = sample();
        let bytes = snap.encode().expect("encode");
        assert!(Snapshot::compare_bytes(&bytes, &bytes).is_empty());
    }

    #[test]
    fn compare_bytes_reports_evidence_drift() {
        let mut snap = sample();
        let expected_bytes = snap.encode().expect("encode");
        snap.patches.get_mut(&PatchId::new("a")).expect("patch a").evidence = 0.9;
        let actual_bytes = snap.encode().expect("encode");
        let diffs = Snapshot::compare_bytes(&expected_bytes, &actual_bytes);
        assert!(!diffs.is_empty());
    }

    #[test]
    fn content_hash_is_stable_and_sensitive_to_evidence() {
        let snap = sample();
        let hash1 = snap.content_hash().expect("hash");
        let hash2 = snap.content_hash().expect("hash");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);

        let mut changed = snap;
        changed.patches.get_mut(&PatchId::new("a")).expect("patch a").evidence = 0.9;
        let hash3 = changed.content_hash().expect("hash");
        assert_ne!(hash1, hash3);
    }
}
