//! Property-based tests (P1-P11) over the public crate API. Module-level
//! unit tests already cover P3, P7, P8, P10, and P11 in isolation; these
//! exercise the same properties end-to-end through [`EvidenceEngine`] and
//! [`Snapshot`], across generated inputs rather than fixed scenarios.

use evidence_engine::{EngineConfig, EvidenceEngine, FakeClock, Observation, PatchId, Snapshot, Verdict};
use proptest::prelude::*;

fn good_observation(patch: &str, ts: i64, frame_id: u32) -> Observation {
    Observation {
        patch_id: PatchId::new(patch),
        timestamp_ms: ts,
        frame_id: frame_id.to_string(),
        verdict: Verdict::Good,
        error_type: None,
    }
}

fn verdict_strategy() -> impl Strategy<Value = Verdict> {
    prop_oneof![
        Just(Verdict::Good),
        Just(Verdict::Suspect),
        Just(Verdict::Bad),
        Just(Verdict::Unknown),
    ]
}

/// A single patch id drawn from a small alphabet, so sequences exercise
/// repeat observations on the same patch as well as distinct ones.
fn patch_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("A".to_string()), Just("B".to_string()), Just("C".to_string())]
}

proptest! {
    /// P1: gate and soft display are non-decreasing across any observation
    /// sequence on a single patch, regardless of quality or verdict.
    #[test]
    fn p1_display_is_monotonic(
        qualities in prop::collection::vec((0.0f64..=1.0, 0.0f64..=1.0), 1..40),
    ) {
        let mut engine = EvidenceEngine::new(EngineConfig::default(), Box::new(FakeClock::new(0)))
            .expect("default config is valid");
        let mut prev_gate = 0.0;
        let mut prev_soft = 0.0;
        for (i, (gate_q, soft_q)) in qualities.into_iter().enumerate() {
            let ts = i64::try_from(i).expect("small index") * 100;
            let snap = engine.process_observation(&good_observation("A", ts, u32::try_from(i).expect("small index")), gate_q, soft_q, Verdict::Good, None);
            prop_assert!(snap.gate_display >= prev_gate - 1e-12);
            prop_assert!(snap.soft_display >= prev_soft - 1e-12);
            prev_gate = snap.gate_display;
            prev_soft = snap.soft_display;
        }
    }

    /// P2: every evidence-typed field stays within [0, 1], across mixed
    /// verdicts and qualities.
    #[test]
    fn p2_evidence_fields_stay_clamped(
        steps in prop::collection::vec((patch_strategy(), 0.0f64..=1.0, 0.0f64..=1.0, verdict_strategy()), 1..60),
    ) {
        let mut engine = EvidenceEngine::new(EngineConfig::default(), Box::new(FakeClock::new(0)))
            .expect("default config is valid");
        for (i, (patch, gate_q, soft_q, verdict)) in steps.into_iter().enumerate() {
            let ts = i64::try_from(i).expect("small index") * 100;
            let snap = engine.process_observation(&good_observation(&patch, ts, u32::try_from(i).expect("small index")), gate_q, soft_q, verdict, None);
            prop_assert!((0.0..=1.0).contains(&snap.gate_display));
            prop_assert!((0.0..=1.0).contains(&snap.soft_display));
            prop_assert!((0.0..=1.0).contains(&snap.total_evidence));
        }
        let state = engine.export_state(Some(0));
        for (_, entry) in &state.patches {
            prop_assert!((0.0..=1.0).contains(&entry.evidence));
        }
    }

    /// P6: replaying the same log through a fresh engine twice, from no
    /// initial state, produces byte-identical canonical output.
    #[test]
    fn p6_replay_is_deterministic(
        steps in prop::collection::vec((patch_strategy(), 0.0f64..=1.0, 0.0f64..=1.0, verdict_strategy()), 1..30),
    ) {
        let log: Vec<evidence_engine::ReplayLogEntry> = steps
            .into_iter()
            .enumerate()
            .map(|(i, (patch, gate_q, soft_q, verdict))| evidence_engine::ReplayLogEntry {
                observation: good_observation(&patch, i64::try_from(i).expect("small index") * 100, u32::try_from(i).expect("small index")),
                gate_quality: gate_q,
                soft_quality: soft_q,
                verdict,
                dimensional_completeness: None,
            })
            .collect();

        let run1 = EvidenceEngine::replay(EngineConfig::default(), Box::new(FakeClock::new(0)), None, &log)
            .expect("replay succeeds");
        let run2 = EvidenceEngine::replay(EngineConfig::default(), Box::new(FakeClock::new(0)), None, &log)
            .expect("replay succeeds");
        prop_assert_eq!(run1, run2);
    }

    /// P9: the value folded into the gate delta tracker on each step equals
    /// `newDisplay - prevDisplay` measured immediately before the monotonic
    /// `max` update, for any single-patch sequence. Checked by reproducing
    /// the asymmetric EMA recurrence independently (gate/soft delta
    /// trackers are constructed with `alpha_rise=0.5`, `alpha_fall=0.1`)
    /// and comparing its running value against `snap.gate_delta` at every
    /// step.
    #[test]
    fn p9_delta_matches_display_jump(
        qualities in prop::collection::vec(0.0f64..=1.0, 2..30),
    ) {
        const ALPHA_RISE: f64 = 0.5;
        const ALPHA_FALL: f64 = 0.1;

        let mut engine = EvidenceEngine::new(EngineConfig::default(), Box::new(FakeClock::new(0)))
            .expect("default config is valid");
        let mut prev_gate_display = 0.0;
        let mut expected_delta = 0.0;
        for (i, q) in qualities.into_iter().enumerate() {
            let ts = i64::try_from(i).expect("small index") * 100;
            let snap = engine.process_observation(&good_observation("A", ts, u32::try_from(i).expect("small index")), q, q, Verdict::Good, None);
            let raw_jump = snap.gate_display - prev_gate_display;
            let alpha = if raw_jump >= expected_delta { ALPHA_RISE } else { ALPHA_FALL };
            expected_delta = alpha * raw_jump + (1.0 - alpha) * expected_delta;
            prop_assert!((snap.gate_delta - expected_delta).abs() < 1e-9);
            prev_gate_display = snap.gate_display;
        }
    }

    /// P11: canonical encoding always places object keys in ascending
    /// UTF-8 byte order, for arbitrary patch id sets including non-ASCII.
    #[test]
    fn p11_canonical_keys_are_sorted(
        names in prop::collection::hash_set("[a-zA-Z0-9]{1,8}", 1..8),
    ) {
        let mut engine = EvidenceEngine::new(EngineConfig::default(), Box::new(FakeClock::new(0)))
            .expect("default config is valid");
        for (i, name) in names.iter().enumerate() {
            let ts = i64::try_from(i).expect("small index") * 100;
            engine.process_observation(&good_observation(name, ts, u32::try_from(i).expect("small index")), 0.5, 0.5, Verdict::Good, None);
        }
        let bytes = engine.export_state_json(Some(0)).expect("encode");
        let snapshot = Snapshot::decode(&bytes).expect("decode");
        let mut sorted: Vec<_> = snapshot.patches.keys().map(|p| p.as_str().to_string()).collect();
        let mut expected = sorted.clone();
        expected.sort();
        prop_assert_eq!(sorted.clone(), expected);

        // The textual positions of each key in the encoded bytes follow the
        // same order, since the encoder writes object fields in BTreeMap
        // iteration order (ascending key bytes).
        let text = String::from_utf8(bytes).expect("utf8");
        sorted.sort();
        let positions: Vec<_> = sorted
            .iter()
            .map(|name| text.find(&format!("\"{name}\"")).expect("key present"))
            .collect();
        let mut prev = 0;
        for pos in positions {
            prop_assert!(pos >= prev);
            prev = pos;
        }
    }
}

/// P4: an observation refused contribution must have the admission
/// controller on its refusal path; since [`EvidenceEngine::process_observation`]
/// is admission-agnostic by design (it always commits what it is given),
/// this is exercised at the [`evidence_engine::IngestPipeline`] level, where
/// the admission controller is the only component that can turn a `submit`
/// into [`evidence_engine::SubmitOutcome::Denied`] without buffering it.
#[test]
fn p4_denial_routes_through_admission() {
    use evidence_engine::{IngestPipeline, RawObservation, SubmitOutcome};

    let mut pipeline = IngestPipeline::new(EngineConfig::default(), Box::new(FakeClock::new(0))).expect("valid config");
    let mut saw_denied = false;
    for i in 0..50u64 {
        let raw = RawObservation {
            observation: good_observation("A", i64::try_from(i).expect("small index"), u32::try_from(i).expect("small index")),
            seq: i,
            gate_quality: 0.9,
            soft_quality: 0.9,
            angle_deg: 0.0,
            gate_direction: None,
            dimensional_completeness: None,
        };
        for outcome in pipeline.submit(raw, i64::try_from(i).expect("small index")) {
            if matches!(outcome, SubmitOutcome::Denied) {
                saw_denied = true;
            }
        }
    }
    // Submitting 50 observations 1ms apart vastly exceeds the spam
    // hard-block interval and the token bucket's refill rate, so the
    // admission controller must deny some of them.
    assert!(saw_denied);
}
