//! End-to-end seed scenarios (S1-S6), exercised through the public crate API
//! rather than internal unit tests.

use evidence_engine::{
    Clock, EngineConfig, ErrorType, EvidenceEngine, FakeClock, IngestPipeline, Observation, PatchId, RawObservation,
    SubmitOutcome, Verdict,
};

fn observation(patch: &str, ts: i64, frame: &str, verdict: Verdict) -> Observation {
    Observation {
        patch_id: PatchId::new(patch),
        timestamp_ms: ts,
        frame_id: frame.to_string(),
        verdict,
        error_type: None::<ErrorType>,
    }
}

fn engine(clock_start_ms: i64) -> EvidenceEngine {
    EvidenceEngine::new(EngineConfig::default(), Box::new(FakeClock::new(clock_start_ms))).expect("default config is valid")
}

#[test]
fn s1_monotonic_max_smoothing() {
    let mut engine = engine(0);
    let a = "A";

    let snap1 = engine.process_observation(&observation(a, 1000, "f1", Verdict::Good), 0.5, 0.5, Verdict::Good, None);
    assert!((snap1.gate_display - 0.10).abs() < 1e-9);

    let snap2 = engine.process_observation(&observation(a, 2000, "f2", Verdict::Good), 0.4, 0.4, Verdict::Good, None);
    assert!((snap2.gate_display - 0.18).abs() < 1e-9);

    let snap3 = engine.process_observation(&observation(a, 3000, "f3", Verdict::Good), 0.6, 0.6, Verdict::Good, None);
    assert!((snap3.gate_display - 0.264).abs() < 1e-9);
}

#[test]
fn s2_locking_prevents_penalty() {
    let mut engine = engine(0);
    let b = "B";
    for i in 0..12 {
        engine.process_observation(&observation(b, i64::from(i) * 100, "f", Verdict::Good), 0.95, 0.95, Verdict::Good, None);
    }

    let before = engine.export_state(Some(0));
    let entry = before.patches.get(&PatchId::new(b)).expect("patch B present");
    assert!((entry.evidence - 0.95).abs() < 1e-9);
    assert_eq!(entry.observation_count, 12);

    engine.process_observation(&observation(b, 1_300, "f", Verdict::Bad), 0.0, 0.0, Verdict::Bad, None);
    let after = engine.export_state(Some(0));
    let entry = after.patches.get(&PatchId::new(b)).expect("patch B present");
    assert!((entry.evidence - 0.95).abs() < 1e-9);
    assert_eq!(entry.error_count, 1);
}

#[test]
fn s3_penalty_cooldown_and_corpse_protection() {
    let mut engine = engine(0);
    let c = "C";

    engine.process_observation(&observation(c, 0, "f", Verdict::Good), 0.9, 0.9, Verdict::Good, None);
    let snap = engine.export_state(Some(0));
    assert!((snap.patches.get(&PatchId::new(c)).expect("present").evidence - 0.9).abs() < 1e-9);

    engine.process_observation(&observation(c, 400, "f", Verdict::Bad), 0.0, 0.0, Verdict::Bad, None);
    let snap = engine.export_state(Some(0));
    assert!((snap.patches.get(&PatchId::new(c)).expect("present").evidence - 0.9).abs() < 1e-9);

    engine.process_observation(&observation(c, 700, "f", Verdict::Bad), 0.0, 0.0, Verdict::Bad, None);
    let snap = engine.export_state(Some(0));
    let entry = snap.patches.get(&PatchId::new(c)).expect("present");
    assert_eq!(entry.error_streak, 2);
    assert!((entry.evidence - (0.9 - 0.014)).abs() < 1e-9);

    let evidence_before = entry.evidence;
    engine.process_observation(&observation(c, 11_000, "f", Verdict::Bad), 0.0, 0.0, Verdict::Bad, None);
    let snap = engine.export_state(Some(0));
    assert!((snap.patches.get(&PatchId::new(c)).expect("present").evidence - evidence_before).abs() < 1e-9);
}

#[test]
fn s5_canonical_round_trip_and_ascii_ordering() {
    let mut engine = engine(0);
    engine.process_observation(&observation("z", 0, "f", Verdict::Good), 0.5, 0.5, Verdict::Good, None);
    engine.process_observation(&observation("a", 0, "f", Verdict::Good), 0.5, 0.5, Verdict::Good, None);
    engine.process_observation(&observation("日本", 0, "f", Verdict::Good), 0.5, 0.5, Verdict::Good, None);

    let bytes1 = engine.export_state_json(Some(12_345)).expect("encode");
    let bytes2 = engine.export_state_json(Some(12_345)).expect("encode");
    assert_eq!(bytes1, bytes2);

    let text = String::from_utf8(bytes1).expect("utf8");
    let a_pos = text.find("\"a\"").expect("a present");
    let z_pos = text.find("\"z\"").expect("z present");
    let nihon_pos = text.find('\u{65e5}').expect("日本 present");
    assert!(a_pos < z_pos);
    assert!(z_pos < nihon_pos);
}

#[test]
fn s6_reorder_buffer_emits_in_order_and_scales_late_arrival() {
    let clock: Box<dyn Clock> = Box::new(FakeClock::new(0));
    let mut pipeline = IngestPipeline::new(EngineConfig::default(), clock).expect("default config is valid");

    fn raw(seq: u64, ts: i64) -> RawObservation {
        RawObservation {
            observation: Observation {
                patch_id: PatchId::new("A"),
                timestamp_ms: ts,
                frame_id: "f".to_string(),
                verdict: Verdict::Good,
                error_type: None::<ErrorType>,
            },
            seq,
            gate_quality: 0.5,
            soft_quality: 0.5,
            angle_deg: 0.0,
            gate_direction: None,
            dimensional_completeness: None,
        }
    }

    // The pipeline's reorder buffer expects ingress sequencing to start at
    // 0; bootstrap the session before exercising the out-of-order window.
    pipeline.submit(raw(0, 990), 990);

    let mut committed_order = Vec::new();
    for outcome in pipeline.submit(raw(1, 1000), 1000) {
        if let SubmitOutcome::Committed(_) = outcome {
            committed_order.push(1u64);
        }
    }
    for outcome in pipeline.submit(raw(3, 1050), 1050) {
        if let SubmitOutcome::Committed(_) = outcome {
            committed_order.push(3);
        }
    }
    for outcome in pipeline.submit(raw(2, 1080), 1080) {
        if let SubmitOutcome::Committed(_) = outcome {
            committed_order.push(2);
        }
    }
    for outcome in pipeline.submit(raw(4, 1100), 1100) {
        if let SubmitOutcome::Committed(_) = outcome {
            committed_order.push(4);
        }
    }

    assert_eq!(committed_order, vec![1, 2, 3, 4]);
}
