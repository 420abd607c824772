//! Reorder buffer (C13): sequence-numbered in-order release with a bounded
//! window and late-arrival quality decay.

use std::collections::BTreeMap;

/// Buffer capacity before the oldest pending key forces a gap-dropping flush.
pub const MAX_PENDING: usize = 16;

struct Pending<T> {
    obs_time_ms: i64,
    payload: T,
}

/// Emits a contiguous run keyed by sequence number, dropping gaps only on
/// overflow, per §4.13.
pub struct ReorderBuffer<T> {
    /// Next sequence number this buffer will release. Seeded from an
    /// externally known session-start sequence rather than inferred from
    /// whichever observation happens to arrive first, so a reordered
    /// session-initial observation is still buffered instead of being
    /// skipped past.
    expected_next: u64,
    start_seq: u64,
    pending: BTreeMap<u64, Pending<T>>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::starting_at(0)
    }
}

impl<T> ReorderBuffer<T> {
    /// Builds an empty buffer expecting sequence numbers to start at `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an empty buffer expecting the session's first sequence number
    /// to be `start_seq`, per the caller's own ingress numbering (§4.13,
    /// "global monotonic sequence counter at ingress").
    #[must_use]
    pub fn starting_at(start_seq: u64) -> Self {
        Self {
            expected_next: start_seq,
            start_seq,
            pending: BTreeMap::new(),
        }
    }

    /// Inserts `payload` at `seq`, observed at monotonic `obs_time_ms`, then
    /// releases the contiguous prefix starting at `expectedNext` (as of
    /// `now_ms`). Each released item carries its lateness quality scale:
    /// `1.0` if `now_ms - obs_time_ms ≤ window_ms`, else
    /// `max(0.1, 1 / (age_ms / window_ms))`. If accepting `payload` would
    /// push the buffer over [`MAX_PENDING`], the smallest pending key
    /// becomes the new `expectedNext` first, dropping any earlier gap.
    pub fn push(&mut self, seq: u64, obs_time_ms: i64, payload: T, now_ms: i64, window_ms: i64) -> Vec<(T, f64)> {
        self.pending.insert(seq, Pending { obs_time_ms, payload });

        let mut expected_next = self.expected_next;
        if self.pending.len() > MAX_PENDING {
            if let Some(&min_key) = self.pending.keys().next() {
                if min_key > expected_next {
                    crate::diagnostics::warn(
                        crate::diagnostics::Event::ReorderBufferOverflowDrop,
                        &format!("expected={expected_next} jumped_to={min_key}"),
                    );
                    expected_next = min_key;
                }
            }
        }

        let mut out = Vec::new();
        while let Some(entry) = self.pending.remove(&expected_next) {
            let age_ms = (now_ms - entry.obs_time_ms).max(0);
            let scale = if age_ms > window_ms {
                (f64::from(window_ms as i32) / f64::from(age_ms as i32)).max(0.1)
            } else {
                1.0
            };
            out.push((entry.payload, scale));
            expected_next += 1;
        }
        self.expected_next = expected_next;
        out
    }

    /// Clears all pending entries and resets the expected next sequence
    /// number back to this buffer's configured session start, for an
    /// explicit session reset.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.expected_next = self.start_seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s6_reorders_and_scales_late_arrival() {
        let mut buf: ReorderBuffer<u64> = ReorderBuffer::starting_at(1);
        let mut emitted = Vec::new();

        emitted.extend(buf.push(1, 1000, 1, 1000, 120));
        emitted.extend(buf.push(3, 1050, 3, 1050, 120));
        emitted.extend(buf.push(2, 1080, 2, 1080, 120));
        emitted.extend(buf.push(4, 1100, 4, 1100, 120));

        let order: Vec<u64> = emitted.iter().map(|(v, _)| *v).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
        let seq3_scale = emitted.iter().find(|(v, _)| *v == 3).expect("seq3").1;
        assert_eq!(seq3_scale, 1.0);

        let late = buf.push(5, 1150, 5, 1300, 120);
        assert_eq!(late.len(), 1);
        assert!((late[0].1 - 0.8).abs() < 1e-9);
    }

    #[test]
    fn overflow_drops_gap_and_resumes() {
        let mut buf: ReorderBuffer<u64> = ReorderBuffer::starting_at(1);
        // seq 1 drains immediately, advancing expectedNext to 2. seq 2 is
        // then never sent, so 3..=19 (17 items) pile up until the buffer
        // overflows and jumps the gap.
        assert_eq!(buf.push(1, 0, 1, 0, 120), vec![(1, 1.0)]);

        let mut last_emitted = Vec::new();
        for seq in 3..=19u64 {
            last_emitted = buf.push(seq, 0, seq, 0, 120);
        }
        assert!(!last_emitted.is_empty());
        assert_eq!(*last_emitted.first().expect("at least one"), (3, 1.0));
    }

    #[test]
    fn reordered_session_start_is_buffered_not_skipped() {
        // seq 0 is the true session start but arrives after seq 1. A buffer
        // that inferred `expectedNext` from the first arrival would adopt 1
        // as the baseline and release it immediately, stranding seq 0.
        let mut buf: ReorderBuffer<u64> = ReorderBuffer::starting_at(0);
        let first = buf.push(1, 10, 1, 10, 120);
        assert!(first.is_empty(), "out-of-order arrival must buffer, not release");

        let second = buf.push(0, 0, 0, 10, 120);
        assert_eq!(second, vec![(0, 1.0), (1, 1.0)]);
    }

    #[test]
    fn in_order_arrival_emits_immediately() {
        let mut buf: ReorderBuffer<u64> = ReorderBuffer::new();
        for seq in 0..5u64 {
            let out = buf.push(seq, 0, seq, 0, 120);
            assert_eq!(out, vec![(seq, 1.0)]);
        }
    }
}
