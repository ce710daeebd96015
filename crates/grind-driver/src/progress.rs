//! Lock-free per-epoch progress tracking
//!
//! An epoch is a checkpoint boundary defined as a fraction of the total
//! operation count: with `reports_per_ops = N`, epoch `k` is the completion
//! of `k * final_edges / N` operations. Each slot stores the elapsed
//! microseconds since the experiment started at the moment the threshold
//! was first crossed; the first writer wins, so the series is monotonic by
//! construction.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

pub struct ProgressTracker {
    slots: Vec<AtomicU64>,
    reports_per_ops: u64,
    final_edges: u64,
    origin: Instant,
    /// Microseconds between `origin` and the experiment start
    start_offset_us: AtomicU64,
    /// Lowest slot that may still be unclaimed, advance hint only
    fill_hint: AtomicUsize,
}

impl ProgressTracker {
    pub fn new(total_operations: u64, final_edges: u64, reports_per_ops: u64) -> Self {
        let final_edges = final_edges.max(1);
        let reports_per_ops = reports_per_ops.max(1);
        // The +1 keeps small graphs safe when the division is exact.
        let num_slots = total_operations.div_ceil(final_edges) * reports_per_ops + 1;
        let slots = (0..num_slots).map(|_| AtomicU64::new(0)).collect();
        Self {
            slots,
            reports_per_ops,
            final_edges,
            origin: Instant::now(),
            start_offset_us: AtomicU64::new(0),
            fill_hint: AtomicUsize::new(1),
        }
    }

    /// Re-base the elapsed clock; called once when the experiment begins
    pub fn mark_start(&self) {
        self.start_offset_us
            .store(self.origin.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    fn elapsed_us(&self) -> u64 {
        let now = self.origin.elapsed().as_micros() as u64;
        now.saturating_sub(self.start_offset_us.load(Ordering::Relaxed))
    }

    /// Epoch index reached after `completed_ops` operations
    fn epoch(&self, completed_ops: u64) -> usize {
        let epoch = completed_ops.saturating_mul(self.reports_per_ops) / self.final_edges;
        (epoch as usize).min(self.slots.len() - 1)
    }

    /// Record that `completed_ops` operations have finished.
    ///
    /// Claims every newly crossed epoch slot with the current elapsed time;
    /// slots already claimed by an earlier writer are left untouched.
    pub fn record(&self, completed_ops: u64) {
        let epoch = self.epoch(completed_ops);
        let first = self.fill_hint.load(Ordering::Relaxed).max(1);
        if first > epoch {
            return;
        }
        let elapsed = self.elapsed_us().max(1);
        for slot in &self.slots[first..=epoch] {
            let _ = slot.compare_exchange(0, elapsed, Ordering::Relaxed, Ordering::Relaxed);
        }
        self.fill_hint.fetch_max(epoch + 1, Ordering::Relaxed);
    }

    /// Snapshot of the populated prefix, excluding the unused slot 0
    pub fn snapshot(&self) -> Vec<u64> {
        self.slots[1..]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .take_while(|&value| value != 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_array_for_small_graphs() {
        // 100 ops over 10 final edges, 4 reports each: 41 slots.
        let tracker = ProgressTracker::new(100, 10, 4);
        assert_eq!(tracker.slots.len(), 41);
    }

    #[test]
    fn populates_every_crossed_epoch() {
        let tracker = ProgressTracker::new(100, 10, 4);
        tracker.mark_start();
        for completed in (10..=100).step_by(10) {
            tracker.record(completed);
        }
        // 100 * 4 / 10 = 40 populated entries.
        let series = tracker.snapshot();
        assert_eq!(series.len(), 40);
        assert!(series.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn first_writer_wins() {
        let tracker = ProgressTracker::new(10, 10, 1);
        tracker.mark_start();
        tracker.record(10);
        let first = tracker.snapshot();
        std::thread::sleep(std::time::Duration::from_millis(2));
        tracker.record(10);
        assert_eq!(tracker.snapshot(), first);
    }

    #[test]
    fn zero_final_edges_does_not_divide_by_zero() {
        let tracker = ProgressTracker::new(0, 0, 1);
        tracker.record(0);
        assert!(tracker.snapshot().is_empty());
    }
}
