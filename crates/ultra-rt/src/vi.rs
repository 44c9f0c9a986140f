use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::mailbox::MailboxRegistry;

/// Retrace countdown owned by the timing thread.
///
/// `retrace_count` is the interval currently in effect. An interval set by
/// a new VI registration is picked up when `remaining` reaches zero, not
/// mid-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViTiming {
    pub retrace_count: u32,
    pub remaining: u32,
}

impl ViTiming {
    pub fn new() -> Self {
        Self {
            retrace_count: 1,
            remaining: 1,
        }
    }

    /// Count one retrace. True when the VI message is due this retrace.
    pub fn count_retrace(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    /// Reload the countdown after a due retrace. `interval` must be sampled
    /// in the same registry critical section as the delivery.
    pub fn reload(&mut self, interval: u32) {
        self.retrace_count = interval.max(1);
        self.remaining = self.retrace_count;
    }
}

impl Default for ViTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Double-buffered framebuffer origins. `current` lags `next` by however
/// many swaps are still queued behind the dispatch thread.
pub struct FramebufferState {
    current: AtomicU32,
    next: AtomicU32,
}

impl FramebufferState {
    pub fn new() -> Self {
        Self {
            current: AtomicU32::new(0),
            next: AtomicU32::new(0),
        }
    }

    /// Framebuffer the screen is showing.
    pub fn current(&self) -> u32 {
        self.current.load(Ordering::Relaxed)
    }

    /// Framebuffer most recently swapped in by the guest.
    pub fn next(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    pub(crate) fn set_current(&self, vaddr: u32) {
        self.current.store(vaddr, Ordering::Relaxed);
    }

    pub(crate) fn set_next(&self, vaddr: u32) {
        self.next.store(vaddr, Ordering::Relaxed);
    }
}

impl Default for FramebufferState {
    fn default() -> Self {
        Self::new()
    }
}

/// One retrace interval in microseconds at the given speed. 60 retraces
/// per second at 100%.
pub fn retrace_period_micros(speed_percent: u32) -> u64 {
    100_000_000 / (60 * speed_percent.max(1) as u64)
}

/// Wall-clock deadline of retrace `n`, counted from `start`.
///
/// Always a direct multiple of the period from the epoch; deadlines are
/// never derived from the previous wake time, so late wakes cannot
/// accumulate into drift.
pub fn retrace_deadline(start: Instant, n: u64, speed_percent: u32) -> Instant {
    start + Duration::from_micros(n.saturating_mul(retrace_period_micros(speed_percent)))
}

/// How many whole retrace periods fit in `elapsed`, plus the one now due.
pub fn elapsed_retraces(elapsed: Duration, speed_percent: u32) -> u64 {
    (elapsed.as_micros() / retrace_period_micros(speed_percent) as u128) as u64 + 1
}

/// Timing thread body: sleep to each retrace deadline, deliver the VI and
/// AI messages, and jump the retrace counter forward when the host stalls
/// past one or more deadlines.
pub(crate) fn run_vi_loop(
    registry: &MailboxRegistry,
    speed_percent: u32,
    shutdown: &Receiver<()>,
) {
    let start = Instant::now();
    let mut timing = ViTiming::new();
    let mut total_retraces: u64 = 0;

    log::info!("VI timing thread running at {}% speed", speed_percent);

    loop {
        let deadline = retrace_deadline(start, total_retraces, speed_percent);
        match shutdown.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        // A stall can push us past several deadlines; skip the missed
        // retraces instead of bursting them back to back.
        let new_total = elapsed_retraces(start.elapsed(), speed_percent);
        if new_total > total_retraces + 1 {
            log::debug!(
                "VI timing fell behind, skipped {} retraces",
                new_total - total_retraces - 1
            );
        }
        total_retraces = new_total;

        let vi_due = timing.count_retrace();
        let interval = registry.deliver_retrace(vi_due);
        if vi_due {
            timing.reload(interval);
        }
    }

    log::info!("VI timing thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesg::OsMesgQueue;
    use std::sync::Arc;

    #[test]
    fn interval_one_fires_every_retrace() {
        let mut timing = ViTiming::new();
        for _ in 0..5 {
            assert!(timing.count_retrace());
            timing.reload(1);
        }
    }

    #[test]
    fn interval_two_fires_every_second_retrace() {
        let mut timing = ViTiming::new();
        timing.reload(2);
        assert!(!timing.count_retrace());
        assert!(timing.count_retrace());
        timing.reload(2);
        assert!(!timing.count_retrace());
        assert!(timing.count_retrace());
    }

    #[test]
    fn interval_five_counts_down_from_reload() {
        let mut timing = ViTiming::new();
        timing.reload(5);
        for _ in 0..4 {
            assert!(!timing.count_retrace());
        }
        assert!(timing.count_retrace());
    }

    #[test]
    fn new_interval_applies_at_next_expiry() {
        let registry = MailboxRegistry::new();
        let queue = Arc::new(OsMesgQueue::new(8));
        registry.register_vi(Arc::clone(&queue), 1, 2);

        let mut timing = ViTiming::new();
        timing.reload(2);

        // Mid-cycle re-registration with a longer interval.
        assert!(!timing.count_retrace());
        registry.register_vi(Arc::clone(&queue), 1, 5);

        // The in-flight cycle still completes on the old interval.
        assert!(timing.count_retrace());
        let interval = registry.deliver_retrace(true);
        timing.reload(interval);
        assert_eq!(timing.retrace_count, 5);

        for _ in 0..4 {
            assert!(!timing.count_retrace());
        }
        assert!(timing.count_retrace());
    }

    #[test]
    fn deadlines_are_exact_period_multiples() {
        let start = Instant::now();
        let period = retrace_period_micros(100);
        for n in [1u64, 60, 1_000, 10_000] {
            let deadline = retrace_deadline(start, n, 100);
            assert_eq!(deadline - start, Duration::from_micros(n * period));
        }
    }

    #[test]
    fn ten_thousand_deadlines_accumulate_no_drift() {
        let start = Instant::now();
        let period = retrace_period_micros(100);
        let mut accumulated = start;
        for _ in 0..10_000 {
            accumulated += Duration::from_micros(period);
        }
        assert_eq!(retrace_deadline(start, 10_000, 100), accumulated);
    }

    #[test]
    fn wake_at_deadline_advances_exactly_one_retrace() {
        let period = retrace_period_micros(100);
        for n in 1..=1_000u64 {
            let at_deadline = Duration::from_micros(n * period);
            assert_eq!(elapsed_retraces(at_deadline, 100), n + 1);
            let just_before = Duration::from_micros(n * period - 1);
            assert_eq!(elapsed_retraces(just_before, 100), n);
        }
    }

    #[test]
    fn double_speed_halves_the_period() {
        assert_eq!(retrace_period_micros(200) * 2, retrace_period_micros(100));
    }

    #[test]
    fn zero_speed_behaves_as_one_percent() {
        assert_eq!(retrace_period_micros(0), retrace_period_micros(1));
    }

    #[test]
    fn framebuffer_state_tracks_current_and_next() {
        let fb = FramebufferState::new();
        assert_eq!(fb.current(), 0);
        assert_eq!(fb.next(), 0);
        fb.set_next(0x8010_0000);
        fb.set_current(0x8020_0000);
        assert_eq!(fb.next(), 0x8010_0000);
        assert_eq!(fb.current(), 0x8020_0000);
    }
}
