//! Host-driven timer bookkeeping

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{Scheduler, TimerHandle};
use tracing::trace;

/// Scheduler that only records registrations
///
/// The driving loop (CLI or test) asks `is_active` / `active_timers` and
/// calls back into the session itself.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_handle: u64,
    active: BTreeMap<TimerHandle, Duration>,
    /// Total registrations ever made
    scheduled_total: u64,
    cancelled_total: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.active.contains_key(&handle)
    }

    pub fn interval(&self, handle: TimerHandle) -> Option<Duration> {
        self.active.get(&handle).copied()
    }

    pub fn active_timers(&self) -> usize {
        self.active.len()
    }

    pub fn scheduled_total(&self) -> u64 {
        self.scheduled_total
    }

    pub fn cancelled_total(&self) -> u64 {
        self.cancelled_total
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&mut self, interval: Duration) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.active.insert(handle, interval);
        self.scheduled_total += 1;
        trace!(?handle, ?interval, "timer scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if self.active.remove(&handle).is_some() {
            self.cancelled_total += 1;
            trace!(?handle, "timer cancelled");
        }
    }
}
