//! Delayed controller actions with cancelable handles.
//!
//! Timers are polled, not threaded: the page loop calls
//! [`TimerQueue::take_due`] and runs whatever has come due.

use crate::core::time::EpochMillis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Resume a saved "playing" mode after page load
    ResumePlayback,
    /// Re-read persisted state after the page becomes visible
    RestoreState,
}

#[derive(Debug, Clone)]
struct Timer {
    handle: TimerHandle,
    due: EpochMillis,
    action: TimerAction,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: Vec<Timer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `action` once `delay_ms` has passed since `now`
    pub fn schedule(
        &mut self,
        now: EpochMillis,
        delay_ms: EpochMillis,
        action: TimerAction,
    ) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.push(Timer {
            handle,
            due: now.saturating_add(delay_ms.max(0)),
            action,
        });
        handle
    }

    /// Returns false if the timer already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|timer| timer.handle != handle);
        self.pending.len() != before
    }

    /// Remove and return every action due at `now`, earliest first
    pub fn take_due(&mut self, now: EpochMillis) -> Vec<TimerAction> {
        let (mut due, pending): (Vec<Timer>, Vec<Timer>) =
            self.pending.drain(..).partition(|timer| timer.due <= now);
        self.pending = pending;
        due.sort_by_key(|timer| (timer.due, timer.handle.0));
        due.into_iter().map(|timer| timer.action).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
