// src/discovery/timers.rs

use std::time::{Duration, Instant};

/// Handle for a scheduled timer; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Work the engine performs when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Check again whether the map library finished loading.
    LibraryPoll,
    /// Ask the map to re-measure its container after mounting.
    InvalidateSize,
    /// Run the newest pending marker synchronization pass.
    SyncPass,
    /// Frame all registered markers.
    FitBounds,
    /// Close the hover popup after the pointer left its marker.
    PopupClose,
    /// Re-fetch the listing collection.
    Refresh,
}

/// Shortest period a repeating timer may have; a zero period could never be re-armed past `now`.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Entry {
    id: TimerId,
    due: Instant,
    period: Option<Duration>,
    task: TimerTask,
}

/// Timer queue for the host's single-threaded event loop.
///
/// Nothing fires on its own: the host calls [`Scheduler::take_due`] (through the engine's `tick`) with the
/// current time. Every timer the discovery engine starts lives here, so teardown can cancel all of them
/// in one place.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot timer firing `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration, task: TimerTask) -> TimerId {
        self.push(now + delay, None, task)
    }

    /// Repeating timer firing every `period`, first at `now + period`, until cancelled.
    /// Periods shorter than [`MIN_PERIOD`] are raised to it.
    pub fn schedule_repeating(&mut self, now: Instant, period: Duration, task: TimerTask) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.push(now + period, Some(period), task)
    }

    fn push(&mut self, due: Instant, period: Option<Duration>, task: TimerTask) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.entries.push(Entry {
            id,
            due,
            period,
            task,
        });
        id
    }

    /// Returns `true` when the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Cancels everything and returns how many timers were pending.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.due).min()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    /// Repeating timers are re-armed one period after their previous deadline.
    pub fn take_due(&mut self, now: Instant) -> Vec<(TimerId, TimerTask)> {
        let mut due: Vec<(Instant, TimerId, TimerTask)> = Vec::new();

        self.entries.retain_mut(|e| {
            if e.due > now {
                return true;
            }
            due.push((e.due, e.id, e.task));
            match e.period {
                Some(period) => {
                    // Skip missed periods instead of firing a burst.
                    while e.due <= now {
                        e.due += period;
                    }
                    true
                }
                None => false,
            }
        });

        due.sort_by_key(|(at, id, _)| (*at, *id));
        due.into_iter().map(|(_, id, task)| (id, task)).collect()
    }
}

/// Keeps at most one pending timer for a task; re-triggering restarts the quiet period.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Option<TimerId>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(
        &mut self,
        timers: &mut Scheduler,
        now: Instant,
        delay: Duration,
        task: TimerTask,
    ) -> TimerId {
        self.cancel(timers);
        let id = timers.schedule(now, delay, task);
        self.pending = Some(id);
        id
    }

    /// Returns `true` if a pending timer was cancelled.
    pub fn cancel(&mut self, timers: &mut Scheduler) -> bool {
        match self.pending.take() {
            Some(id) => timers.cancel(id),
            None => false,
        }
    }

    /// Claims a fired timer. `false` means the timer belongs to an older trigger and must be ignored.
    pub fn fired(&mut self, id: TimerId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the handle without touching the queue; for use after `Scheduler::cancel_all`.
    pub fn forget(&mut self) {
        self.pending = None;
    }
}

/// A repeating task with an explicit stop hook.
#[derive(Debug, Default)]
pub struct PeriodicTask {
    timer: Option<TimerId>,
}

impl PeriodicTask {
    pub fn start(&mut self, timers: &mut Scheduler, now: Instant, period: Duration, task: TimerTask) {
        self.stop(timers);
        self.timer = Some(timers.schedule_repeating(now, period, task));
    }

    pub fn stop(&mut self, timers: &mut Scheduler) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
    }

    pub fn owns(&self, id: TimerId) -> bool {
        self.timer == Some(id)
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn forget(&mut self) {
        self.timer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fires_only_when_due() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        timers.schedule(t0, ms(100), TimerTask::PopupClose);

        assert!(timers.take_due(t0 + ms(99)).is_empty());
        let fired = timers.take_due(t0 + ms(100));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, TimerTask::PopupClose);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn due_timers_come_out_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        timers.schedule(t0, ms(300), TimerTask::FitBounds);
        timers.schedule(t0, ms(100), TimerTask::SyncPass);

        let tasks: Vec<_> = timers.take_due(t0 + ms(500)).into_iter().map(|(_, t)| t).collect();
        assert_eq!(tasks, vec![TimerTask::SyncPass, TimerTask::FitBounds]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        let id = timers.schedule(t0, ms(10), TimerTask::FitBounds);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.take_due(t0 + ms(50)).is_empty());
    }

    #[test]
    fn repeating_timer_rearms_without_bursting() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        let id = timers.schedule_repeating(t0, ms(100), TimerTask::Refresh);

        assert_eq!(timers.take_due(t0 + ms(350)).len(), 1);
        assert!(timers.is_pending(id));
        assert_eq!(timers.next_due(), Some(t0 + ms(400)));
        assert_eq!(timers.take_due(t0 + ms(400)).len(), 1);
    }

    #[test]
    fn zero_period_is_raised_to_the_minimum() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        timers.schedule_repeating(t0, Duration::ZERO, TimerTask::Refresh);

        assert_eq!(timers.next_due(), Some(t0 + MIN_PERIOD));
        assert_eq!(timers.take_due(t0 + MIN_PERIOD).len(), 1);
        assert_eq!(timers.next_due(), Some(t0 + MIN_PERIOD * 2));
    }

    #[test]
    fn debouncer_coalesces_triggers() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        let mut debounce = Debouncer::new();

        let first = debounce.trigger(&mut timers, t0, ms(250), TimerTask::FitBounds);
        let second = debounce.trigger(&mut timers, t0 + ms(100), ms(250), TimerTask::FitBounds);
        assert_eq!(timers.pending(), 1);

        assert!(timers.take_due(t0 + ms(300)).is_empty());
        let fired = timers.take_due(t0 + ms(350));
        assert_eq!(fired.len(), 1);
        assert!(!debounce.fired(first));
        assert!(debounce.fired(second));
        assert!(!debounce.is_armed());
    }

    #[test]
    fn periodic_task_stops() {
        let t0 = Instant::now();
        let mut timers = Scheduler::new();
        let mut refresh = PeriodicTask::default();
        refresh.start(&mut timers, t0, ms(1000), TimerTask::Refresh);
        assert!(refresh.is_running());

        refresh.stop(&mut timers);
        assert!(!refresh.is_running());
        assert!(timers.take_due(t0 + ms(5000)).is_empty());
    }
}
