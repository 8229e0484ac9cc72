//! Deferred callback service
//!
//! One-shot callbacks scheduled in logical ticks. Registration is
//! thread-safe (`defer` may be called from any thread), but firing is not
//! concurrent: the consumer thread calls [`TimerManager::step`] exactly once
//! per tick and runs whatever expired. Centralizing deferred work here keeps
//! every timer-driven state mutation serialized with the rest of the stack.
//!
//! At the reference cadence one logical tick is one TTI (1 ms), so delays
//! written in milliseconds read naturally.

use std::sync::Mutex;

/// Handle identifying a scheduled callback, usable for best-effort cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEntry<C> {
    id: u64,
    fires_at: u64,
    callback: Box<dyn FnOnce(&mut C) + Send>,
}

struct TimerInner<C> {
    now: u64,
    next_id: u64,
    entries: Vec<TimerEntry<C>>,
}

/// One-shot deferred callback scheduler.
///
/// `C` is the context handed to callbacks when they fire (the protocol core
/// in production; anything convenient in tests).
pub struct TimerManager<C> {
    inner: Mutex<TimerInner<C>>,
}

impl<C> Default for TimerManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TimerManager<C> {
    /// Creates an empty timer service at logical time zero.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TimerInner {
                now: 0,
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerInner<C>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Schedules `callback` to fire once `delay_ticks` ticks have elapsed.
    ///
    /// Callable from any thread. A delay of zero fires on the next `step`.
    pub fn defer(
        &self,
        delay_ticks: u32,
        callback: impl FnOnce(&mut C) + Send + 'static,
    ) -> TimerId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let fires_at = inner.now + u64::from(delay_ticks);
        inner.entries.push(TimerEntry {
            id,
            fires_at,
            callback: Box::new(callback),
        });
        TimerId(id)
    }

    /// Best-effort cancel; no-op if the timer already fired.
    pub fn cancel(&self, id: TimerId) {
        self.lock().entries.retain(|e| e.id != id.0);
    }

    /// Advances logical time by one tick and returns the callbacks whose
    /// deadline elapsed, in registration order.
    ///
    /// Must be invoked exactly once per tick, only by the consumer thread.
    /// The caller runs the returned callbacks; a fired entry is gone.
    pub fn step(&self) -> Vec<Box<dyn FnOnce(&mut C) + Send>> {
        let mut inner = self.lock();
        inner.now += 1;
        let now = inner.now;

        let mut fired = Vec::new();
        let mut remaining = Vec::with_capacity(inner.entries.len());
        for entry in inner.entries.drain(..) {
            if entry.fires_at <= now {
                fired.push(entry.callback);
            } else {
                remaining.push(entry);
            }
        }
        inner.entries = remaining;
        fired
    }

    /// Number of pending (not yet fired) timers.
    pub fn pending(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn run_all(fired: Vec<Box<dyn FnOnce(&mut Vec<u16>) + Send>>, log: &mut Vec<u16>) {
        for cb in fired {
            cb(log);
        }
    }

    #[test]
    fn test_defer_fires_after_delay() {
        let timers: TimerManager<Vec<u16>> = TimerManager::new();
        let mut log = Vec::new();

        timers.defer(3, |log| log.push(1));

        run_all(timers.step(), &mut log);
        run_all(timers.step(), &mut log);
        assert!(log.is_empty());

        run_all(timers.step(), &mut log);
        assert_eq!(log, vec![1]);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn test_fires_at_most_once() {
        let timers: TimerManager<Vec<u16>> = TimerManager::new();
        let mut log = Vec::new();

        timers.defer(1, |log| log.push(7));
        for _ in 0..5 {
            run_all(timers.step(), &mut log);
        }
        assert_eq!(log, vec![7]);
    }

    #[test]
    fn test_zero_delay_fires_next_step() {
        let timers: TimerManager<Vec<u16>> = TimerManager::new();
        let mut log = Vec::new();

        timers.defer(0, |log| log.push(3));
        run_all(timers.step(), &mut log);
        assert_eq!(log, vec![3]);
    }

    #[test]
    fn test_cancel_is_best_effort() {
        let timers: TimerManager<Vec<u16>> = TimerManager::new();
        let mut log = Vec::new();

        let keep = timers.defer(2, |log| log.push(1));
        let cancelled = timers.defer(2, |log| log.push(2));
        timers.cancel(cancelled);

        run_all(timers.step(), &mut log);
        run_all(timers.step(), &mut log);
        assert_eq!(log, vec![1]);

        // cancelling an already-fired timer is a no-op
        timers.cancel(keep);
    }

    #[test]
    fn test_same_deadline_fires_in_registration_order() {
        let timers: TimerManager<Vec<u16>> = TimerManager::new();
        let mut log = Vec::new();

        timers.defer(1, |log| log.push(1));
        timers.defer(1, |log| log.push(2));
        timers.defer(1, |log| log.push(3));

        run_all(timers.step(), &mut log);
        assert_eq!(log, vec![1, 2, 3]);
    }

    #[test]
    fn test_defer_from_other_thread() {
        let timers: Arc<TimerManager<Vec<u16>>> = Arc::new(TimerManager::new());
        let mut log = Vec::new();

        let timers2 = Arc::clone(&timers);
        std::thread::spawn(move || {
            timers2.defer(1, |log| log.push(42));
        })
        .join()
        .unwrap();

        run_all(timers.step(), &mut log);
        assert_eq!(log, vec![42]);
    }
}
