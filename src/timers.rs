#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TimerId(u64);

struct Entry<E> {
    id: TimerId,
    due_ms: f64,
    event: E,
}

/// Single-threaded queue of deferred events keyed by due time (milliseconds).
///
/// Events due at the same instant fire in the order they were scheduled.
pub(crate) struct TimerQueue<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<E> TimerQueue<E> {
    pub(crate) fn schedule(&mut self, due_ms: f64, event: E) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        // keep sorted by due time; equal times stay in insertion order
        let at = self.entries.partition_point(|e| e.due_ms <= due_ms);
        self.entries.insert(at, Entry { id, due_ms, event });
        id
    }

    /// Returns true if the timer was still pending.
    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|e| e.id.0 == id.0) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Pop the earliest event due at or before `now_ms`, with its due time.
    pub(crate) fn pop_due(&mut self, now_ms: f64) -> Option<(f64, E)> {
        if self.entries.first()?.due_ms > now_ms {
            return None;
        }
        let e = self.entries.remove(0);
        Some((e.due_ms, e.event))
    }

    pub(crate) fn next_due(&self) -> Option<f64> {
        self.entries.first().map(|e| e.due_ms)
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut q = TimerQueue::default();
        q.schedule(300.0, "c");
        q.schedule(100.0, "a");
        q.schedule(200.0, "b");

        assert_eq!(q.pop_due(50.0), None);
        assert_eq!(q.pop_due(250.0), Some((100.0, "a")));
        assert_eq!(q.pop_due(250.0), Some((200.0, "b")));
        assert_eq!(q.pop_due(250.0), None);
        assert_eq!(q.next_due(), Some(300.0));
    }

    #[test]
    fn ties_keep_schedule_order() {
        let mut q = TimerQueue::default();
        q.schedule(10.0, 1);
        q.schedule(10.0, 2);
        q.schedule(10.0, 3);
        let fired: Vec<i32> = std::iter::from_fn(|| q.pop_due(10.0).map(|(_, e)| e)).collect();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut q = TimerQueue::default();
        let keep = q.schedule(10.0, "keep");
        let drop = q.schedule(5.0, "drop");
        assert!(q.cancel(drop));
        assert!(!q.cancel(drop));
        assert!(q.is_pending(keep));
        assert!(!q.is_pending(drop));
        assert_eq!(q.pop_due(100.0), Some((10.0, "keep")));
        assert_eq!(q.len(), 0);
    }
}
