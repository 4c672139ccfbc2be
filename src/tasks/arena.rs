//! # Slot arena for tracked task records.
//!
//! Records are never removed on completion; instead settled records are swept
//! periodically (every `sweep_every` insertions) and during `wait_all`. Freed
//! slots are reused, trailing empty slots are truncated, so memory follows the
//! number of live tasks rather than the number ever accepted.
//!
//! ```text
//! slots: [ r0 | ·  | r2 | ·  | r4 ]     free: [1, 3]
//! insert(r5) ─► slots[3] = r5           free: [1]
//! sweep()    ─► settled r0, r2 dropped  free: [1, 0, 2]
//! ```

use std::sync::Arc;

use super::TaskRecord;

pub(crate) struct TaskArena {
    slots: Vec<Option<Arc<TaskRecord>>>,
    free: Vec<usize>,
    sweep_every: Option<usize>,
    since_sweep: usize,
}

impl TaskArena {
    pub(crate) fn new(sweep_every: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            sweep_every,
            since_sweep: 0,
        }
    }

    /// Tracks `record`, sweeping first when the interval is reached.
    pub(crate) fn insert(&mut self, record: Arc<TaskRecord>) {
        if self.sweep_every.is_some_and(|n| self.since_sweep >= n) {
            self.sweep();
        }
        self.since_sweep += 1;

        match self.free.pop() {
            Some(idx) => self.slots[idx] = Some(record),
            None => self.slots.push(Some(record)),
        }
    }

    /// Drops settled records; returns how many were released.
    pub(crate) fn sweep(&mut self) -> usize {
        self.since_sweep = 0;
        let mut swept = 0;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|r| r.state().is_settled()) {
                if let Some(record) = slot.take() {
                    record.release_watchdog();
                }
                self.free.push(idx);
                swept += 1;
            }
        }

        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let len = self.slots.len();
        self.free.retain(|&idx| idx < len);
        swept
    }

    /// Every tracked record, in slot order.
    pub(crate) fn records(&self) -> Vec<Arc<TaskRecord>> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Cancels every tracked record's watchdog.
    pub(crate) fn release_watchdogs(&self) {
        for record in self.slots.iter().flatten() {
            record.release_watchdog();
        }
    }

    /// Number of tracked records.
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Number of allocated slots (tracked + free).
    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskKind, TaskState};
    use tokio_util::sync::CancellationToken;

    fn record(name: &str) -> Arc<TaskRecord> {
        Arc::new(TaskRecord::new(
            name.into(),
            TaskKind::Finite,
            CancellationToken::new(),
        ))
    }

    #[test]
    fn test_sweep_keeps_live_records() {
        let mut arena = TaskArena::new(None);
        let done = record("done");
        let live = record("live");
        arena.insert(Arc::clone(&done));
        arena.insert(Arc::clone(&live));

        done.transition(TaskState::is_live, TaskState::Completed);
        assert_eq!(arena.sweep(), 1);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.records()[0].name().as_ref(), "live");
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut arena = TaskArena::new(None);
        let a = record("a");
        let b = record("b");
        arena.insert(Arc::clone(&a));
        arena.insert(Arc::clone(&b));

        a.transition(TaskState::is_live, TaskState::Cancelled);
        arena.sweep();
        arena.insert(record("c"));

        assert_eq!(arena.capacity(), 2);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_periodic_sweep_bounds_history() {
        let mut arena = TaskArena::new(Some(4));
        for i in 0..100 {
            let r = record(&format!("t{i}"));
            r.transition(TaskState::is_live, TaskState::Completed);
            arena.insert(r);
        }
        assert!(arena.capacity() <= 5, "capacity {}", arena.capacity());
    }

    #[test]
    fn test_sweep_releases_watchdog() {
        let mut arena = TaskArena::new(None);
        let r = record("r");
        let token = r.watchdog_token();
        arena.insert(Arc::clone(&r));
        r.transition(TaskState::is_live, TaskState::Faulted);
        arena.sweep();
        assert!(token.is_cancelled());
    }
}
