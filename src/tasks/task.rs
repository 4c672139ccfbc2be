//! # Supervised-task record and its state machine.
//!
//! A [`TaskRecord`] is created the instant a runtime accepts work, before the work
//! starts, so its state is observable immediately. The worker and the watchdog
//! mutate the state concurrently; every transition is a compare-and-set on a
//! [`watch`] channel, so exactly one side wins and waiters wake on settle.
//!
//! ## State machine
//! ```text
//!            ┌──► Slow ──┬──► Completed
//! Running ───┤           ├──► Cancelled
//!            │           └──► Faulted
//!            ├─(watchdog)──► Hung ──► Detached
//!            └─(wait_all grace elapsed)──► Detached
//! ```
//!
//! ## Rules
//! - `Completed`, `Cancelled`, `Faulted`, `Detached` never transition again.
//! - `Slow` is transient: the terminal state overwrites it in the same continuation.
//! - `Hung` immediately becomes `Detached`; a detached task is never reported again,
//!   even if its work later returns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How long a unit of work is expected to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Bounded work: slow/hung detection and terminal-state events.
    Finite,
    /// Runs for the module's lifetime: no slow/hung detection, no terminal-state events.
    Resident,
}

/// Supervisor-visible state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Slow,
    Completed,
    Cancelled,
    Faulted,
    Hung,
    Detached,
}

impl TaskState {
    /// `Running` or `Slow`: the supervisor still considers the work outstanding.
    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, TaskState::Running | TaskState::Slow)
    }

    /// Terminal for bookkeeping.
    #[inline]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Cancelled | TaskState::Faulted | TaskState::Detached
        )
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Running => "running",
            TaskState::Slow => "slow",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
            TaskState::Faulted => "faulted",
            TaskState::Hung => "hung",
            TaskState::Detached => "detached",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Point-in-time view of a tracked task, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub name: Arc<str>,
    pub kind: TaskKind,
    pub state: TaskState,
}

/// One tracked unit of work.
pub(crate) struct TaskRecord {
    name: Arc<str>,
    kind: TaskKind,
    state: watch::Sender<TaskState>,
    watchdog: CancellationToken,
    accepted: Instant,
}

impl TaskRecord {
    /// `watchdog` stops the watchdog only; it never cancels the work.
    pub(crate) fn new(name: Arc<str>, kind: TaskKind, watchdog: CancellationToken) -> Self {
        let (state, _) = watch::channel(TaskState::Running);
        Self {
            name,
            kind,
            state,
            watchdog,
            accepted: Instant::now(),
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Time since the runtime accepted the work.
    pub(crate) fn elapsed(&self) -> Duration {
        self.accepted.elapsed()
    }

    /// Moves to `to` if the current state satisfies `from`; returns whether it moved.
    pub(crate) fn transition(&self, from: impl FnOnce(TaskState) -> bool, to: TaskState) -> bool {
        self.state.send_if_modified(|state| {
            if from(*state) {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once the record reaches a settled state.
    pub(crate) async fn settled(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| s.is_settled()).await;
    }

    pub(crate) fn watchdog_token(&self) -> CancellationToken {
        self.watchdog.clone()
    }

    pub(crate) fn release_watchdog(&self) {
        self.watchdog.cancel();
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            name: Arc::clone(&self.name),
            kind: self.kind,
            state: self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TaskRecord {
        TaskRecord::new("work".into(), TaskKind::Finite, CancellationToken::new())
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let r = record();
        assert!(r.transition(TaskState::is_live, TaskState::Completed));
        assert!(!r.transition(TaskState::is_live, TaskState::Detached));
        assert_eq!(r.state(), TaskState::Completed);
    }

    #[test]
    fn test_slow_is_overwritten_by_terminal() {
        let r = record();
        assert!(r.transition(|s| s == TaskState::Running, TaskState::Slow));
        assert!(!r.transition(|s| s == TaskState::Running, TaskState::Slow));
        assert!(r.transition(TaskState::is_live, TaskState::Faulted));
        assert_eq!(r.state(), TaskState::Faulted);
    }

    #[test]
    fn test_detached_blocks_late_completion() {
        let r = record();
        assert!(r.transition(TaskState::is_live, TaskState::Hung));
        assert!(r.transition(|s| s == TaskState::Hung, TaskState::Detached));
        assert!(!r.transition(TaskState::is_live, TaskState::Completed));
        assert!(r.state().is_settled());
    }

    #[tokio::test]
    async fn test_settled_wakes_waiter() {
        let r = Arc::new(record());
        let waiter = {
            let r = Arc::clone(&r);
            tokio::spawn(async move { r.settled().await })
        };
        tokio::task::yield_now().await;
        r.transition(TaskState::is_live, TaskState::Cancelled);
        waiter.await.unwrap();
    }
}
