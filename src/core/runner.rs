//! # Run one unit of supervised work.
//!
//! Executes the work of a [`TaskRecord`] inside its module's ambient scope,
//! contains panics, times it, settles the record and publishes lifecycle events.
//!
//! ## Event flow
//!
//! ```text
//! Success (Finite):
//!   work() → Ok(())            → [slow?] → Completed  → ModuleTaskCompleted
//!
//! Cancellation (Finite):
//!   work() → Err(Canceled)     → [slow?] → Cancelled  → ModuleTaskCancelled
//!
//! Failure / panic (any kind):
//!   work() → Err(e) | panic    → [slow?] → Faulted    → ModuleFaulted (+ error log)
//!
//! Resident:
//!   Ok / Canceled settle the record silently; faults are still reported.
//!
//! Already detached by the watchdog or wait_all:
//!   every transition fails → nothing is published
//! ```
//!
//! ## Rules
//! - The slow check runs first and only moves `Running → Slow` (Finite only).
//! - Events are published after the ambient scope ends: lifecycle events speak for
//!   the kernel and are never flood-counted against the module.
//! - The watchdog token is always released, whatever the outcome.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::context::{self, ModuleId};
use crate::error::{TaskError, panic_message};
use crate::events::{
    MessageBus, ModuleFaulted, ModuleTaskCancelled, ModuleTaskCompleted, ModuleTaskSlow,
};
use crate::tasks::{TaskKind, TaskRecord, TaskState};

/// Everything one run needs besides the work itself.
pub(crate) struct Attempt {
    pub(crate) module: ModuleId,
    pub(crate) bus: MessageBus,
    pub(crate) slow_threshold: Duration,
    pub(crate) record: Arc<TaskRecord>,
}

/// Executes `work` once and settles its record.
///
/// Returns the work's own result (a panic becomes [`TaskError::Panicked`]).
pub(crate) async fn run_once<F, Fut>(
    attempt: Attempt,
    work: F,
    cancel: CancellationToken,
) -> Result<(), TaskError>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    let started = Instant::now();
    let outcome = context::scope(
        attempt.module,
        AssertUnwindSafe(async move { work(cancel).await }).catch_unwind(),
    )
    .await;
    let elapsed = started.elapsed();

    let res = outcome.unwrap_or_else(|panic| {
        Err(TaskError::Panicked {
            info: panic_message(&*panic),
        })
    });

    attempt.settle(&res, elapsed);
    attempt.record.release_watchdog();
    res
}

impl Attempt {
    fn settle(&self, res: &Result<(), TaskError>, elapsed: Duration) {
        let finite = self.record.kind() == TaskKind::Finite;
        if finite {
            self.check_slow(elapsed);
        }

        match res {
            Ok(()) => {
                if self.record.transition(TaskState::is_live, TaskState::Completed) && finite {
                    self.bus.publish(ModuleTaskCompleted {
                        module: self.module,
                        task: self.task(),
                    });
                }
            }
            Err(TaskError::Canceled) => {
                if self.record.transition(TaskState::is_live, TaskState::Cancelled) {
                    debug!(module = %self.module, task = %self.record.name(), "task cancelled");
                    if finite {
                        self.bus.publish(ModuleTaskCancelled {
                            module: self.module,
                            task: self.task(),
                        });
                    }
                }
            }
            Err(e) => {
                if self.record.transition(TaskState::is_live, TaskState::Faulted) {
                    error!(
                        module = %self.module,
                        task = %self.record.name(),
                        error = %e,
                        label = e.as_label(),
                        "task faulted"
                    );
                    self.bus.publish(ModuleFaulted {
                        module: self.module,
                        task: self.task(),
                        error: e.clone(),
                    });
                } else {
                    debug!(
                        module = %self.module,
                        task = %self.record.name(),
                        error = %e,
                        "detached task failed after the supervisor stopped waiting"
                    );
                }
            }
        }
    }

    fn check_slow(&self, elapsed: Duration) {
        if elapsed > self.slow_threshold
            && self.record.transition(|s| s == TaskState::Running, TaskState::Slow)
        {
            self.bus.publish(ModuleTaskSlow {
                module: self.module,
                task: self.task(),
                duration: elapsed,
            });
        }
    }

    fn task(&self) -> Arc<str> {
        Arc::clone(self.record.name())
    }
}
