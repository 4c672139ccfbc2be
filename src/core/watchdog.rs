//! # Hang watchdog for finite tasks.
//!
//! One detached watchdog per finite task sleeps up to the hang threshold, racing
//! the record's watchdog token (released when the work finishes by any means, by
//! `wait_all`, or when the caller's cancel token fires).
//!
//! ```text
//! select {
//!   watchdog.cancelled() ─► exit quietly
//!   sleep(hang)          ─► still Running|Slow? ─► Hung ─► ModuleTaskHung ─► Detached
//! }
//! ```
//!
//! The work is never aborted: after detachment it keeps running in the background,
//! and its eventual result is observable only through its `TaskHandle`.

use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};
use tracing::warn;

use crate::context::ModuleId;
use crate::events::{MessageBus, ModuleTaskHung};
use crate::tasks::{TaskRecord, TaskState};

pub(crate) fn spawn(record: Arc<TaskRecord>, module: ModuleId, bus: MessageBus, hang: Duration) {
    let token = record.watchdog_token();
    tokio::spawn(async move {
        select! {
            _ = token.cancelled() => {}
            _ = time::sleep(hang) => {
                if token.is_cancelled() {
                    return;
                }
                if record.transition(TaskState::is_live, TaskState::Hung) {
                    let duration = record.elapsed();
                    warn!(
                        module = %module,
                        task = %record.name(),
                        elapsed = ?duration,
                        "task hung; supervisor detaches it"
                    );
                    bus.publish(ModuleTaskHung {
                        module,
                        task: Arc::clone(record.name()),
                        duration,
                    });
                    record.transition(|s| s == TaskState::Hung, TaskState::Detached);
                }
            }
        }
    });
}
