//! # Operation handle returned by `ModuleRuntime::run`.
//!
//! [`TaskHandle`] is a future resolving to the work's own result. It stays
//! awaitable after the supervisor detaches the task: detachment only withdraws
//! the supervisor's interest, never the caller's.
//!
//! Dropping the handle does not cancel the work.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::TaskError;

/// Awaitable handle to supervised work.
#[must_use = "a TaskHandle does nothing unless awaited; drop it explicitly to detach"]
pub struct TaskHandle {
    name: Arc<str>,
    join: JoinHandle<Result<(), TaskError>>,
}

impl TaskHandle {
    pub(crate) fn new(name: Arc<str>, join: JoinHandle<Result<(), TaskError>>) -> Self {
        Self { name, join }
    }

    /// Name the work was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the work (and the supervisor's bookkeeping for it) has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Future for TaskHandle {
    type Output = Result<(), TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx).map(|joined| match joined {
            Ok(res) => res,
            Err(e) if e.is_cancelled() => Err(TaskError::Canceled),
            Err(e) => Err(TaskError::Panicked {
                info: e.to_string(),
            }),
        })
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}
