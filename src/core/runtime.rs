//! # ModuleRuntime: per-module task supervisor.
//!
//! A [`ModuleRuntime`] starts tracked work for one module, runs a watchdog per
//! finite task, reports lifecycle through the shared [`MessageBus`], and offers a
//! time-bounded [`wait_all`](ModuleRuntime::wait_all) for shutdown.
//!
//! ## Architecture
//! ```text
//! run(name, kind, work, cancel)
//!   ├─► TaskRecord(Running) ──► arena (tracked before the work starts)
//!   ├─► tokio::spawn(runner::run_once)        scope(module) → work(cancel) → settle → publish
//!   └─► Finite: watchdog::spawn               sleep(hang) vs record.watchdog → Hung → Detached
//!
//! wait_all(grace)
//!   ├─► snapshot Finite ∧ {Running, Slow}
//!   ├─► join_all(settled) raced against grace
//!   ├─► still live → Detached + ModuleTaskAbandoned
//!   └─► release watchdogs, sweep arena
//! ```
//!
//! ## Rules
//! - The supervisor never aborts work; it only stops waiting on it.
//! - `cancel` is the cooperative contract with the work; the watchdog token is a
//!   child of it and only ever stops the watchdog.
//! - The arena guard is never held across an await or a publish.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::{self, ModuleId};
use crate::core::config::KernelConfig;
use crate::core::{runner, watchdog};
use crate::error::{RuntimeError, TaskError};
use crate::events::{Message, MessageBus, ModuleTaskAbandoned, Subscription};
use crate::tasks::{TaskArena, TaskHandle, TaskKind, TaskRecord, TaskSnapshot, TaskState};

pub(crate) struct RuntimeShared {
    module: ModuleId,
    bus: MessageBus,
    slow_threshold: Duration,
    hang_threshold: Duration,
    tasks: Mutex<TaskArena>,
    lifetime: CancellationToken,
}

/// Supervisor handle for one module. Cheap to clone.
#[derive(Clone)]
pub struct ModuleRuntime {
    shared: Arc<RuntimeShared>,
}

/// Non-owning reference held by module-tier subscriptions.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeShared>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<ModuleRuntime> {
        self.0.upgrade().map(|shared| ModuleRuntime { shared })
    }
}

impl ModuleRuntime {
    /// Creates a runtime for `module` publishing on `bus`.
    pub fn new(module: ModuleId, bus: MessageBus, cfg: &KernelConfig) -> Self {
        Self {
            shared: Arc::new(RuntimeShared {
                module,
                bus,
                slow_threshold: cfg.slow_threshold,
                hang_threshold: cfg.hang_threshold,
                tasks: Mutex::new(TaskArena::new(cfg.sweep_interval())),
                lifetime: CancellationToken::new(),
            }),
        }
    }

    /// The module this runtime supervises.
    pub fn module(&self) -> ModuleId {
        self.shared.module
    }

    /// The shared bus.
    pub fn bus(&self) -> &MessageBus {
        &self.shared.bus
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    pub fn lifetime_token(&self) -> CancellationToken {
        self.shared.lifetime.clone()
    }

    /// Starts `work` under supervision and returns its handle.
    ///
    /// The record exists (in `Running`) before `work` is first polled. `work`
    /// runs on its own tokio task with this runtime's module as the ambient module.
    /// Returning `Err(TaskError::Canceled)` reports a cancellation; any other error
    /// or a panic reports a fault.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F, Fut>(
        &self,
        name: impl Into<Arc<str>>,
        kind: TaskKind,
        work: F,
        cancel: CancellationToken,
    ) -> TaskHandle
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let name = name.into();
        let record = Arc::new(TaskRecord::new(Arc::clone(&name), kind, cancel.child_token()));
        self.shared.tasks.lock().insert(Arc::clone(&record));

        let attempt = runner::Attempt {
            module: self.shared.module,
            bus: self.shared.bus.clone(),
            slow_threshold: self.shared.slow_threshold,
            record: Arc::clone(&record),
        };
        let join = tokio::spawn(runner::run_once(attempt, work, cancel));

        if kind == TaskKind::Finite {
            watchdog::spawn(
                record,
                self.shared.module,
                self.shared.bus.clone(),
                self.shared.hang_threshold,
            );
        }
        TaskHandle::new(name, join)
    }

    /// Fire-and-forget finite work bound to this runtime's lifetime token.
    pub fn spawn<F, Fut>(&self, name: impl Into<Arc<str>>, work: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let token = self.shared.lifetime.child_token();
        drop(self.run(name, TaskKind::Finite, work, token));
    }

    /// Publishes `message` attributed to this module.
    pub fn publish<T: Message>(&self, message: T) {
        context::sync_scope(self.shared.module, || self.shared.bus.publish(message));
    }

    /// Subscribes a handler supervised by this runtime (see [`MessageBus::subscribe_module`]).
    pub fn subscribe<T, F, Fut>(&self, task: impl Into<Arc<str>>, handler: F) -> Subscription
    where
        T: Message,
        F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.shared.bus.subscribe_module(self, task, handler)
    }

    /// Diagnostics view of every tracked task.
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        let records = self.shared.tasks.lock().records();
        records.iter().map(|r| r.snapshot()).collect()
    }

    /// Number of tracked tasks that are still live.
    pub fn live_count(&self) -> usize {
        let records = self.shared.tasks.lock().records();
        records.iter().filter(|r| r.state().is_live()).count()
    }

    /// Waits for outstanding finite work, giving up after `grace`.
    ///
    /// Every finite task still live when the wait ends is detached and reported as
    /// [`ModuleTaskAbandoned`]; the returned error lists them. With `Some(grace)`
    /// this always returns within `grace`, however many tasks are hung.
    pub async fn wait_all(&self, grace: Option<Duration>) -> Result<(), RuntimeError> {
        let pending: Vec<Arc<TaskRecord>> = {
            let records = self.shared.tasks.lock().records();
            records
                .into_iter()
                .filter(|r| r.kind() == TaskKind::Finite && r.state().is_live())
                .collect()
        };

        if !pending.is_empty() {
            let all = join_all(pending.iter().map(|r| r.settled()));
            match grace {
                Some(grace) => {
                    if tokio::time::timeout(grace, all).await.is_err() {
                        debug!(module = %self.shared.module, ?grace, "grace elapsed with work outstanding");
                    }
                }
                None => {
                    all.await;
                }
            }
        }

        let mut abandoned = Vec::new();
        for record in &pending {
            if record.transition(TaskState::is_live, TaskState::Detached) {
                warn!(
                    module = %self.shared.module,
                    task = %record.name(),
                    elapsed = ?record.elapsed(),
                    "abandoning task"
                );
                self.shared.bus.publish(ModuleTaskAbandoned {
                    module: self.shared.module,
                    task: Arc::clone(record.name()),
                });
                abandoned.push(record.name().to_string());
            }
        }

        {
            let mut arena = self.shared.tasks.lock();
            arena.release_watchdogs();
            arena.sweep();
        }

        if abandoned.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::GraceExceeded {
                grace: grace.unwrap_or_default(),
                abandoned,
            })
        }
    }

    /// Cancels the lifetime token (cooperative stop for resident loops and `spawn`ed work).
    pub fn shutdown(&self) {
        self.shared.lifetime.cancel();
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.shared))
    }
}

impl std::fmt::Debug for ModuleRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRuntime")
            .field("module", &self.shared.module)
            .field("tracked", &self.shared.tasks.lock().len())
            .finish()
    }
}
