//! # Kernel: hosts modules, drives their lifecycle hooks and bounds shutdown.
//!
//! The [`Kernel`] owns the shared [`MessageBus`], one [`ModuleRuntime`] per module,
//! and the host loop. Every hook (`start`, `tick`, `stop`) runs as a Finite
//! supervised task on the module's own runtime, so hook misbehavior is reported the
//! same way as any other module work.
//!
//! ## High-level architecture
//! ```text
//! run():
//!   publish(KernelStarting)
//!   for module in registration order:
//!       rt.run("start") ──► await up to hang_threshold ──► ModuleStarted
//!   publish(KernelStarted)
//!
//!   loop select {
//!       shutdown_token.cancelled()  ─► break
//!       os signal (if enabled)      ─► break
//!       interval(tick_interval)     ─► rt.run("tick") per started module
//!                                      (skipped while the previous tick runs)
//!   }
//!
//!   publish(KernelStopping)
//!   join_all(modules):                                    (concurrent, bounded by grace)
//!       rt.shutdown() ─► rt.run("stop") ─► rt.wait_all(grace) ─► ModuleStopped
//!   publish(KernelStopped)
//!   └─► Err(GraceExceeded) listing "Module/task" for every abandoned task
//! ```
//!
//! ## Rules
//! - Kernel lifecycle events are published outside any module scope.
//! - A module whose `start` failed is never ticked but is still stopped.
//! - A `start` that outlives the hang threshold is left running; the kernel moves on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::ModuleId;
use crate::core::{KernelBuilder, KernelConfig, Module, ModuleRuntime, shutdown};
use crate::error::RuntimeError;
use crate::events::{
    KernelStarted, KernelStarting, KernelStopped, KernelStopping, MessageBus, ModuleStarted,
    ModuleStopped,
};
use crate::subscribers::LogWriter;
use crate::tasks::{TaskHandle, TaskKind};

pub(crate) struct ModuleSlot {
    module: Arc<dyn Module>,
    runtime: ModuleRuntime,
    started: AtomicBool,
    last_tick: Mutex<Option<TaskHandle>>,
}

impl ModuleSlot {
    pub(crate) fn new(module: Arc<dyn Module>, runtime: ModuleRuntime) -> Self {
        Self {
            module,
            runtime,
            started: AtomicBool::new(false),
            last_tick: Mutex::new(None),
        }
    }

    fn id(&self) -> ModuleId {
        self.runtime.module()
    }
}

/// Module host. Build with [`Kernel::builder`].
pub struct Kernel {
    cfg: KernelConfig,
    bus: MessageBus,
    modules: Vec<ModuleSlot>,
    token: CancellationToken,
    os_signals: bool,
    _log: Option<LogWriter>,
}

impl Kernel {
    /// Starts building a kernel with `cfg`.
    pub fn builder(cfg: KernelConfig) -> KernelBuilder {
        KernelBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: KernelConfig,
        bus: MessageBus,
        modules: Vec<ModuleSlot>,
        os_signals: bool,
        log: Option<LogWriter>,
    ) -> Self {
        Self {
            cfg,
            bus,
            modules,
            token: CancellationToken::new(),
            os_signals,
            _log: log,
        }
    }

    /// The shared bus.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Cancelling this token makes [`run`](Self::run) leave its loop and shut down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runtime of the registered module of type `M`, if any.
    pub fn runtime_of<M: Module>(&self) -> Option<&ModuleRuntime> {
        let id = ModuleId::of::<M>();
        self.modules.iter().find(|slot| slot.id() == id).map(|slot| &slot.runtime)
    }

    /// Runs the host loop until the shutdown token fires (or an OS signal, when enabled).
    ///
    /// Returns `Err(RuntimeError::GraceExceeded)` if any module left finite work
    /// outstanding past the grace period.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.bus.publish(KernelStarting);
        for slot in &self.modules {
            self.start_module(slot).await;
        }
        self.bus.publish(KernelStarted);
        info!(modules = self.modules.len(), "kernel started");

        self.drive().await;

        self.bus.publish(KernelStopping);
        let res = self.stop_modules().await;
        self.bus.publish(KernelStopped);
        info!(clean = res.is_ok(), "kernel stopped");
        res
    }

    async fn start_module(&self, slot: &ModuleSlot) {
        let id = slot.id();
        let module = Arc::clone(&slot.module);
        let rt = slot.runtime.clone();
        let handle = slot.runtime.run(
            "start",
            TaskKind::Finite,
            move |_ctx| async move { module.start(&rt).await },
            slot.runtime.lifetime_token().child_token(),
        );

        match time::timeout(self.cfg.hang_threshold, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    module = %id,
                    name = slot.module.name(),
                    error = %e,
                    "module failed to start; it will not be ticked"
                );
                return;
            }
            Err(_) => {
                warn!(
                    module = %id,
                    name = slot.module.name(),
                    "module start still running past the hang threshold"
                );
            }
        }
        slot.started.store(true, Ordering::Release);
        self.bus.publish(ModuleStarted { module: id });
    }

    async fn drive(&self) {
        let mut ticker = self.cfg.tick_period().map(|period| {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        let signal = os_signal(self.os_signals);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("shutdown token cancelled");
                    break;
                }
                _ = &mut signal => break,
                _ = next_tick(&mut ticker) => self.tick_all(),
            }
        }
    }

    fn tick_all(&self) {
        for slot in &self.modules {
            if !slot.started.load(Ordering::Acquire) {
                continue;
            }
            let mut last = slot.last_tick.lock();
            if last.as_ref().is_some_and(|h| !h.is_finished()) {
                debug!(module = %slot.id(), "previous tick still running; skipping");
                continue;
            }
            let module = Arc::clone(&slot.module);
            let rt = slot.runtime.clone();
            *last = Some(slot.runtime.run(
                "tick",
                TaskKind::Finite,
                move |_ctx| async move { module.tick(&rt).await },
                slot.runtime.lifetime_token().child_token(),
            ));
        }
    }

    async fn stop_modules(&self) -> Result<(), RuntimeError> {
        let results = join_all(self.modules.iter().map(|slot| self.stop_module(slot))).await;

        let mut abandoned = Vec::new();
        for res in results {
            match res {
                Ok(()) => {}
                Err(RuntimeError::GraceExceeded { abandoned: tasks, .. }) => {
                    abandoned.extend(tasks);
                }
            }
        }

        if abandoned.is_empty() {
            Ok(())
        } else {
            warn!(count = abandoned.len(), grace = ?self.cfg.grace, "shutdown left tasks behind");
            Err(RuntimeError::GraceExceeded {
                grace: self.cfg.grace,
                abandoned,
            })
        }
    }

    async fn stop_module(&self, slot: &ModuleSlot) -> Result<(), RuntimeError> {
        let id = slot.id();
        slot.runtime.shutdown();

        let module = Arc::clone(&slot.module);
        let rt = slot.runtime.clone();
        drop(slot.runtime.run(
            "stop",
            TaskKind::Finite,
            move |_ctx| async move { module.stop(&rt).await },
            CancellationToken::new(),
        ));

        let res = slot.runtime.wait_all(Some(self.cfg.grace)).await;
        self.bus.publish(ModuleStopped { module: id });

        res.map_err(|e| match e {
            RuntimeError::GraceExceeded { grace, abandoned } => RuntimeError::GraceExceeded {
                grace,
                abandoned: abandoned
                    .into_iter()
                    .map(|task| format!("{}/{task}", id.short_name()))
                    .collect(),
            },
        })
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("modules", &self.modules.iter().map(ModuleSlot::id).collect::<Vec<_>>())
            .field("os_signals", &self.os_signals)
            .finish()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn os_signal(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }
    match shutdown::os_shutdown_signal().await {
        Ok(name) => info!(signal = name, "shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for OS signals; relying on the shutdown token");
            std::future::pending::<()>().await;
        }
    }
}
