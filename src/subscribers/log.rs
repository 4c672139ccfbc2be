//! # LogWriter: kernel events to `tracing`.
//!
//! Subscribes kernel-tier handlers for every kernel event and logs each one with
//! its one-line `Display` form under the `modvisor::events` target.
//!
//! | Event                                              | Level   |
//! |----------------------------------------------------|---------|
//! | kernel/module lifecycle, completed, cancelled      | `INFO`  |
//! | slow, hung, abandoned, flooded                     | `WARN`  |
//! | faulted                                            | `ERROR` |
//!
//! ## Example output
//! ```text
//! INFO  modvisor::events: [kernel-starting]
//! INFO  modvisor::events: [module-started] module=Pinger
//! WARN  modvisor::events: [task-slow] module=Pinger task=tick duration=1.2s
//! ERROR modvisor::events: [faulted] module=Pinger task=tick err=boom
//! INFO  modvisor::events: [kernel-stopped]
//! ```

use std::fmt::Display;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::events::{
    KernelStarted, KernelStarting, KernelStopped, KernelStopping, Message, MessageBus,
    ModuleFaulted, ModuleMessageFlooded, ModuleStarted, ModuleStopped, ModuleTaskAbandoned,
    ModuleTaskCancelled, ModuleTaskCompleted, ModuleTaskHung, ModuleTaskSlow, Subscription,
};

#[derive(Clone, Copy)]
enum Level {
    Info,
    Warn,
    Error,
}

/// Event writer. Logs until dropped or [`detach`](Self::detach)ed.
#[must_use = "dropping the LogWriter detaches it"]
pub struct LogWriter {
    subscriptions: Vec<Subscription>,
}

impl LogWriter {
    /// Subscribes to every kernel event on `bus`.
    pub fn attach(bus: &MessageBus) -> Self {
        let subscriptions = vec![
            log_on::<KernelStarting>(bus, Level::Info),
            log_on::<KernelStarted>(bus, Level::Info),
            log_on::<KernelStopping>(bus, Level::Info),
            log_on::<KernelStopped>(bus, Level::Info),
            log_on::<ModuleStarted>(bus, Level::Info),
            log_on::<ModuleStopped>(bus, Level::Info),
            log_on::<ModuleTaskCompleted>(bus, Level::Info),
            log_on::<ModuleTaskCancelled>(bus, Level::Info),
            log_on::<ModuleTaskSlow>(bus, Level::Warn),
            log_on::<ModuleTaskHung>(bus, Level::Warn),
            log_on::<ModuleTaskAbandoned>(bus, Level::Warn),
            log_on::<ModuleMessageFlooded>(bus, Level::Warn),
            log_on::<ModuleFaulted>(bus, Level::Error),
        ];
        Self { subscriptions }
    }

    /// Stops logging. Idempotent.
    pub fn detach(&self) {
        for sub in &self.subscriptions {
            sub.dispose();
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.detach();
    }
}

fn log_on<T: Message + Display>(bus: &MessageBus, level: Level) -> Subscription {
    bus.subscribe_kernel(move |event: Arc<T>| async move {
        match level {
            Level::Info => info!(target: "modvisor::events", "{event}"),
            Level::Warn => warn!(target: "modvisor::events", "{event}"),
            Level::Error => error!(target: "modvisor::events", "{event}"),
        }
        Ok(())
    })
}
