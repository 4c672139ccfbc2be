use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use super::kernel::{Kernel, ModuleSlot};
use crate::{
    context::ModuleId,
    core::{KernelConfig, Module, ModuleRuntime},
    events::MessageBus,
    subscribers::LogWriter,
};

/// Builder for constructing a [`Kernel`] with its modules and optional features.
pub struct KernelBuilder {
    cfg: KernelConfig,
    modules: Vec<(ModuleId, Arc<dyn Module>)>,
    log_writer: bool,
    os_signals: bool,
}

impl KernelBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: KernelConfig) -> Self {
        Self {
            cfg,
            modules: Vec::new(),
            log_writer: false,
            os_signals: false,
        }
    }

    /// Registers a module. Modules start in registration order.
    ///
    /// A module type may be registered once; later registrations of the same type
    /// are ignored with a warning, since its identity is its type.
    pub fn with_module<M: Module>(mut self, module: M) -> Self {
        self.modules.push((ModuleId::of::<M>(), Arc::new(module)));
        self
    }

    /// Attaches a [`LogWriter`] that logs every kernel lifecycle event. Off by default.
    pub fn with_log_writer(mut self, enabled: bool) -> Self {
        self.log_writer = enabled;
        self
    }

    /// Leave the host loop on SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere). Off by default.
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Builds the kernel: one bus, one runtime per module.
    pub fn build(self) -> Kernel {
        let bus = MessageBus::new(&self.cfg);
        let log = self.log_writer.then(|| LogWriter::attach(&bus));

        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(self.modules.len());
        for (id, module) in self.modules {
            if !seen.insert(id) {
                warn!(module = %id, "module registered twice; keeping the first");
                continue;
            }
            let runtime = ModuleRuntime::new(id, bus.clone(), &self.cfg);
            slots.push(ModuleSlot::new(module, runtime));
        }

        Kernel::new_internal(self.cfg, bus, slots, self.os_signals, log)
    }
}
