//! Kernel core: module hosting and per-module supervision.
//!
//! Public surface: [`Kernel`] (with [`KernelBuilder`] and [`KernelConfig`]),
//! the [`Module`] trait and the per-module [`ModuleRuntime`].
//!
//! Internal modules:
//! - [`runner`]: executes one unit of work in scope, settles it and publishes events;
//! - [`watchdog`]: detaches finite work that outlives the hang threshold;
//! - [`shutdown`]: cross-platform OS signal handling for the host loop.

mod builder;
mod config;
mod kernel;
mod module;
mod runner;
mod runtime;
mod shutdown;
mod watchdog;

pub use builder::KernelBuilder;
pub use config::KernelConfig;
pub use kernel::Kernel;
pub use module::Module;
pub use runtime::ModuleRuntime;

pub(crate) use runtime::WeakRuntime;
