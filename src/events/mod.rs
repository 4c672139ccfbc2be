//! Typed publish/subscribe with three dispatch tiers.
//!
//! ## Contents
//! - [`Message`], [`MessageType`]: any `Send + Sync + 'static` value, keyed by its type
//! - [`MessageBus`]: topic map, flood control, dispatch
//! - [`Subscription`]: disposable registration handle
//! - kernel lifecycle events ([`KernelStarting`] … [`ModuleMessageFlooded`])
//!
//! ## Dispatch tiers
//! ```text
//! publish(T) ─► flood check (publisher in a module scope only)
//!            ─► snapshot subscribers of T, in registration order
//!                 ├─ Module      ─► owner runtime.run(task, Finite)    supervised
//!                 ├─ Kernel      ─► tokio::spawn, failures logged       unsupervised
//!                 └─ Application ─► tokio::spawn, failures logged       unsupervised
//! ```
//!
//! `publish` never blocks on handlers and never fails.

mod bus;
mod event;
mod flood;
mod message;
mod subscription;

pub use bus::MessageBus;
pub use event::{
    KernelStarted, KernelStarting, KernelStopped, KernelStopping, ModuleFaulted,
    ModuleMessageFlooded, ModuleStarted, ModuleStopped, ModuleTaskAbandoned, ModuleTaskCancelled,
    ModuleTaskCompleted, ModuleTaskHung, ModuleTaskSlow,
};
pub use message::{Message, MessageType};
pub use subscription::Subscription;
