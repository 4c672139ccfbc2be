//! # modvisor
//!
//! **Modvisor** is a small module kernel for async Rust.
//!
//! It hosts a set of [`Module`]s, connects them through a typed in-process
//! [`MessageBus`], and supervises every unit of work they start: slow and hung
//! work is detected and reported, panics are contained, message floods are cut
//! off per module, and shutdown is bounded by a grace period.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Module A   │   │   Module B   │   │   Module C   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ModuleRuntime │   │ModuleRuntime │   │ModuleRuntime │
//!     │ - TaskArena  │   │ - TaskArena  │   │ - TaskArena  │
//!     │ - watchdogs  │   │ - watchdogs  │   │ - watchdogs  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ publish / subscribe / lifecycle events │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                MessageBus (typed topics, flood control)           │
//! └──────┬──────────────────────────┬──────────────────────────┬──────┘
//!        ▼                          ▼                          ▼
//!  Module tier                 Kernel tier              Application tier
//!  (supervised task on         (fire-and-forget,        (fire-and-forget,
//!   the owner's runtime)        logged on failure)       logged with name)
//! ```
//!
//! ### Task lifecycle
//! ```text
//! run(name, kind, work, cancel) ──► Running
//!
//!   Running ──(finished later than slow_threshold)──► Slow ─┐
//!   Running|Slow ──Ok──────────────► Completed              │
//!   Running|Slow ──Err(Canceled)───► Cancelled              │ ◄┘
//!   Running|Slow ──Err / panic─────► Faulted
//!   Running|Slow ──hang_threshold──► Hung ──► Detached      (watchdog)
//!   Running|Slow ──grace elapsed───► Detached               (wait_all)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Kernel**        | Hosts modules, ticks them, bounded shutdown.             | [`Kernel`], [`KernelBuilder`], [`Module`]   |
//! | **Supervision**   | Tracked work with slow/hung detection.                   | [`ModuleRuntime`], [`TaskHandle`]           |
//! | **Messaging**     | Typed publish/subscribe with three dispatch tiers.       | [`MessageBus`], [`Subscription`]            |
//! | **Context**       | Ambient module identity for attribution.                 | [`ModuleId`], [`current_module`]            |
//! | **Errors**        | Typed errors for work and shutdown.                      | [`TaskError`], [`RuntimeError`]             |
//! | **Configuration** | Thresholds, windows, grace.                              | [`KernelConfig`]                            |
//! | **Logging**       | Kernel events to `tracing`.                              | [`LogWriter`]                               |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use modvisor::{Kernel, KernelConfig, Module, ModuleRuntime, TaskError};
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Module for Greeter {
//!     async fn start(&self, rt: &ModuleRuntime) -> Result<(), TaskError> {
//!         rt.spawn("hello", |_ctx| async move {
//!             println!("hello from a supervised task");
//!             Ok(())
//!         });
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let kernel = Kernel::builder(KernelConfig::default())
//!         .with_module(Greeter)
//!         .build();
//!
//!     let token = kernel.shutdown_token();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(50)).await;
//!         token.cancel();
//!     });
//!
//!     kernel.run().await?;
//!     Ok(())
//! }
//! ```
mod context;
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use context::{ModuleId, current_module, sync_scope};
pub use core::{Kernel, KernelBuilder, KernelConfig, Module, ModuleRuntime};
pub use error::{RuntimeError, TaskError};
pub use events::{
    KernelStarted, KernelStarting, KernelStopped, KernelStopping, Message, MessageBus,
    MessageType, ModuleFaulted, ModuleMessageFlooded, ModuleStarted, ModuleStopped,
    ModuleTaskAbandoned, ModuleTaskCancelled, ModuleTaskCompleted, ModuleTaskHung,
    ModuleTaskSlow, Subscription,
};
pub use subscribers::LogWriter;
pub use tasks::{TaskHandle, TaskKind, TaskSnapshot, TaskState};
