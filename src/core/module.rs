//! # Module: unit of kernel-hosted functionality.
//!
//! A module receives its own [`ModuleRuntime`] and touches the kernel only through
//! it: publish/subscribe typed messages and run supervised work. The kernel calls
//! each hook as a Finite supervised task, so a slow, hung or panicking hook is
//! reported like any other work.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use modvisor::{Module, ModuleRuntime, TaskError, TaskKind};
//!
//! struct Heartbeat;
//!
//! #[async_trait]
//! impl Module for Heartbeat {
//!     async fn start(&self, rt: &ModuleRuntime) -> Result<(), TaskError> {
//!         let token = rt.lifetime_token();
//!         let _resident = rt.run("beat", TaskKind::Resident, |ctx| async move {
//!             ctx.cancelled().await;
//!             Err(TaskError::Canceled)
//!         }, token);
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::core::ModuleRuntime;
use crate::error::TaskError;

/// Lifecycle hooks the kernel drives.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Display name used in kernel logs. Defaults to the type's short name.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Called once at kernel start. Register subscriptions and resident work here.
    async fn start(&self, rt: &ModuleRuntime) -> Result<(), TaskError>;

    /// Called every tick interval; skipped while the previous tick is still running.
    async fn tick(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called once at shutdown, after the runtime's lifetime token was cancelled.
    async fn stop(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        Ok(())
    }
}
