//! # Supervised-task types.
//!
//! This module provides the task-related types shared by the runtime and the bus:
//! - [`TaskKind`] - finite vs resident work
//! - [`TaskState`] - supervisor-visible state machine
//! - [`TaskSnapshot`] - diagnostics view of a tracked task
//! - [`TaskHandle`] - awaitable operation handle
//! - `TaskRecord` / `TaskArena` - internal bookkeeping

mod arena;
mod handle;
mod task;

pub(crate) use arena::TaskArena;
pub use handle::TaskHandle;
pub(crate) use task::TaskRecord;
pub use task::{TaskKind, TaskSnapshot, TaskState};
