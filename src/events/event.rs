//! # Kernel events published on the message bus.
//!
//! Every event is an immutable value type routed by its own type, so a
//! subscriber picks exactly the events it cares about:
//!
//! - **Kernel lifecycle**: [`KernelStarting`], [`KernelStarted`], [`KernelStopping`], [`KernelStopped`]
//! - **Module lifecycle**: [`ModuleStarted`], [`ModuleStopped`]
//! - **Supervision**: [`ModuleTaskCompleted`], [`ModuleTaskCancelled`], [`ModuleFaulted`],
//!   [`ModuleTaskSlow`], [`ModuleTaskHung`], [`ModuleTaskAbandoned`]
//! - **Flood control**: [`ModuleMessageFlooded`]
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use modvisor::{ModuleId, ModuleTaskHung};
//!
//! struct Renderer;
//!
//! let ev = ModuleTaskHung {
//!     module: ModuleId::of::<Renderer>(),
//!     task: "upload".into(),
//!     duration: Duration::from_secs(5),
//! };
//! assert_eq!(ev.to_string(), "[task-hung] module=Renderer task=upload duration=5s");
//! ```
//!
//! `Display` renders the compact one-line form used by [`LogWriter`](crate::LogWriter).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::context::ModuleId;
use crate::error::TaskError;
use crate::events::MessageType;

/// Kernel is about to start its modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStarting;

/// All modules have been started; the host loop is ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStarted;

/// Shutdown began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStopping;

/// Shutdown finished; every module was stopped or abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelStopped;

/// A module's `start` completed (or was left running past the hang threshold).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleStarted {
    pub module: ModuleId,
}

/// A module was stopped and its supervisor drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleStopped {
    pub module: ModuleId,
}

/// Supervised work failed or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFaulted {
    pub module: ModuleId,
    pub task: Arc<str>,
    pub error: TaskError,
}

/// Finite supervised work returned `Ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTaskCompleted {
    pub module: ModuleId,
    pub task: Arc<str>,
}

/// Finite supervised work honoured its cancellation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTaskCancelled {
    pub module: ModuleId,
    pub task: Arc<str>,
}

/// Finite supervised work finished after the slow threshold (advisory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTaskSlow {
    pub module: ModuleId,
    pub task: Arc<str>,
    /// Total wall-clock time the work took.
    pub duration: Duration,
}

/// Finite supervised work exceeded the hang threshold and was detached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTaskHung {
    pub module: ModuleId,
    pub task: Arc<str>,
    /// Time since the work was accepted.
    pub duration: Duration,
}

/// Shutdown proceeded without waiting for this task's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTaskAbandoned {
    pub module: ModuleId,
    pub task: Arc<str>,
}

/// A module exceeded the flood threshold for one message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMessageFlooded {
    pub module: ModuleId,
    pub message_type: MessageType,
    /// Count that crossed the threshold.
    pub count: u32,
    /// Time elapsed in the current window when the threshold was crossed.
    pub window: Duration,
}

impl fmt::Display for KernelStarting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[kernel-starting]")
    }
}

impl fmt::Display for KernelStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[kernel-started]")
    }
}

impl fmt::Display for KernelStopping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[kernel-stopping]")
    }
}

impl fmt::Display for KernelStopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[kernel-stopped]")
    }
}

impl fmt::Display for ModuleStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[module-started] module={}", self.module)
    }
}

impl fmt::Display for ModuleStopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[module-stopped] module={}", self.module)
    }
}

impl fmt::Display for ModuleFaulted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[faulted] module={} task={} err={}",
            self.module,
            self.task,
            self.error.as_message()
        )
    }
}

impl fmt::Display for ModuleTaskCompleted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[completed] module={} task={}", self.module, self.task)
    }
}

impl fmt::Display for ModuleTaskCancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[cancelled] module={} task={}", self.module, self.task)
    }
}

impl fmt::Display for ModuleTaskSlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[task-slow] module={} task={} duration={:?}",
            self.module, self.task, self.duration
        )
    }
}

impl fmt::Display for ModuleTaskHung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[task-hung] module={} task={} duration={:?}",
            self.module, self.task, self.duration
        )
    }
}

impl fmt::Display for ModuleTaskAbandoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[abandoned] module={} task={}", self.module, self.task)
    }
}

impl fmt::Display for ModuleMessageFlooded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[flooded] module={} message={} count={} window={:?}",
            self.module, self.message_type, self.count, self.window
        )
    }
}
