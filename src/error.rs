//! Error types used by the modvisor runtime and supervised work.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`]: errors raised by the supervision runtime itself.
//! - [`TaskError`]: errors raised by individual units of supervised work and handlers.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the modvisor runtime.
///
/// These represent failures in the supervision system itself, such as a
/// shutdown wait exceeding its grace period. They are reports, not crashes:
/// the runtime has already moved on by the time one is returned.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// Grace period was exceeded; the listed tasks were abandoned (detached) by the supervisor.
    #[error("shutdown grace {grace:?} exceeded; abandoned: {abandoned:?}")]
    GraceExceeded {
        /// The grace duration that elapsed.
        grace: Duration,
        /// Names of the tasks the supervisor stopped waiting on.
        abandoned: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use modvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), abandoned: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, abandoned } => {
                format!("grace exceeded after {grace:?}; abandoned tasks={abandoned:?}")
            }
        }
    }
}

/// # Errors produced by supervised work and message handlers.
///
/// Returning [`TaskError::Canceled`] is the cooperative way to acknowledge the
/// cancellation token; the supervisor reports it as a cancellation, not a fault.
/// Every other variant is a fault.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Non-recoverable error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked; the panic was contained by the supervisor.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// Work observed its cancellation token and stopped.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`] from anything displayable.
    ///
    /// ```
    /// use modvisor::TaskError;
    ///
    /// let err = TaskError::fail("disk full");
    /// assert_eq!(err.as_message(), "error: disk full");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use modvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// True for the cooperative-cancellation variant.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
