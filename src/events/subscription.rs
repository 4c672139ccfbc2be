//! # Subscriptions and their dispatch policy.
//!
//! Every subscription carries one [`DispatchPolicy`] deciding how a message is
//! handed to its handler and what happens when the handler fails:
//!
//! | Policy        | Runs as                                   | Failure                                 |
//! |---------------|-------------------------------------------|-----------------------------------------|
//! | `Module`      | Finite supervised task on the subscriber's own runtime | `ModuleFaulted`, slow/hung detection |
//! | `Kernel`      | spawned fire-and-forget future            | logged, nothing published               |
//! | `Application` | spawned fire-and-forget future            | logged with the handler name, never `ModuleFaulted` |
//!
//! ## Rules
//! - A subscriber is dispatched only while its `active` flag is set; disposal clears
//!   the flag **before** removing it from the list, so a disposed subscriber still
//!   present in an in-flight snapshot is skipped.
//! - The handler closure is invoked synchronously, in snapshot order, inside
//!   `catch_unwind`; only the future it returns runs later.
//! - Unsupervised futures run in the publisher's ambient module scope.
//! - Subscriber lists are copy-on-write slices: mutation swaps the slice under the
//!   list guard, a snapshot is an `Arc` clone taken under the same guard.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::context::{self, ModuleId};
use crate::core::WeakRuntime;
use crate::error::{TaskError, panic_message};
use crate::events::MessageType;
use crate::events::message::AnyMessage;
use crate::tasks::TaskKind;

/// Type-erased handler: receives the shared message and a cancellation token.
pub(crate) type BoxHandler = Arc<
    dyn Fn(AnyMessage, CancellationToken) -> BoxFuture<'static, Result<(), TaskError>>
        + Send
        + Sync,
>;

/// How a subscriber's handler is run.
pub(crate) enum DispatchPolicy {
    /// Supervised on the subscriber's runtime as a Finite task named `task`.
    Module { runtime: WeakRuntime, task: Arc<str> },
    /// Trusted, short kernel-internal handler.
    Kernel,
    /// Unsupervised handler identified by `name` in diagnostics.
    Application { name: Arc<str> },
}

impl DispatchPolicy {
    fn label(&self) -> &'static str {
        match self {
            DispatchPolicy::Module { .. } => "module",
            DispatchPolicy::Kernel => "kernel",
            DispatchPolicy::Application { .. } => "application",
        }
    }
}

/// One registered handler.
pub(crate) struct Subscriber {
    id: u64,
    message_type: MessageType,
    policy: DispatchPolicy,
    handler: BoxHandler,
    active: AtomicBool,
}

impl Subscriber {
    pub(crate) fn new(
        id: u64,
        message_type: MessageType,
        policy: DispatchPolicy,
        handler: BoxHandler,
    ) -> Self {
        Self {
            id,
            message_type,
            policy,
            handler,
            active: AtomicBool::new(true),
        }
    }

    #[inline]
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Clears the active flag; returns `true` for the call that actually disposed.
    fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Hands `message` to this subscriber according to its policy.
    ///
    /// Never panics; every failure is contained here or in the spawned future.
    pub(crate) fn dispatch(&self, rt: &Handle, message: &AnyMessage, origin: Option<ModuleId>) {
        if !self.is_active() {
            return;
        }

        match &self.policy {
            DispatchPolicy::Module { runtime, task } => {
                let Some(runtime) = runtime.upgrade() else {
                    debug!(
                        message_type = %self.message_type,
                        task = %task,
                        "subscriber runtime is gone; skipping dispatch"
                    );
                    return;
                };
                let handler = Arc::clone(&self.handler);
                let message = Arc::clone(message);
                let token = runtime.lifetime_token().child_token();
                drop(runtime.run(
                    Arc::clone(task),
                    TaskKind::Finite,
                    move |ctx| handler(message, ctx),
                    token,
                ));
            }
            DispatchPolicy::Kernel => self.fire_and_forget(rt, message, origin, None),
            DispatchPolicy::Application { name } => {
                self.fire_and_forget(rt, message, origin, Some(Arc::clone(name)))
            }
        }
    }

    fn fire_and_forget(
        &self,
        rt: &Handle,
        message: &AnyMessage,
        origin: Option<ModuleId>,
        name: Option<Arc<str>>,
    ) {
        let ty = self.message_type;
        let call = std::panic::catch_unwind(AssertUnwindSafe(|| {
            (self.handler)(Arc::clone(message), CancellationToken::new())
        }));
        let fut = match call {
            Ok(fut) => fut,
            Err(panic) => {
                let err = TaskError::Panicked {
                    info: panic_message(&*panic),
                };
                report_unsupervised(name.as_deref(), ty, Err(err));
                return;
            }
        };

        rt.spawn(async move {
            let res = context::maybe_scope(origin, AssertUnwindSafe(fut).catch_unwind())
                .await
                .unwrap_or_else(|panic| {
                    Err(TaskError::Panicked {
                        info: panic_message(&*panic),
                    })
                });
            report_unsupervised(name.as_deref(), ty, res);
        });
    }
}

/// Logs the outcome of an unsupervised handler; `name` is set for application handlers.
fn report_unsupervised(name: Option<&str>, ty: MessageType, res: Result<(), TaskError>) {
    match (res, name) {
        (Ok(()), _) => {}
        (Err(TaskError::Canceled), _) => {
            debug!(message_type = %ty, handler = name.unwrap_or("kernel"), "handler cancelled");
        }
        (Err(e), Some(name)) => {
            error!(
                handler = %name,
                message_type = %ty,
                error = %e,
                label = e.as_label(),
                "application handler failed"
            );
        }
        (Err(e), None) => {
            error!(
                message_type = %ty,
                error = %e,
                label = e.as_label(),
                "kernel handler failed"
            );
        }
    }
}

/// Per-type subscriber list (copy-on-write).
pub(crate) struct SubscriberList {
    entries: Mutex<Arc<[Arc<Subscriber>]>>,
}

impl SubscriberList {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new().into()),
        }
    }

    pub(crate) fn push(&self, sub: Arc<Subscriber>) {
        let mut entries = self.entries.lock();
        let mut next = entries.to_vec();
        next.push(sub);
        *entries = next.into();
    }

    pub(crate) fn remove(&self, id: u64) {
        let mut entries = self.entries.lock();
        if entries.iter().any(|s| s.id == id) {
            let next: Arc<[Arc<Subscriber>]> =
                entries.iter().filter(|s| s.id != id).cloned().collect();
            *entries = next;
        }
    }

    /// Point-in-time view; dispatch happens outside the guard.
    pub(crate) fn snapshot(&self) -> Arc<[Arc<Subscriber>]> {
        Arc::clone(&self.entries.lock())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Unsubscribe token returned by every `subscribe*` call.
///
/// Dropping it does **not** unsubscribe; call [`Subscription::dispose`].
/// Disposal is idempotent and safe from inside a handler.
pub struct Subscription {
    entry: Arc<Subscriber>,
    list: Weak<SubscriberList>,
}

impl Subscription {
    pub(crate) fn new(entry: Arc<Subscriber>, list: Weak<SubscriberList>) -> Self {
        Self { entry, list }
    }

    /// Stops delivery to this handler and removes it from its list.
    pub fn dispose(&self) {
        if self.entry.deactivate() {
            if let Some(list) = self.list.upgrade() {
                list.remove(self.entry.id);
            }
        }
    }

    /// True until [`dispose`](Self::dispose) is called.
    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    /// The message type this subscription receives.
    pub fn message_type(&self) -> MessageType {
        self.entry.message_type
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("message_type", &self.entry.message_type)
            .field("policy", &self.entry.policy.label())
            .field("active", &self.is_active())
            .finish()
    }
}
