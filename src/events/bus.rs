//! # Typed, flood-controlled message bus.
//!
//! [`MessageBus`] maps each concrete message type to its subscriber list and fans
//! every published value out to the current subscribers of that exact type.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                          Subscribers (per type):
//!   module task ──┐
//!   watchdog    ──┼─► publish(T) ─► flood check ─► snapshot(list[T]) ─► Subscriber::dispatch
//!   kernel      ──┘   (ambient module)  (drop?)      (under list guard)    ├─ Module      → ModuleRuntime::run
//!                                                                          ├─ Kernel      → spawn
//!                                                                          └─ Application → spawn
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` returns once dispatch was *initiated* for
//!   every subscriber; handlers finish later.
//! - **Registration order** within one publish; no ordering across types.
//! - **Containment**: `publish()` never panics or errors because of a subscriber.
//! - **Flood control**: only messages published inside a module scope are counted;
//!   kernel-originated messages are never throttled.
//! - **No persistence**: a message with no subscribers is dropped without allocating.
//! - **Tokio context**: dispatch spawns; publishing outside a runtime drops the
//!   message with a warning.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::{self, ModuleId};
use crate::core::{KernelConfig, ModuleRuntime};
use crate::error::TaskError;
use crate::events::event::ModuleMessageFlooded;
use crate::events::flood::{Admission, FloodControl};
use crate::events::message::{AnyMessage, Message, MessageType};
use crate::events::subscription::{
    BoxHandler, DispatchPolicy, Subscriber, SubscriberList, Subscription,
};

struct BusInner {
    topics: DashMap<MessageType, Arc<SubscriberList>>,
    flood: FloodControl,
    next_id: AtomicU64,
}

/// In-process typed publish/subscribe bus.
///
/// ### Properties
/// - **Typed**: routing by the message's concrete type.
/// - **Fire-and-forget**: no delivery or durability guarantees, no backpressure.
/// - **Cloneable**: cheap to clone (internally an `Arc`).
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Creates a bus with flood control taken from `cfg`.
    pub fn new(cfg: &KernelConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: DashMap::new(),
                flood: FloodControl::new(cfg.flood_limit(), cfg.flood_window_clamped()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Publishes `message` to every active subscriber of `T`.
    ///
    /// When called inside a module scope, the message is first counted against
    /// that module's flood budget for `T`; over budget, it is dropped (and the
    /// first drop in the window publishes one [`ModuleMessageFlooded`]).
    pub fn publish<T: Message>(&self, message: T) {
        let origin = context::current_module();
        if let Some(module) = origin {
            let ty = MessageType::of::<T>();
            match self.inner.flood.admit(module, ty) {
                Admission::Deliver => {}
                Admission::Flooded { count, elapsed } => {
                    warn!(
                        module = %module,
                        message_type = %ty,
                        count,
                        window = ?elapsed,
                        "module flooded the bus; dropping messages for the rest of the window"
                    );
                    self.dispatch(
                        ModuleMessageFlooded {
                            module,
                            message_type: ty,
                            count,
                            window: elapsed,
                        },
                        None,
                    );
                    return;
                }
                Admission::Drop => return,
            }
        }
        self.dispatch(message, origin);
    }

    /// Fans `message` out without flood accounting.
    fn dispatch<T: Message>(&self, message: T, origin: Option<ModuleId>) {
        let Some(list) = self.list_of(MessageType::of::<T>()) else {
            return;
        };
        let snapshot = list.snapshot();
        if snapshot.is_empty() {
            return;
        }
        let Ok(rt) = Handle::try_current() else {
            warn!(
                message_type = %MessageType::of::<T>(),
                "publish outside a tokio runtime; message dropped"
            );
            return;
        };

        let message: AnyMessage = Arc::new(message);
        for sub in snapshot.iter() {
            sub.dispatch(&rt, &message, origin);
        }
    }

    /// Plain registration: an application-tier handler named after its type.
    pub fn subscribe<T, F, Fut>(&self, handler: F) -> Subscription
    where
        T: Message,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.subscribe_application(std::any::type_name::<F>(), handler)
    }

    /// Registers a trusted kernel-internal handler.
    ///
    /// Runs unsupervised and fire-and-forget; failures are logged only. Keep these short.
    pub fn subscribe_kernel<T, F, Fut>(&self, handler: F) -> Subscription
    where
        T: Message,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.register::<T>(
            DispatchPolicy::Kernel,
            erase(move |msg: Arc<T>, _ctx| handler(msg)),
        )
    }

    /// Registers an unsupervised application handler.
    ///
    /// Failures are logged with `name`; they never become `ModuleFaulted`.
    pub fn subscribe_application<T, F, Fut>(
        &self,
        name: impl Into<Arc<str>>,
        handler: F,
    ) -> Subscription
    where
        T: Message,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.register::<T>(
            DispatchPolicy::Application { name: name.into() },
            erase(move |msg: Arc<T>, _ctx| handler(msg)),
        )
    }

    /// Registers a handler supervised by `runtime`.
    ///
    /// Each delivery becomes a Finite task named `task` on that runtime, so message
    /// handling gets slow/hung detection and fault reporting. The token is a child
    /// of the runtime's lifetime token. The bus holds the runtime weakly.
    pub fn subscribe_module<T, F, Fut>(
        &self,
        runtime: &ModuleRuntime,
        task: impl Into<Arc<str>>,
        handler: F,
    ) -> Subscription
    where
        T: Message,
        F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.register::<T>(
            DispatchPolicy::Module {
                runtime: runtime.downgrade(),
                task: task.into(),
            },
            erase(handler),
        )
    }

    /// Removes `subscription`; same as [`Subscription::dispose`].
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.dispose();
    }

    /// Number of active subscribers of `T`.
    pub fn subscriber_count<T: Message>(&self) -> usize {
        self.list_of(MessageType::of::<T>())
            .map_or(0, |list| list.len())
    }

    fn register<T: Message>(&self, policy: DispatchPolicy, handler: BoxHandler) -> Subscription {
        let ty = MessageType::of::<T>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Subscriber::new(id, ty, policy, handler));

        let list = {
            let slot = self
                .inner
                .topics
                .entry(ty)
                .or_insert_with(|| Arc::new(SubscriberList::new()));
            Arc::clone(slot.value())
        };
        list.push(Arc::clone(&entry));
        Subscription::new(entry, Arc::downgrade(&list))
    }

    fn list_of(&self, ty: MessageType) -> Option<Arc<SubscriberList>> {
        self.inner.topics.get(&ty).map(|list| Arc::clone(list.value()))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(&KernelConfig::default())
    }
}

/// Wraps a typed handler into the bus's type-erased form.
fn erase<T, F, Fut>(handler: F) -> BoxHandler
where
    T: Message,
    F: Fn(Arc<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(
        move |msg: AnyMessage, ctx: CancellationToken| match msg.downcast::<T>() {
            Ok(msg) => handler(msg, ctx).boxed(),
            Err(_) => futures::future::ready(Err(TaskError::Fatal {
                error: format!(
                    "message routed to wrong handler: expected {}",
                    std::any::type_name::<T>()
                ),
            }))
            .boxed(),
        },
    )
}
