//! Message typing for the bus.
//!
//! Any `Send + Sync + 'static` value is a [`Message`]; the bus routes it by its
//! exact concrete type ([`MessageType`]). There is no subtyping: subscribers of
//! `T` never see `Arc<T>` or wrappers around `T`.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value that can travel over the [`MessageBus`](crate::MessageBus).
pub trait Message: Any + Send + Sync + 'static {}

impl<T: Any + Send + Sync + 'static> Message for T {}

/// Type-erased message shared by every subscriber of one publish.
pub(crate) type AnyMessage = Arc<dyn Any + Send + Sync>;

/// Routing key of a message: its concrete Rust type.
#[derive(Clone, Copy)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    /// Routing key of `T`.
    pub fn of<T: Message>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageType").field(&self.name).finish()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
