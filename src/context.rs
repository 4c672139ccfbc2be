//! # Module identity and ambient module context.
//!
//! A [`ModuleId`] names a module by its Rust type. The *ambient* module is the
//! module whose code is currently executing on this logical call chain; the bus
//! reads it to attribute published messages (flood control) without threading
//! the identity through every call.
//!
//! ## Rules
//! - The slot is a tokio task-local: it follows the task, not the OS thread.
//! - It is **captured when work is scheduled** and restored only for the
//!   duration of that callback ([`scope`] / [`sync_scope`]).
//! - Outside any scope the kernel itself is executing: [`current_module`] is `None`.
//!
//! ```text
//! ModuleRuntime::run(work) ──► scope(module, work) ──► work publishes ──► bus reads current_module()
//! MessageBus::publish      ──► capture current_module() ──► handler future scoped to it
//! ```

use std::any::TypeId;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};

tokio::task_local! {
    static CURRENT_MODULE: ModuleId;
}

/// Identity of a module, derived from its type.
///
/// Equality and hashing use the [`TypeId`] only; the name is for diagnostics.
#[derive(Clone, Copy)]
pub struct ModuleId {
    type_id: TypeId,
    name: &'static str,
}

impl ModuleId {
    /// Identity of module type `M`.
    pub fn of<M: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
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

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModuleId {}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleId").field(&self.name).finish()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Returns the module whose code is currently executing, if any.
pub fn current_module() -> Option<ModuleId> {
    CURRENT_MODULE.try_with(|m| *m).ok()
}

/// Runs `fut` with `module` as the ambient module.
pub(crate) async fn scope<F: Future>(module: ModuleId, fut: F) -> F::Output {
    CURRENT_MODULE.scope(module, fut).await
}

/// Runs synchronous `f` with `module` as the ambient module.
pub fn sync_scope<R>(module: ModuleId, f: impl FnOnce() -> R) -> R {
    CURRENT_MODULE.sync_scope(module, f)
}

/// Runs `fut` in the given optional scope; `None` leaves it unattributed.
pub(crate) async fn maybe_scope<F: Future>(module: Option<ModuleId>, fut: F) -> F::Output {
    match module {
        Some(m) => scope(m, fut).await,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_identity_by_type() {
        assert_eq!(ModuleId::of::<Alpha>(), ModuleId::of::<Alpha>());
        assert_ne!(ModuleId::of::<Alpha>(), ModuleId::of::<Beta>());
        assert_eq!(ModuleId::of::<Alpha>().to_string(), "Alpha");
    }

    #[test]
    fn test_sync_scope_is_bounded() {
        assert!(current_module().is_none());
        let inner = sync_scope(ModuleId::of::<Alpha>(), current_module);
        assert_eq!(inner, Some(ModuleId::of::<Alpha>()));
        assert!(current_module().is_none());
    }

    #[tokio::test]
    async fn test_scope_does_not_leak_into_spawned_tasks() {
        let seen = scope(ModuleId::of::<Beta>(), async {
            let here = current_module();
            let spawned = tokio::spawn(async { current_module() }).await.unwrap();
            (here, spawned)
        })
        .await;
        assert_eq!(seen.0, Some(ModuleId::of::<Beta>()));
        assert_eq!(seen.1, None);
        assert!(current_module().is_none());
    }
}
