#![allow(dead_code)]

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{Event, Level};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

use modvisor::{
    KernelStarted, KernelStarting, KernelStopped, KernelStopping, Message, MessageBus,
    ModuleFaulted, ModuleMessageFlooded, ModuleStarted, ModuleStopped, ModuleTaskAbandoned,
    ModuleTaskCancelled, ModuleTaskCompleted, ModuleTaskHung, ModuleTaskSlow, Subscription,
};

/// Records every kernel event, in publish order, as its one-line display form.
///
/// Lines are pushed synchronously while the bus dispatches, so the order is the
/// publish order even though kernel handlers are fire-and-forget.
pub struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
    _subs: Vec<Subscription>,
}

impl Recorder {
    pub fn attach(bus: &MessageBus) -> Self {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let subs = vec![
            record::<KernelStarting>(bus, &lines),
            record::<KernelStarted>(bus, &lines),
            record::<KernelStopping>(bus, &lines),
            record::<KernelStopped>(bus, &lines),
            record::<ModuleStarted>(bus, &lines),
            record::<ModuleStopped>(bus, &lines),
            record::<ModuleFaulted>(bus, &lines),
            record::<ModuleTaskCompleted>(bus, &lines),
            record::<ModuleTaskCancelled>(bus, &lines),
            record::<ModuleTaskSlow>(bus, &lines),
            record::<ModuleTaskHung>(bus, &lines),
            record::<ModuleTaskAbandoned>(bus, &lines),
            record::<ModuleMessageFlooded>(bus, &lines),
        ];
        Self { lines, _subs: subs }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of recorded lines starting with `prefix`, e.g. `"[completed]"`.
    pub fn count(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .count()
    }

    /// Recorded lines starting with one of `prefixes`, in order.
    pub fn only(&self, prefixes: &[&str]) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|l| prefixes.iter().any(|p| l.starts_with(p)))
            .cloned()
            .collect()
    }
}

fn record<T: Message + Display>(bus: &MessageBus, lines: &Arc<Mutex<Vec<String>>>) -> Subscription {
    let lines = Arc::clone(lines);
    bus.subscribe_kernel(move |event: Arc<T>| {
        lines.lock().push(event.to_string());
        async { Ok(()) }
    })
}

/// Counts ERROR-level events seen by the current thread's subscriber.
struct ErrorCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Installs an error-counting subscriber for the current thread.
///
/// Use with the default current-thread test runtime so spawned work logs here too.
pub fn count_errors() -> (Arc<AtomicUsize>, tracing::subscriber::DefaultGuard) {
    let errors = Arc::new(AtomicUsize::new(0));
    let subscriber = Registry::default().with(ErrorCounter(Arc::clone(&errors)));
    let guard = tracing::subscriber::set_default(subscriber);
    (errors, guard)
}
