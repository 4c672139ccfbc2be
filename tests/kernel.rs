mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use common::Recorder;
use modvisor::{Kernel, KernelConfig, Module, ModuleRuntime, RuntimeError, TaskError};

struct Alpha {
    ticks: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl Module for Alpha {
    async fn start(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        Ok(())
    }

    async fn tick(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Stubborn;

#[async_trait]
impl Module for Stubborn {
    async fn start(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        Ok(())
    }

    async fn stop(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        std::future::pending().await
    }
}

struct Broken {
    ticks: Arc<AtomicUsize>,
}

#[async_trait]
impl Module for Broken {
    async fn start(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        Err(TaskError::fail("no config"))
    }

    async fn tick(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config() -> KernelConfig {
    KernelConfig {
        tick_interval: Duration::from_millis(100),
        grace: Duration::from_secs(1),
        ..KernelConfig::default()
    }
}

fn stop_after(kernel: &Kernel, after: Duration) {
    let token = kernel.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        token.cancel();
    });
}

const LIFECYCLE: &[&str] = &[
    "[kernel-",
    "[module-started]",
    "[module-stopped]",
];

#[tokio::test(start_paused = true)]
async fn test_lifecycle_events_in_order() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let kernel = Kernel::builder(config())
        .with_module(Alpha {
            ticks: Arc::clone(&ticks),
            stopped: Arc::clone(&stopped),
        })
        .build();
    let rec = Recorder::attach(kernel.bus());
    assert!(kernel.runtime_of::<Alpha>().is_some());
    assert!(kernel.runtime_of::<Stubborn>().is_none());

    stop_after(&kernel, Duration::from_millis(350));
    assert!(kernel.run().await.is_ok());

    assert_eq!(
        rec.only(LIFECYCLE),
        vec![
            "[kernel-starting]",
            "[module-started] module=Alpha",
            "[kernel-started]",
            "[kernel-stopping]",
            "[module-stopped] module=Alpha",
            "[kernel-stopped]",
        ]
    );
    assert!(ticks.load(Ordering::SeqCst) >= 3);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(rec.count("[completed] module=Alpha task=stop"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_stop_is_bounded_by_grace() {
    let kernel = Kernel::builder(config()).with_module(Stubborn).build();
    let rec = Recorder::attach(kernel.bus());

    stop_after(&kernel, Duration::from_millis(100));
    let started = Instant::now();
    let res = kernel.run().await;
    assert!(started.elapsed() <= Duration::from_millis(1_150));

    let Err(RuntimeError::GraceExceeded { abandoned, .. }) = res else {
        panic!("expected grace to be exceeded, got {res:?}");
    };
    assert_eq!(abandoned, vec!["Stubborn/stop".to_string()]);
    assert_eq!(rec.count("[abandoned] module=Stubborn task=stop"), 1);
    assert_eq!(rec.lines().last().map(String::as_str), Some("[kernel-stopped]"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_start_is_never_ticked() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let kernel = Kernel::builder(config())
        .with_module(Broken {
            ticks: Arc::clone(&ticks),
        })
        .with_log_writer(true)
        .build();
    let rec = Recorder::attach(kernel.bus());

    stop_after(&kernel, Duration::from_millis(500));
    assert!(kernel.run().await.is_ok());

    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    assert_eq!(rec.count("[module-started]"), 0);
    assert_eq!(rec.count("[faulted] module=Broken task=start"), 1);
    assert_eq!(rec.count("[module-stopped] module=Broken"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_module_type_is_registered_once() {
    let kernel = Kernel::builder(config())
        .with_module(Stubborn)
        .with_module(Stubborn)
        .build();
    assert!(kernel.runtime_of::<Stubborn>().is_some());
    assert_eq!(format!("{kernel:?}").matches("Stubborn").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_tick_interval_disables_ticking() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let kernel = Kernel::builder(KernelConfig {
        tick_interval: Duration::ZERO,
        ..config()
    })
    .with_module(Alpha {
        ticks: Arc::clone(&ticks),
        stopped: Arc::new(AtomicUsize::new(0)),
    })
    .build();

    stop_after(&kernel, Duration::from_secs(2));
    assert!(kernel.run().await.is_ok());
    assert_eq!(ticks.load(Ordering::SeqCst), 0);
}
