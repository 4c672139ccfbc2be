//! # Example: Module Host
//!
//! Two modules on one kernel:
//! - `Pinger` publishes a `Ping` every tick and owns a resident heartbeat loop;
//! - `Counter` handles `Ping` as supervised module work and fails every 7th one.
//!
//! Run with `RUST_LOG=info cargo run --example host`. The kernel stops after
//! two seconds, or on Ctrl-C.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use modvisor::{Kernel, KernelConfig, Module, ModuleRuntime, Subscription, TaskError, TaskKind};

#[derive(Debug)]
struct Ping(u64);

struct Pinger {
    seq: AtomicU64,
}

#[async_trait]
impl Module for Pinger {
    async fn start(&self, rt: &ModuleRuntime) -> Result<(), TaskError> {
        let token = rt.lifetime_token();
        let _heartbeat = rt.run(
            "heartbeat",
            TaskKind::Resident,
            |ctx| async move {
                let mut beat = tokio::time::interval(Duration::from_millis(500));
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(TaskError::Canceled),
                        _ = beat.tick() => tracing::debug!("heartbeat"),
                    }
                }
            },
            token,
        );
        Ok(())
    }

    async fn tick(&self, rt: &ModuleRuntime) -> Result<(), TaskError> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        rt.publish(Ping(n));
        Ok(())
    }
}

#[derive(Default)]
struct Counter {
    seen: Arc<AtomicU64>,
    sub: Mutex<Option<Subscription>>,
}

#[async_trait]
impl Module for Counter {
    async fn start(&self, rt: &ModuleRuntime) -> Result<(), TaskError> {
        let seen = Arc::clone(&self.seen);
        let sub: Subscription = rt.subscribe("on-ping", move |ping: Arc<Ping>, _ctx| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::Relaxed);
                if ping.0 % 7 == 6 {
                    return Err(TaskError::fail(format!("ping {} rejected", ping.0)));
                }
                Ok(())
            }
        });
        *self.sub.lock() = Some(sub);
        Ok(())
    }

    async fn stop(&self, _rt: &ModuleRuntime) -> Result<(), TaskError> {
        if let Some(sub) = self.sub.lock().take() {
            sub.dispose();
        }
        println!("[counter] handled {} pings", self.seen.load(Ordering::Relaxed));
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = KernelConfig {
        tick_interval: Duration::from_millis(200),
        grace: Duration::from_secs(1),
        ..KernelConfig::default()
    };

    let kernel = Kernel::builder(cfg)
        .with_module(Pinger {
            seq: AtomicU64::new(0),
        })
        .with_module(Counter::default())
        .with_log_writer(true)
        .with_os_signals(true)
        .build();

    let token = kernel.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        token.cancel();
    });

    kernel.run().await?;
    Ok(())
}
