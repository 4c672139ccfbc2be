mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::Recorder;
use modvisor::{KernelConfig, MessageBus, ModuleId, ModuleRuntime, TaskKind, sync_scope};

#[derive(Debug)]
struct Ping;

struct Chatty;
struct Sink;

fn counting(bus: &MessageBus) -> Arc<AtomicUsize> {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let _sub = bus.subscribe_kernel(move |_: Arc<Ping>| {
        h.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    });
    hits
}

fn limited(threshold: u32) -> KernelConfig {
    KernelConfig {
        flood_threshold: threshold,
        flood_window: Duration::from_secs(1),
        ..KernelConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_over_threshold_floods_once() {
    let bus = MessageBus::new(&limited(10));
    let rec = Recorder::attach(&bus);
    let hits = counting(&bus);
    let chatty = ModuleId::of::<Chatty>();

    sync_scope(chatty, || {
        for _ in 0..11 {
            bus.publish(Ping);
        }
    });
    assert_eq!(hits.load(Ordering::SeqCst), 10);
    assert_eq!(rec.count("[flooded] module=Chatty message=Ping count=11"), 1);

    sync_scope(chatty, || {
        for _ in 0..50 {
            bus.publish(Ping);
        }
    });
    assert_eq!(hits.load(Ordering::SeqCst), 10);
    assert_eq!(rec.count("[flooded]"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_window_reset_resumes_delivery() {
    let bus = MessageBus::new(&limited(3));
    let rec = Recorder::attach(&bus);
    let hits = counting(&bus);
    let chatty = ModuleId::of::<Chatty>();

    sync_scope(chatty, || (0..5).for_each(|_| bus.publish(Ping)));
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    tokio::time::advance(Duration::from_secs(1)).await;

    sync_scope(chatty, || (0..4).for_each(|_| bus.publish(Ping)));
    assert_eq!(hits.load(Ordering::SeqCst), 6);
    assert_eq!(rec.count("[flooded]"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_budget_is_per_module() {
    let bus = MessageBus::new(&limited(2));
    let hits = counting(&bus);

    sync_scope(ModuleId::of::<Chatty>(), || (0..2).for_each(|_| bus.publish(Ping)));
    sync_scope(ModuleId::of::<Sink>(), || (0..2).for_each(|_| bus.publish(Ping)));
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_unscoped_and_disabled_publishes_are_never_counted() {
    let bus = MessageBus::new(&limited(2));
    let hits = counting(&bus);
    (0..20).for_each(|_| bus.publish(Ping));
    assert_eq!(hits.load(Ordering::SeqCst), 20);

    let bus = MessageBus::new(&limited(0));
    let hits = counting(&bus);
    sync_scope(ModuleId::of::<Chatty>(), || (0..20).for_each(|_| bus.publish(Ping)));
    assert_eq!(hits.load(Ordering::SeqCst), 20);
}

#[tokio::test(start_paused = true)]
async fn test_thousand_supervised_publishers_stay_under_threshold() {
    let cfg = KernelConfig::default();
    let bus = MessageBus::new(&cfg);
    let rec = Recorder::attach(&bus);
    let chatty = ModuleRuntime::new(ModuleId::of::<Chatty>(), bus.clone(), &cfg);
    let sink = ModuleRuntime::new(ModuleId::of::<Sink>(), bus.clone(), &cfg);

    let received = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&received);
    let _sub = sink.subscribe("on-ping", move |_: Arc<Ping>, _ctx: CancellationToken| {
        r.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    });

    let token = CancellationToken::new();
    for i in 0..1_000 {
        let bus = bus.clone();
        drop(chatty.run(
            format!("send-{i}"),
            TaskKind::Finite,
            move |_ctx| async move {
                bus.publish(Ping);
                Ok(())
            },
            token.clone(),
        ));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(received.load(Ordering::SeqCst), 1_000);
    assert_eq!(rec.count("[completed] module=Sink task=on-ping"), 1_000);
    assert_eq!(rec.count("[completed] module=Chatty"), 1_000);
    assert_eq!(rec.count("[flooded]"), 0);
}
