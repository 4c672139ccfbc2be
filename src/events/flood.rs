//! # Per-(module, message type) flood control.
//!
//! [`FloodControl`] keeps one fixed window counter per `(ModuleId, MessageType)`.
//!
//! ## Rules
//! - Counters are created lazily on the first publish for a key.
//! - A counter resets once `window` has elapsed since its window start.
//! - Messages `1..=limit` are delivered; message `limit + 1` yields exactly one
//!   [`Admission::Flooded`]; every further message in the window is [`Admission::Drop`].
//! - Each counter is mutated under its map shard's guard; no guard outlives `admit`.
//!
//! ```text
//! count:  1 .. limit │ limit+1  │ limit+2 ..      │ (window elapsed) 1 ..
//!         Deliver    │ Flooded  │ Drop            │ Deliver
//! ```

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::context::ModuleId;
use crate::events::MessageType;

/// Outcome of one flood-control check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Under the limit: dispatch the message.
    Deliver,
    /// First message over the limit in this window: notify once, drop the message.
    Flooded { count: u32, elapsed: Duration },
    /// Already flooded in this window: drop silently.
    Drop,
}

#[derive(Debug)]
struct FloodCounter {
    window_start: Instant,
    count: u32,
}

/// Fixed-window counters keyed by `(module, message type)`.
pub(crate) struct FloodControl {
    limit: Option<u32>,
    window: Duration,
    counters: DashMap<(ModuleId, MessageType), FloodCounter>,
}

impl FloodControl {
    /// `limit = None` disables flood control entirely.
    pub(crate) fn new(limit: Option<u32>, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: DashMap::new(),
        }
    }

    /// Counts one message from `module` of type `ty` and decides its fate.
    pub(crate) fn admit(&self, module: ModuleId, ty: MessageType) -> Admission {
        let Some(limit) = self.limit else {
            return Admission::Deliver;
        };

        let now = Instant::now();
        let mut counter = self
            .counters
            .entry((module, ty))
            .or_insert_with(|| FloodCounter {
                window_start: now,
                count: 0,
            });

        if now.duration_since(counter.window_start) >= self.window {
            counter.window_start = now;
            counter.count = 0;
        }
        counter.count = counter.count.saturating_add(1);

        if counter.count <= limit {
            Admission::Deliver
        } else if counter.count == limit.saturating_add(1) {
            Admission::Flooded {
                count: counter.count,
                elapsed: now.duration_since(counter.window_start),
            }
        } else {
            Admission::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chatty;
    struct Quiet;
    struct Ping;
    struct Pong;

    fn control(limit: u32) -> FloodControl {
        FloodControl::new(Some(limit), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_crossed_once_per_window() {
        let flood = control(3);
        let key = (ModuleId::of::<Chatty>(), MessageType::of::<Ping>());

        for _ in 0..3 {
            assert_eq!(flood.admit(key.0, key.1), Admission::Deliver);
        }
        assert!(matches!(
            flood.admit(key.0, key.1),
            Admission::Flooded { count: 4, .. }
        ));
        for _ in 0..10 {
            assert_eq!(flood.admit(key.0, key.1), Admission::Drop);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_elapsed_resets_counter() {
        let flood = control(2);
        let (m, t) = (ModuleId::of::<Chatty>(), MessageType::of::<Ping>());

        flood.admit(m, t);
        flood.admit(m, t);
        tokio::time::advance(Duration::from_millis(400)).await;
        match flood.admit(m, t) {
            Admission::Flooded { count, elapsed } => {
                assert_eq!(count, 3);
                assert_eq!(elapsed, Duration::from_millis(400));
            }
            other => panic!("expected flood, got {other:?}"),
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(flood.admit(m, t), Admission::Deliver);
        assert_eq!(flood.admit(m, t), Admission::Deliver);
        assert!(matches!(flood.admit(m, t), Admission::Flooded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let flood = control(1);
        let chatty = ModuleId::of::<Chatty>();
        let quiet = ModuleId::of::<Quiet>();

        assert_eq!(flood.admit(chatty, MessageType::of::<Ping>()), Admission::Deliver);
        assert!(matches!(
            flood.admit(chatty, MessageType::of::<Ping>()),
            Admission::Flooded { .. }
        ));
        assert_eq!(flood.admit(chatty, MessageType::of::<Pong>()), Admission::Deliver);
        assert_eq!(flood.admit(quiet, MessageType::of::<Ping>()), Admission::Deliver);
    }

    #[test]
    fn test_disabled_always_delivers() {
        let flood = FloodControl::new(None, Duration::from_secs(1));
        for _ in 0..100 {
            assert_eq!(
                flood.admit(ModuleId::of::<Chatty>(), MessageType::of::<Ping>()),
                Admission::Deliver
            );
        }
    }
}
