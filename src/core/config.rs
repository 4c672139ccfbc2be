//! # Global kernel configuration.
//!
//! Provides [`KernelConfig`] centralized settings for the bus, the per-module
//! supervisors and the host loop.
//!
//! Config is used in three places:
//! 1. **Bus creation**: `MessageBus::new(&config)` (flood control)
//! 2. **Runtime creation**: `ModuleRuntime::new(module, bus, &config)` (slow/hang thresholds)
//! 3. **Kernel**: `Kernel::builder(config)` (tick interval, shutdown grace)
//!
//! ## Sentinel values
//! - `flood_threshold = 0` → flood control disabled
//! - `tick_interval = 0s` → modules are never ticked
//! - `sweep_every = 0` → task history is only swept by `wait_all`

use std::time::Duration;

/// Global configuration for the kernel.
///
/// ## Field semantics
/// - `slow_threshold`: finite work running longer than this is reported slow (advisory)
/// - `hang_threshold`: finite work running longer than this is declared hung and detached
/// - `flood_threshold`: messages per `(module, type)` per window before the bus drops them
/// - `flood_window`: length of the flood-control window
/// - `grace`: how long shutdown waits for outstanding work before abandoning it
/// - `tick_interval`: host-loop tick period
/// - `sweep_every`: task-history compaction interval (in accepted tasks)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct KernelConfig {
    /// Elapsed time after which a finished finite task is reported as slow.
    ///
    /// Slowness never interrupts the work.
    pub slow_threshold: Duration,

    /// Elapsed time after which the watchdog declares a finite task hung.
    ///
    /// A hung task is detached: the supervisor stops waiting on it, but the
    /// work itself keeps running in the background until it returns.
    pub hang_threshold: Duration,

    /// Messages allowed per `(module, message type)` within one window.
    ///
    /// - `0` = flood control disabled
    /// - `n > 0` = message `n + 1` triggers one flood notification; it and all
    ///   further messages in the window are dropped
    pub flood_threshold: u32,

    /// Flood-control window length.
    pub flood_window: Duration,

    /// Maximum time shutdown waits for outstanding finite work per module.
    ///
    /// `0s` means "do not wait": everything still running is abandoned immediately.
    pub grace: Duration,

    /// Period between host-loop ticks.
    ///
    /// - `Duration::ZERO` = ticking disabled
    pub tick_interval: Duration,

    /// Number of accepted tasks between task-history sweeps.
    ///
    /// - `0` = only sweep during `wait_all`
    pub sweep_every: usize,
}

impl KernelConfig {
    /// Returns the flood threshold as an `Option`.
    ///
    /// - `None` → flood control disabled
    /// - `Some(n)` → at most `n` messages per key per window
    #[inline]
    pub fn flood_limit(&self) -> Option<u32> {
        if self.flood_threshold == 0 {
            None
        } else {
            Some(self.flood_threshold)
        }
    }

    /// Returns the tick period as an `Option`.
    ///
    /// - `None` → modules are never ticked
    #[inline]
    pub fn tick_period(&self) -> Option<Duration> {
        if self.tick_interval == Duration::ZERO {
            None
        } else {
            Some(self.tick_interval)
        }
    }

    /// Returns the sweep interval as an `Option`.
    #[inline]
    pub fn sweep_interval(&self) -> Option<usize> {
        if self.sweep_every == 0 {
            None
        } else {
            Some(self.sweep_every)
        }
    }

    /// Returns a flood window clamped to at least one millisecond.
    ///
    /// A zero window would reset every counter on every message.
    #[inline]
    pub fn flood_window_clamped(&self) -> Duration {
        self.flood_window.max(Duration::from_millis(1))
    }
}

impl Default for KernelConfig {
    /// Default configuration:
    ///
    /// - `slow_threshold = 1s`
    /// - `hang_threshold = 5s`
    /// - `flood_threshold = 10_000`, `flood_window = 1s`
    /// - `grace = 5s`
    /// - `tick_interval = 100ms`
    /// - `sweep_every = 256`
    fn default() -> Self {
        Self {
            slow_threshold: Duration::from_secs(1),
            hang_threshold: Duration::from_secs(5),
            flood_threshold: 10_000,
            flood_window: Duration::from_secs(1),
            grace: Duration::from_secs(5),
            tick_interval: Duration::from_millis(100),
            sweep_every: 256,
        }
    }
}
