//! One-shot, cancellable timers.

use std::sync::Arc;

/// A handle to a scheduled one-shot timer.
///
/// Dropping the handle does not cancel the timer; call `cancel` explicitly.
pub trait TimerHandle: Send + Sync {
    /// Cancels the timer. A no-op if it already fired.
    fn cancel(&self);
}

/// Schedules one-shot, millisecond-granularity callbacks.
///
/// The consensus core uses exactly one timer per instance (the commit
/// window, §5); the leader's handle for it is never cancelled in practice
/// because an early round-one completion is simply observed and ignored
/// when the timer eventually fires. The trait still supports cancellation
/// generically, since a production host may reuse the same service for
/// other timeouts (e.g. view-change).
pub trait TimerService: Send + Sync + 'static {
    /// Schedules `callback` to run once, after `delay_ms` milliseconds.
    fn schedule(&self, delay_ms: u64, callback: Box<dyn FnOnce() + Send>) -> Arc<dyn TimerHandle>;
}
