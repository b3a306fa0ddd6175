//! ---
//! emu_section: "01-core-functionality"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Device runtime and orchestration."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
//! Callback timers, one per callback with an active period.
use std::time::Duration;

use tf_emu_rt::{spawn_periodic, TaskSlots};
use tokio::runtime::Handle;
use tracing::debug;

/// Whether a callback timer is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackState {
    Stopped,
    Running { period: Duration },
}

#[derive(Debug)]
pub(crate) struct CallbackScheduler {
    handle: Handle,
    timers: TaskSlots<usize>,
}

impl CallbackScheduler {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            handle,
            timers: TaskSlots::new(),
        }
    }

    /// Arm, re-arm or stop the timer of `callback`.
    ///
    /// A nonzero period (re)starts the timer, first firing one full period
    /// from now; zero cancels it before its next tick.
    pub(crate) fn apply<F>(&self, uid: &str, callback: usize, period_ms: u32, emit: F) -> CallbackState
    where
        F: FnMut() + Send + 'static,
    {
        if period_ms == 0 {
            if self.timers.cancel(&callback) {
                debug!(uid, callback, "callback stopped");
            }
            return CallbackState::Stopped;
        }
        let period = Duration::from_millis(u64::from(period_ms));
        let task = spawn_periodic(&self.handle, period, emit);
        let restarted = self.timers.replace(callback, task);
        debug!(uid, callback, period_ms, restarted, "callback armed");
        CallbackState::Running { period }
    }

    pub(crate) fn state(&self, callback: usize, period_ms: u32) -> CallbackState {
        if period_ms > 0 && self.timers.is_running(&callback) {
            CallbackState::Running {
                period: Duration::from_millis(u64::from(period_ms)),
            }
        } else {
            CallbackState::Stopped
        }
    }

    pub(crate) fn active(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn stop_all(&self) {
        self.timers.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counting(count: &Arc<AtomicUsize>) -> impl FnMut() + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_stops_the_timer() {
        let scheduler = CallbackScheduler::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));

        let state = scheduler.apply("abc", 0, 100, counting(&count));
        assert_eq!(state, CallbackState::Running { period: Duration::from_millis(100) });
        sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert_eq!(scheduler.apply("abc", 0, 0, counting(&count)), CallbackState::Stopped);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.state(0, 0), CallbackState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_restarts_without_an_early_tick() {
        let scheduler = CallbackScheduler::new(Handle::current());
        let count = Arc::new(AtomicUsize::new(0));

        scheduler.apply("abc", 0, 100, counting(&count));
        sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.apply("abc", 0, 1000, counting(&count));
        sleep(Duration::from_millis(900)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.active(), 1);
        assert_eq!(scheduler.state(0, 1000), CallbackState::Running { period: Duration::from_millis(1000) });

        scheduler.stop_all();
        assert_eq!(scheduler.active(), 0);
    }
}
