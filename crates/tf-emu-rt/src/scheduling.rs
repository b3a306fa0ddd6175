//! ---
//! emu_section: "04-runtime"
//! emu_subsection: "module"
//! emu_type: "source"
//! emu_scope: "code"
//! emu_description: "Runtime helpers supporting device runtimes."
//! emu_version: "v0.1.0"
//! emu_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Fixed-cadence timer whose first tick lands one full period after start.
#[derive(Debug)]
pub struct PeriodicTimer {
    interval: Interval,
    period: Duration,
}

impl PeriodicTimer {
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now() + period, period)
    }

    /// Timer whose first tick fires at `start`.
    pub fn starting_at(start: Instant, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

/// Spawn a task that runs `body` once per `period`, forever.
///
/// The schedule is anchored when this is called, not when the task is first
/// polled, so the first run happens exactly one period later. `body` runs
/// synchronously between ticks; aborting the returned handle stops the loop
/// at its next await point and never interrupts a run in progress.
pub fn spawn_periodic<F>(handle: &Handle, period: Duration, mut body: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let start = Instant::now() + period;
    handle.spawn(async move {
        let mut timer = PeriodicTimer::starting_at(start, period);
        loop {
            timer.tick().await;
            body();
        }
    })
}

/// Named set of long running tasks joined together on shutdown.
#[derive(Debug)]
pub struct TaskGroup {
    handle: Handle,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl TaskGroup {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tasks: Vec::new(),
        }
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.handle.spawn(fut);
        self.tasks.push((name.into(), handle));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn abort_all(&self) {
        for (_, task) in &self.tasks {
            task.abort();
        }
    }

    /// Wait for every task; cancelled tasks count as finished, panics as errors.
    pub async fn join(self) -> Result<()> {
        let mut failures = Vec::new();
        for (name, task) in self.tasks {
            match task.await {
                Ok(()) => debug!(task = %name, "task finished"),
                Err(err) if err.is_cancelled() => debug!(task = %name, "task cancelled"),
                Err(err) => {
                    warn!(task = %name, error = %err, "task failed");
                    failures.push(name);
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("task join failure: {}", failures.join(", ")))
        }
    }
}

/// Keyed task handles where starting a key replaces its previous task.
#[derive(Debug)]
pub struct TaskSlots<K> {
    slots: Mutex<HashMap<K, JoinHandle<()>>>,
}

impl<K> Default for TaskSlots<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> TaskSlots<K>
where
    K: Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `task` under `key`, aborting whatever ran there before.
    /// Returns whether a previous task was replaced.
    pub fn replace(&self, key: K, task: JoinHandle<()>) -> bool {
        match self.slots.lock().insert(key, task) {
            Some(previous) => {
                previous.abort();
                true
            }
            None => false,
        }
    }

    /// Abort the task under `key`; returns whether one was present.
    pub fn cancel(&self, key: &K) -> bool {
        match self.slots.lock().remove(key) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &K) -> bool {
        self.slots
            .lock()
            .get(key)
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn abort_all(&self) {
        for (key, task) in self.slots.lock().drain() {
            debug!(?key, "aborting task");
            task.abort();
        }
    }
}

impl<K> Drop for TaskSlots<K> {
    fn drop(&mut self) {
        for (_, task) in self.slots.get_mut().drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_first_runs_one_period_after_spawn() {
        let (count, body) = counter();
        let task = spawn_periodic(&Handle::current(), Duration::from_millis(100), body);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_slot_stops_the_old_task() {
        let slots = TaskSlots::new();
        let (old_count, old_body) = counter();
        let (new_count, new_body) = counter();
        let handle = Handle::current();

        assert!(!slots.replace("cb", spawn_periodic(&handle, Duration::from_millis(100), old_body)));
        sleep(Duration::from_millis(150)).await;
        assert!(slots.replace("cb", spawn_periodic(&handle, Duration::from_millis(300), new_body)));
        sleep(Duration::from_millis(400)).await;

        assert_eq!(old_count.load(Ordering::SeqCst), 1);
        assert_eq!(new_count.load(Ordering::SeqCst), 1);
        assert!(slots.is_running(&"cb"));
        assert!(slots.cancel(&"cb"));
        assert!(!slots.is_running(&"cb"));
        assert!(!slots.cancel(&"cb"));
    }

    #[tokio::test(start_paused = true)]
    async fn task_group_join_treats_aborts_as_finished() {
        let mut group = TaskGroup::new(Handle::current());
        group.spawn("forever", async {
            loop {
                sleep(Duration::from_secs(1)).await;
            }
        });
        group.spawn("quick", async {});
        assert_eq!(group.len(), 2);
        group.abort_all();
        group.join().await.unwrap();
    }
}
