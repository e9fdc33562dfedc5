use std::future::Future;

use tokio::task::JoinHandle;

/// At most one in-flight background task of a kind.
///
/// Spawning aborts the previous task and bumps the generation. Results carry
/// the generation they were started with; anything but the latest is stale
/// and must be dropped. The in-flight task is aborted when the slot drops.
#[derive(Debug)]
pub struct TaskSlot {
    name: &'static str,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: 0,
            handle: None,
        }
    }

    pub fn spawn<F, Fut>(&mut self, make: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        self.handle = Some(tokio::spawn(make(self.generation)));
        tracing::debug!(task = self.name, generation = self.generation, "task started");
        self.generation
    }

    pub fn accepts(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Mark the task of `generation` done; `false` if it was stale.
    pub fn finish(&mut self, generation: u64) -> bool {
        if !self.accepts(generation) {
            tracing::debug!(task = self.name, generation, "dropping stale result");
            return false;
        }
        self.handle = None;
        true
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::debug!(task = self.name, generation = self.generation, "task cancelled");
            }
            handle.abort();
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
