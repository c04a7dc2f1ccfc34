//! Abort-on-supersede fetches.
//!
//! A resource refreshed by several triggers (e.g. a burst of `kpi-changed`
//! events) must never have an older response overwrite a newer one. Starting
//! a fetch aborts the previous one and bumps a generation counter; a response
//! is applied only if its generation is still current when it arrives.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// One superseding fetch slot per resource.
#[derive(Debug, Clone)]
pub struct SupersedingFetch {
    name: &'static str,
    slot: Arc<Mutex<Slot>>,
}

impl SupersedingFetch {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Start `fetch`, aborting any fetch still in flight. `apply` runs with
    /// the result only if no newer fetch was started meanwhile.
    ///
    /// Returns the generation of the new fetch.
    pub fn spawn<T, F>(&self, fetch: F, apply: impl FnOnce(T) + Send + 'static) -> u64
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(previous) = slot.task.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.slot);
        let name = self.name;
        slot.task = Some(tokio::spawn(async move {
            let value = fetch.await;
            let current = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if current.generation == generation {
                apply(value);
            } else {
                debug!(resource = name, generation, "Discarding superseded response");
            }
        }));
        generation
    }

    /// Generation of the most recently started fetch.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Wait for the current fetch to finish (or be aborted).
    pub async fn settle(&self) {
        let task = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .task
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Abort the fetch in flight, if any.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
    }
}
