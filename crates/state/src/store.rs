//! Observable state container shared by every entity store.
//!
//! A [`Store`] owns one state value behind a `tokio::sync::watch` channel.
//! Readers borrow or clone the current value; surfaces that need to
//! re-render call [`Store::subscribe`] and await `changed()`.
//!
//! Writers are serialized, and every mutation runs against a draft copy
//! that replaces the current state only when the mutation succeeds and
//! actually changed something. Subscribers therefore never observe a
//! half-applied mutation, and idempotent writes (a duplicated real-time
//! event, a repeated refetch) do not wake anyone.
//!
//! A persistent store encodes its durable projection under the write lock
//! and hands it to a [`WriteBehind`] queue; the I/O happens elsewhere.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::persist::{PersistentStore, Persisted, WriteBehind};

type PersistHook<S> = Box<dyn Fn(&S) + Send + Sync>;

/// An observable, optionally persisted state cell.
pub struct Store<S> {
    name: &'static str,
    tx: watch::Sender<S>,
    write_lock: Mutex<()>,
    persist: Option<PersistHook<S>>,
    writer: Option<Arc<WriteBehind>>,
}

impl<S> std::fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("persistent", &self.persist.is_some())
            .finish_non_exhaustive()
    }
}

impl<S> Store<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create an in-memory store with an initial state.
    #[must_use]
    pub fn new(name: &'static str, initial: S) -> Self {
        Self {
            name,
            tx: watch::Sender::new(initial),
            write_lock: Mutex::new(()),
            persist: None,
            writer: None,
        }
    }

    /// Logical name of the store.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Clone the current state.
    #[must_use]
    pub fn get(&self) -> S {
        self.tx.borrow().clone()
    }

    /// Read from the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    /// Apply an infallible mutation. Returns whether the state changed.
    pub fn update(&self, f: impl FnOnce(&mut S)) -> bool {
        let result: Result<bool, std::convert::Infallible> = self.try_update(|state| {
            f(state);
            Ok(())
        });
        result.unwrap_or_else(|never| match never {})
    }

    /// Apply a fallible mutation.
    ///
    /// On `Err` nothing is written. On `Ok` the draft replaces the current
    /// state if it differs, subscribers are notified, and the durable
    /// projection is queued for saving. Returns whether the state changed.
    ///
    /// # Errors
    ///
    /// Returns whatever error the mutation returns.
    pub fn try_update<E>(&self, f: impl FnOnce(&mut S) -> Result<(), E>) -> Result<bool, E> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut draft = self.tx.borrow().clone();
        f(&mut draft)?;

        let changed = self.tx.send_if_modified(|state| {
            if *state == draft {
                false
            } else {
                *state = draft;
                true
            }
        });

        if changed && let Some(persist) = &self.persist {
            persist(&self.tx.borrow());
        }

        Ok(changed)
    }

    /// Replace the whole state. Returns whether the state changed.
    pub fn replace(&self, state: S) -> bool {
        self.update(|current| *current = state)
    }

    /// Wait until every queued save has reached storage.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }
}

impl<S> Store<S>
where
    S: Persisted + Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a store that restores its durable projection from `storage`
    /// and saves it after every change.
    ///
    /// Inside a tokio runtime saves are written by a background task; call
    /// [`Store::flush`] to wait for them.
    #[must_use]
    pub fn persistent(storage: PersistentStore, fallback: S) -> Self {
        let initial = storage
            .load::<S::Durable>(S::NAME)
            .map_or(fallback, S::from_durable);

        let writer = Arc::new(WriteBehind::new(S::NAME, storage));
        let queue = Arc::clone(&writer);
        let persist: PersistHook<S> = Box::new(move |state: &S| {
            queue.save(&state.to_durable());
        });

        Self {
            name: S::NAME,
            tx: watch::Sender::new(initial),
            write_lock: Mutex::new(()),
            persist: Some(persist),
            writer: Some(writer),
        }
    }
}
