//! Optimistic mutations with rollback.
//!
//! # Protocol
//!
//! 1. Capture a snapshot of the store state the mutation touches (its
//!    [`Scope`]).
//! 2. Apply the mutation locally, so every surface shows it immediately.
//! 3. Send the authoritative request.
//! 4. On success, replace local state with the server's canonical body.
//! 5. On failure, restore the snapshot and publish one failure notice.
//! 6. Either way, clear the in-flight indicator.
//!
//! [`Transaction`] is the begin/commit/abort primitive; [`optimistic`] runs
//! the whole protocol around a request future. Two optimistic mutations
//! racing on the same field resolve last-response-wins.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use crate::error::add_breadcrumb;
use crate::events::{EventBus, Notice};
use crate::store::Store;

/// State carrying an in-flight (loading) indicator.
pub trait InFlight {
    /// Set or clear the indicator.
    fn set_in_flight(&mut self, in_flight: bool);
}

/// The part of a store's state an optimistic mutation touches.
///
/// `capture` runs in the same write as the local mutation; `restore` writes
/// the captured value back on rollback and leaves everything else alone.
pub trait Scope<S>: Send {
    /// The captured pre-mutation value.
    type Saved: Send;

    /// Capture the scoped value from the pre-mutation state.
    fn capture(&self, state: &S) -> Self::Saved;

    /// Write the captured value back.
    fn restore(&self, state: &mut S, saved: Self::Saved);
}

/// Scope covering the whole state, for stores that hold a single entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whole;

impl<S: Clone + Send> Scope<S> for Whole {
    type Saved = S;

    fn capture(&self, state: &S) -> S {
        state.clone()
    }

    fn restore(&self, state: &mut S, saved: S) {
        *state = saved;
    }
}

/// A locally applied mutation awaiting server confirmation.
///
/// Dropping an unsettled transaction aborts it.
#[must_use = "an unsettled transaction rolls back when dropped"]
pub struct Transaction<'a, S, Sc = Whole>
where
    S: Clone + PartialEq + Send + Sync + 'static,
    Sc: Scope<S>,
{
    store: &'a Store<S>,
    scope: Sc,
    saved: Option<Sc::Saved>,
}

impl<S> Store<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    /// Snapshot the whole state and apply `apply` in one atomic step.
    pub fn begin(&self, apply: impl FnOnce(&mut S)) -> Transaction<'_, S> {
        self.begin_scoped(Whole, apply)
    }

    /// Capture `scope` and apply `apply` in one atomic step.
    pub fn begin_scoped<Sc: Scope<S>>(
        &self,
        scope: Sc,
        apply: impl FnOnce(&mut S),
    ) -> Transaction<'_, S, Sc> {
        let mut saved = None;
        self.update(|state| {
            saved = Some(scope.capture(state));
            apply(state);
        });
        Transaction {
            store: self,
            scope,
            saved,
        }
    }
}

impl<S, Sc> Transaction<'_, S, Sc>
where
    S: Clone + PartialEq + Send + Sync + 'static,
    Sc: Scope<S>,
{
    /// The scoped value as it was before the mutation.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&Sc::Saved> {
        self.saved.as_ref()
    }

    /// Settle with the server's canonical representation.
    pub fn commit(mut self, reconcile: impl FnOnce(&mut S)) {
        self.saved = None;
        self.store.update(reconcile);
    }

    /// Restore the captured scope.
    pub fn abort(mut self) {
        self.rollback();
    }

    fn rollback(&mut self) {
        if let Some(saved) = self.saved.take() {
            let scope = &self.scope;
            self.store.update(|state| scope.restore(state, saved));
        }
    }
}

impl<S, Sc> Drop for Transaction<'_, S, Sc>
where
    S: Clone + PartialEq + Send + Sync + 'static,
    Sc: Scope<S>,
{
    fn drop(&mut self) {
        if self.saved.is_some() {
            warn!(store = self.store.name(), "Optimistic transaction dropped unsettled, rolling back");
            self.rollback();
        }
    }
}

/// Run the optimistic protocol around `request`.
///
/// `apply` is the local guess; `reconcile` receives the server's body and
/// writes the canonical state. The in-flight indicator is set with `apply`
/// and cleared after the outcome is written. On failure only `scope` is
/// restored, so concurrent writes outside it survive.
///
/// # Errors
///
/// Returns the request's error after the scope has been restored and a
/// failure notice has been published on `bus`.
pub async fn optimistic<S, Sc, T, E, Fut>(
    store: &Store<S>,
    bus: &EventBus,
    action: &str,
    scope: Sc,
    apply: impl FnOnce(&mut S),
    request: Fut,
    reconcile: impl FnOnce(&mut S, T),
) -> Result<(), E>
where
    S: InFlight + Clone + PartialEq + Send + Sync + 'static,
    Sc: Scope<S>,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let transaction = store.begin_scoped(scope, |state| {
        apply(state);
        state.set_in_flight(true);
    });

    match request.await {
        Ok(body) => {
            transaction.commit(|state| {
                reconcile(state, body);
                state.set_in_flight(false);
            });
            debug!(store = store.name(), action, "Optimistic mutation confirmed");
            Ok(())
        }
        Err(e) => {
            transaction.abort();
            store.update(|state| state.set_in_flight(false));

            warn!(store = store.name(), action, error = %e, "Optimistic mutation rolled back");
            add_breadcrumb("optimistic", "Rolled back", Some(&[("action", action)]));
            bus.notify(Notice::failure(action, e.to_string()));
            Err(e)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::events::{NoticeLevel, StoreEvent};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Toggle {
        active: bool,
        label: String,
        loading: bool,
    }

    impl InFlight for Toggle {
        fn set_in_flight(&mut self, in_flight: bool) {
            self.loading = in_flight;
        }
    }

    #[test]
    fn test_abort_restores_snapshot() {
        let store = Store::new("toggle", Toggle::default());
        let tx = store.begin(|state| state.active = true);
        assert!(store.get().active);

        tx.abort();
        assert_eq!(store.get(), Toggle::default());
    }

    struct ActiveOnly;

    impl Scope<Toggle> for ActiveOnly {
        type Saved = bool;

        fn capture(&self, state: &Toggle) -> bool {
            state.active
        }

        fn restore(&self, state: &mut Toggle, saved: bool) {
            state.active = saved;
        }
    }

    #[test]
    fn test_scoped_abort_keeps_writes_outside_scope() {
        let store = Store::new("toggle", Toggle::default());
        let tx = store.begin_scoped(ActiveOnly, |state| state.active = true);
        store.update(|state| state.label = "renamed".to_string());

        tx.abort();
        let state = store.get();
        assert!(!state.active);
        assert_eq!(state.label, "renamed");
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = Store::new("toggle", Toggle::default());
        {
            let _tx = store.begin(|state| state.active = true);
        }
        assert!(!store.get().active);
    }

    #[tokio::test]
    async fn test_success_uses_server_representation() {
        let store = Store::new("toggle", Toggle::default());
        let bus = EventBus::new();

        let result: Result<(), String> = optimistic(
            &store,
            &bus,
            "Toggle",
            Whole,
            |state| state.active = true,
            async { Ok(("server label".to_string(), true)) },
            |state, (label, active)| {
                state.label = label;
                state.active = active;
            },
        )
        .await;

        assert!(result.is_ok());
        let state = store.get();
        assert!(state.active);
        assert_eq!(state.label, "server label");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_optimistic_value_visible_while_in_flight() {
        let store = Store::new("toggle", Toggle::default());
        let bus = EventBus::new();
        let mut rx = store.subscribe();

        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let observer = async {
            rx.changed().await.unwrap();
            let seen = rx.borrow_and_update().clone();
            release.send(()).unwrap();
            seen
        };
        let mutation = optimistic(
            &store,
            &bus,
            "Toggle",
            Whole,
            |state| state.active = true,
            async {
                wait.await.map_err(|e| e.to_string())?;
                Err::<bool, String>("boom".to_string())
            },
            |state, active| state.active = active,
        );

        let (seen, result) = tokio::join!(observer, mutation);
        assert!(seen.active);
        assert!(seen.loading);
        assert!(result.is_err());
        assert_eq!(store.get(), Toggle::default());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_notifies_once() {
        let store = Store::new("toggle", Toggle::default());
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        let result = optimistic(
            &store,
            &bus,
            "Toggle",
            Whole,
            |state| state.active = true,
            async { Err::<bool, _>("HTTP 500") },
            |state, active| state.active = active,
        )
        .await;

        assert_eq!(result, Err("HTTP 500"));
        assert_eq!(store.get(), Toggle::default());

        match events.try_recv().unwrap() {
            StoreEvent::Notice(notice) => {
                assert_eq!(notice.level, NoticeLevel::Failure);
                assert_eq!(notice.message, "HTTP 500");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
