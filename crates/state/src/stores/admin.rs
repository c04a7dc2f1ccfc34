//! Admin dashboard snapshot: orders, customers and the latest KPIs.

use serde_json::Value;
use shopfront_core::Record;
use tracing::warn;

use crate::api::{AdminApi, ApiError};
use crate::realtime::Change;
use crate::store::Store;

/// Dashboard data. Not persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminState {
    pub orders: Vec<Record>,
    pub customers: Vec<Record>,
    pub kpis: Option<Value>,
}

fn apply_record(records: &mut Vec<Record>, change: &Change<Record>) {
    match change {
        Change::Created(record) => {
            let Some(id) = record.id() else {
                warn!("Ignoring created record without an id");
                return;
            };
            if !records.iter().any(|existing| existing.matches(id)) {
                records.push(record.clone());
            }
        }
        Change::Updated(record) => {
            if let Some(id) = record.id()
                && let Some(existing) = records.iter_mut().find(|existing| existing.matches(id))
            {
                existing.merge(record);
            }
        }
        Change::Deleted(id) => records.retain(|record| !record.matches(id)),
    }
}

/// Admin dashboard store.
#[derive(Debug)]
pub struct AdminSnapshot {
    store: Store<AdminState>,
}

impl AdminSnapshot {
    /// An empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Store::new("admin", AdminState::default()),
        }
    }

    /// The underlying observable store.
    #[must_use]
    pub const fn store(&self) -> &Store<AdminState> {
        &self.store
    }

    /// Fetch orders, customers and KPIs.
    ///
    /// # Errors
    ///
    /// Returns the first API error; the snapshot is only written when every
    /// read succeeded.
    pub async fn load(&self, api: &dyn AdminApi) -> Result<(), ApiError> {
        let (orders, customers, kpis) =
            futures::try_join!(api.orders(), api.customers(), api.kpis())?;
        self.store.update(|state| {
            state.orders = orders;
            state.customers = customers;
            state.kpis = Some(kpis);
        });
        Ok(())
    }

    /// Apply an order change.
    pub fn apply_orders(&self, change: &Change<Record>) {
        self.store.update(|state| apply_record(&mut state.orders, change));
    }

    /// Apply a customer change.
    pub fn apply_customers(&self, change: &Change<Record>) {
        self.store
            .update(|state| apply_record(&mut state.customers, change));
    }

    /// Replace the order list.
    pub fn replace_orders(&self, orders: Vec<Record>) {
        self.store.update(|state| state.orders = orders);
    }

    /// Replace the customer list.
    pub fn replace_customers(&self, customers: Vec<Record>) {
        self.store.update(|state| state.customers = customers);
    }

    /// Replace the KPI payload.
    pub fn replace_kpis(&self, kpis: Value) {
        self.store.update(|state| state.kpis = Some(kpis));
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Record> {
        self.store.read(|state| state.orders.clone())
    }

    #[must_use]
    pub fn customers(&self) -> Vec<Record> {
        self.store.read(|state| state.customers.clone())
    }

    #[must_use]
    pub fn kpis(&self) -> Option<Value> {
        self.store.read(|state| state.kpis.clone())
    }
}

impl Default for AdminSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
