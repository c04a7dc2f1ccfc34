//! Catalog snapshot: the client-side cache of per-product dynamic fields.
//!
//! Several writers touch the snapshot (add-to-cart decrements stock, checkout
//! records sales, admin edits, and the real-time channel). Every one of them
//! goes through [`CatalogSnapshotEntry::apply`], so `stock` and `sales_count`
//! are never negative and `in_stock` always equals `stock > 0`.

use serde::{Deserialize, Serialize};
use shopfront_core::{CatalogPatch, CatalogSnapshotEntry, ProductDocument, ProductId};
use tracing::debug;

use crate::api::{ApiError, ProductApi};
use crate::error::add_breadcrumb;
use crate::events::EventBus;
use crate::optimistic::{InFlight, Scope, optimistic};
use crate::persist::{PersistentStore, Persisted};
use crate::realtime::Change;
use crate::store::Store;

/// Snapshot entries plus the admin edit indicator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogState {
    pub entries: Vec<CatalogSnapshotEntry>,
    pub saving: bool,
}

impl CatalogState {
    fn find_mut(&mut self, id: &str) -> Option<&mut CatalogSnapshotEntry> {
        self.entries.iter_mut().find(|entry| entry.matches(id))
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(id))
    }

    fn insert_if_absent(&mut self, entry: CatalogSnapshotEntry) -> bool {
        let Some(key) = entry.key() else {
            return false;
        };
        if self.contains(key.as_str())
            || entry.id.as_ref().is_some_and(|id| self.contains(id.as_str()))
        {
            return false;
        }
        self.entries.push(entry);
        true
    }

    fn patch(&mut self, id: &str, patch: &CatalogPatch) -> bool {
        match self.find_mut(id) {
            Some(entry) => {
                entry.apply(patch);
                true
            }
            None => false,
        }
    }
}

impl InFlight for CatalogState {
    fn set_in_flight(&mut self, in_flight: bool) {
        self.saving = in_flight;
    }
}

/// Rollback scope of an admin edit: the one entry being edited.
struct EntryScope {
    key: String,
}

impl Scope<CatalogState> for EntryScope {
    type Saved = Option<CatalogSnapshotEntry>;

    fn capture(&self, state: &CatalogState) -> Self::Saved {
        state.entries.iter().find(|entry| entry.matches(&self.key)).cloned()
    }

    fn restore(&self, state: &mut CatalogState, saved: Self::Saved) {
        // An entry deleted while the request was in flight stays deleted
        let (Some(saved), Some(entry)) = (saved, state.find_mut(&self.key)) else {
            return;
        };
        entry.apply(&CatalogPatch::from(&saved));
        entry.category = saved.category;
        entry.main_image = saved.main_image;
    }
}

/// Persisted snapshot fields.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogDurable {
    #[serde(default)]
    pub entries: Vec<CatalogSnapshotEntry>,
}

impl Persisted for CatalogState {
    const NAME: &'static str = "catalog";
    type Durable = CatalogDurable;

    fn to_durable(&self) -> Self::Durable {
        CatalogDurable {
            entries: self.entries.clone(),
        }
    }

    fn from_durable(durable: Self::Durable) -> Self {
        let mut state = Self::default();
        for entry in durable.entries {
            state.insert_if_absent(entry);
        }
        state
    }
}

/// Shared catalog snapshot store.
#[derive(Debug)]
pub struct CatalogSnapshot {
    store: Store<CatalogState>,
}

impl CatalogSnapshot {
    /// An empty, non-persisted snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Store::new(CatalogState::NAME, CatalogState::default()),
        }
    }

    /// A snapshot restored from and saved to `storage`.
    #[must_use]
    pub fn persistent(storage: PersistentStore) -> Self {
        Self {
            store: Store::persistent(storage, CatalogState::default()),
        }
    }

    /// The underlying observable store.
    #[must_use]
    pub const fn store(&self) -> &Store<CatalogState> {
        &self.store
    }

    /// Insert every entry that is not already present.
    pub fn seed(&self, entries: impl IntoIterator<Item = CatalogSnapshotEntry>) {
        self.store.update(|state| {
            for entry in entries {
                state.insert_if_absent(entry);
            }
        });
    }

    /// Create the entry for `product` if it does not exist yet.
    pub fn ensure(&self, product: &ProductDocument) {
        self.insert_if_absent(CatalogSnapshotEntry::from(product));
    }

    /// Insert `entry` unless one with the same id exists. Returns whether it
    /// was inserted.
    pub fn insert_if_absent(&self, entry: CatalogSnapshotEntry) -> bool {
        let mut inserted = false;
        self.store.update(|state| inserted = state.insert_if_absent(entry));
        inserted
    }

    /// Shallow-merge `patch` into the entry identified by `id`.
    ///
    /// Returns `false` (and changes nothing) if no entry matches.
    pub fn update(&self, id: &str, patch: &CatalogPatch) -> bool {
        let mut matched = false;
        self.store.update(|state| matched = state.patch(id, patch));
        if !matched {
            debug!(product_id = id, "Catalog update for unknown product ignored");
        }
        matched
    }

    /// Add `delta` to an entry's stock. The result is clamped at zero.
    pub fn adjust_stock(&self, id: &str, delta: i64) -> bool {
        let mut matched = false;
        self.store.update(|state| {
            if let Some(entry) = state.find_mut(id) {
                let current = i64::try_from(entry.stock()).unwrap_or(i64::MAX);
                entry.apply(&CatalogPatch::stock(current.saturating_add(delta)));
                matched = true;
            }
        });
        matched
    }

    /// Count `quantity` units as sold.
    pub fn record_sale(&self, id: &str, quantity: u32) -> bool {
        let mut matched = false;
        self.store.update(|state| {
            if let Some(entry) = state.find_mut(id) {
                let current = i64::try_from(entry.sales_count()).unwrap_or(i64::MAX);
                entry.apply(&CatalogPatch {
                    sales_count: Some(current.saturating_add(i64::from(quantity))),
                    ..CatalogPatch::default()
                });
                matched = true;
            }
        });
        matched
    }

    /// Remove an entry. Removing an absent entry is a no-op.
    pub fn remove(&self, id: &str) {
        self.store
            .update(|state| state.entries.retain(|entry| !entry.matches(id)));
    }

    /// The entry identified by `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<CatalogSnapshotEntry> {
        self.store
            .read(|state| state.entries.iter().find(|entry| entry.matches(id)).cloned())
    }

    /// All entries.
    #[must_use]
    pub fn entries(&self) -> Vec<CatalogSnapshotEntry> {
        self.store.read(|state| state.entries.clone())
    }

    /// `product` with the snapshot's dynamic fields laid over it.
    #[must_use]
    pub fn overlay(&self, product: &ProductDocument) -> ProductDocument {
        let id = product.identity();
        self.get(id.as_str())
            .map_or_else(|| product.clone(), |entry| entry.overlay(product))
    }

    /// Apply an authoritative product change from the real-time channel.
    pub fn apply_remote(&self, change: &Change<CatalogPatch>) {
        self.store.update(|state| match change {
            Change::Created(patch) => {
                state.insert_if_absent(CatalogSnapshotEntry::from(patch.clone()));
            }
            Change::Updated(patch) => {
                if let Some(key) = patch.key() {
                    state.patch(key.as_str(), patch);
                }
            }
            Change::Deleted(id) => state.entries.retain(|entry| !entry.matches(id)),
        });
    }

    /// Merge a full product listing: known entries are patched, new ones
    /// inserted. Applying the same listing twice changes nothing.
    pub fn refresh(&self, products: &[ProductDocument]) {
        self.store.update(|state| {
            for product in products {
                let patch = CatalogPatch::from(product);
                if !state.patch(product.identity().as_str(), &patch) {
                    state.insert_if_absent(CatalogSnapshotEntry::from(patch));
                }
            }
        });
    }

    /// Edit a product through the optimistic protocol.
    ///
    /// The patch is visible immediately; on success the server's product
    /// replaces it, on failure the edited entry alone is restored and one
    /// failure notice is published. Writes to other entries made while the
    /// request is in flight are kept.
    ///
    /// # Errors
    ///
    /// Returns the API error after rolling back.
    pub async fn edit(
        &self,
        api: &dyn ProductApi,
        bus: &EventBus,
        id: &ProductId,
        patch: CatalogPatch,
    ) -> Result<(), ApiError> {
        add_breadcrumb("catalog", "Editing product", Some(&[("product_id", id.as_str())]));

        let key = id.as_str();
        optimistic(
            &self.store,
            bus,
            "Update product",
            EntryScope {
                key: key.to_string(),
            },
            |state| {
                state.patch(key, &patch);
            },
            api.update_product(id, &patch),
            |state, product: ProductDocument| {
                state.patch(key, &CatalogPatch::from(&product));
            },
        )
        .await
    }
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
