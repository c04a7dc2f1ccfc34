//! Session wishlist.

use serde::{Deserialize, Serialize};
use shopfront_core::WishlistItem;
use tracing::debug;

use crate::persist::{PersistentStore, Persisted};
use crate::realtime::Change;
use crate::store::Store;

/// Wishlist contents, unique by product identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WishlistState {
    pub items: Vec<WishlistItem>,
}

/// Persisted wishlist fields.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct WishlistDurable {
    #[serde(default)]
    pub items: Vec<WishlistItem>,
}

impl Persisted for WishlistState {
    const NAME: &'static str = "wishlist";
    type Durable = WishlistDurable;

    fn to_durable(&self) -> Self::Durable {
        WishlistDurable {
            items: self.items.clone(),
        }
    }

    fn from_durable(durable: Self::Durable) -> Self {
        let mut items: Vec<WishlistItem> = Vec::with_capacity(durable.items.len());
        for item in durable.items {
            if !items.iter().any(|existing| existing.id == item.id) {
                items.push(item);
            }
        }
        Self { items }
    }
}

/// The session's wishlist store.
#[derive(Debug)]
pub struct WishlistStore {
    store: Store<WishlistState>,
}

impl WishlistStore {
    /// An empty, non-persisted wishlist.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Store::new(WishlistState::NAME, WishlistState::default()),
        }
    }

    /// A wishlist restored from and saved to `storage`.
    #[must_use]
    pub fn persistent(storage: PersistentStore) -> Self {
        Self {
            store: Store::persistent(storage, WishlistState::default()),
        }
    }

    /// The underlying observable store.
    #[must_use]
    pub const fn store(&self) -> &Store<WishlistState> {
        &self.store
    }

    /// Add `item` unless already present. Returns whether it was inserted.
    pub fn add(&self, item: WishlistItem) -> bool {
        let id = item.id.clone();
        let inserted = self.store.update(|state| {
            if !state.items.iter().any(|existing| existing.id == item.id) {
                state.items.push(item);
            }
        });
        if inserted {
            debug!(product_id = %id, "Added to wishlist");
        }
        inserted
    }

    /// Add `item` if absent, remove it if present. Returns whether it is
    /// now in the wishlist.
    pub fn toggle(&self, item: WishlistItem) -> bool {
        let mut present = false;
        self.store.update(|state| {
            if let Some(index) = state.items.iter().position(|existing| existing.id == item.id) {
                state.items.remove(index);
            } else {
                state.items.push(item);
                present = true;
            }
        });
        present
    }

    /// Remove an item. Removing an absent item is a no-op.
    pub fn remove(&self, id: &str) {
        self.store
            .update(|state| state.items.retain(|item| item.id.as_str() != id));
    }

    /// Remove every item.
    pub fn clear(&self) {
        self.store.update(|state| state.items.clear());
    }

    /// Apply an authoritative change from the real-time channel.
    pub fn apply_remote(&self, change: &Change<WishlistItem>) {
        self.store.update(|state| match change {
            Change::Created(item) => {
                if !state.items.iter().any(|existing| existing.id == item.id) {
                    state.items.push(item.clone());
                }
            }
            Change::Updated(item) => {
                if let Some(existing) = state.items.iter_mut().find(|existing| existing.id == item.id) {
                    *existing = item.clone();
                }
            }
            Change::Deleted(id) => state.items.retain(|item| item.id.as_str() != id),
        });
    }

    /// Whether `id` is in the wishlist.
    #[must_use]
    pub fn has_item(&self, id: &str) -> bool {
        self.store
            .read(|state| state.items.iter().any(|item| item.id.as_str() == id))
    }

    /// Number of items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.store.read(|state| state.items.len())
    }

    /// Current items, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<WishlistItem> {
        self.store.read(|state| state.items.clone())
    }
}

impl Default for WishlistStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use shopfront_core::{ProductDocument, ProductId};

    use super::*;

    fn item(id: &str) -> WishlistItem {
        WishlistItem::from_product(
            &ProductDocument {
                doc_id: Some(ProductId::new(id)),
                title: format!("Product {id}"),
                slug: id.to_string(),
                price: Decimal::from(499),
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_add_is_insert_if_absent() {
        let wishlist = WishlistStore::new();
        assert!(wishlist.add(item("a")));
        assert!(!wishlist.add(item("a")));
        assert_eq!(wishlist.count(), 1);
    }

    #[test]
    fn test_toggle_flips_membership() {
        let wishlist = WishlistStore::new();
        assert!(wishlist.toggle(item("a")));
        assert!(wishlist.has_item("a"));
        assert!(!wishlist.toggle(item("a")));
        assert!(!wishlist.has_item("a"));
    }

    #[test]
    fn test_remove_and_clear() {
        let wishlist = WishlistStore::new();
        wishlist.add(item("a"));
        wishlist.add(item("b"));
        wishlist.remove("a");
        wishlist.remove("a");
        assert_eq!(wishlist.items().len(), 1);
        wishlist.clear();
        assert_eq!(wishlist.count(), 0);
    }

    #[test]
    fn test_persisted_wishlist_survives_reload() {
        let storage = PersistentStore::in_memory();
        WishlistStore::persistent(storage.clone()).add(item("a"));
        let reloaded = WishlistStore::persistent(storage);
        assert!(reloaded.has_item("a"));
    }

    #[test]
    fn test_apply_remote_deleted_twice() {
        let wishlist = WishlistStore::new();
        wishlist.apply_remote(&Change::Created(item("a")));
        wishlist.apply_remote(&Change::Created(item("a")));
        assert_eq!(wishlist.count(), 1);

        let mut renamed = item("a");
        renamed.name = "Renamed".to_string();
        wishlist.apply_remote(&Change::Updated(renamed));
        assert_eq!(wishlist.items()[0].name, "Renamed");

        wishlist.apply_remote(&Change::Deleted("a".to_string()));
        wishlist.apply_remote(&Change::Deleted("a".to_string()));
        assert_eq!(wishlist.count(), 0);
    }
}
