//! Inspect and reset the persisted stores.
//!
//! Reads go through the stores themselves, so what is printed is exactly
//! what a storefront session would rehydrate.

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;
use shopfront_state::persist::Persisted;
use shopfront_state::stores::{
    CartState, CartStore, CatalogSnapshot, CatalogState, WishlistState, WishlistStore,
};
use shopfront_state::{FileStorage, PersistentStore, STORAGE_NAMESPACE};

use super::{CommandError, write_json};

/// A persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreName {
    Cart,
    Wishlist,
    Catalog,
}

impl StoreName {
    /// Storage key, before namespacing.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Cart => CartState::NAME,
            Self::Wishlist => WishlistState::NAME,
            Self::Catalog => CatalogState::NAME,
        }
    }
}

/// Open the file-backed store at `dir`, falling back to `SHOPFRONT_STATE_DIR`.
#[must_use]
pub fn open(dir: Option<PathBuf>) -> PersistentStore {
    let dir = dir.unwrap_or_else(|| {
        PathBuf::from(std::env::var("SHOPFRONT_STATE_DIR").unwrap_or_else(|_| ".shopfront".into()))
    });
    tracing::debug!(dir = %dir.display(), "Opening state directory");
    PersistentStore::new(Arc::new(FileStorage::new(dir)), STORAGE_NAMESPACE)
}

/// Print a store's rehydrated contents.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn show(storage: &PersistentStore, store: StoreName) -> Result<(), CommandError> {
    match store {
        StoreName::Cart => {
            let cart = CartStore::persistent(storage.clone());
            write_json(&serde_json::json!({
                "items": cart.items(),
                "count": cart.count(),
                "total": cart.total(),
            }))
        }
        StoreName::Wishlist => write_json(&WishlistStore::persistent(storage.clone()).items()),
        StoreName::Catalog => write_json(&CatalogSnapshot::persistent(storage.clone()).entries()),
    }
}

/// Delete a store's persisted contents.
pub fn clear(storage: &PersistentStore, store: StoreName) {
    storage.clear(store.key());
    tracing::info!(store = store.key(), "Cleared persisted store");
}
