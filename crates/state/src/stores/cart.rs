//! Session cart.
//!
//! Lines are unique by product identity. Stock is validated only when
//! adding; quantity edits are not clamped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopfront_core::{CartItem, ProductId};
use tracing::debug;

use crate::error::{ValidationError, add_breadcrumb};
use crate::persist::{PersistentStore, Persisted};
use crate::realtime::Change;
use crate::store::Store;

/// Cart contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    pub items: Vec<CartItem>,
}

/// Persisted cart fields.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CartDurable {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Persisted for CartState {
    const NAME: &'static str = "cart";
    type Durable = CartDurable;

    fn to_durable(&self) -> Self::Durable {
        CartDurable {
            items: self.items.clone(),
        }
    }

    fn from_durable(durable: Self::Durable) -> Self {
        let mut items: Vec<CartItem> = Vec::with_capacity(durable.items.len());
        for item in durable.items.into_iter().filter(|item| item.quantity > 0) {
            match items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => items.push(item),
            }
        }
        Self { items }
    }
}

impl CartState {
    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id.as_str() == id)
    }
}

/// The session's cart store.
#[derive(Debug)]
pub struct CartStore {
    store: Store<CartState>,
}

impl CartStore {
    /// An empty, non-persisted cart.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Store::new(CartState::NAME, CartState::default()),
        }
    }

    /// A cart restored from and saved to `storage`.
    #[must_use]
    pub fn persistent(storage: PersistentStore) -> Self {
        Self {
            store: Store::persistent(storage, CartState::default()),
        }
    }

    /// The underlying observable store.
    #[must_use]
    pub const fn store(&self) -> &Store<CartState> {
        &self.store
    }

    /// Add `quantity` units of `item`.
    ///
    /// If `stock` is known, the resulting line quantity may not exceed it.
    /// An existing line is merged: quantities are summed and the newly
    /// selected variant, name and image replace the old ones. The line keeps
    /// the price frozen when it was first added.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidQuantity` for a zero quantity and
    /// `ValidationError::InsufficientStock` when stock would be exceeded. The
    /// cart is unchanged in both cases.
    pub fn add(
        &self,
        item: CartItem,
        stock: Option<u64>,
        quantity: u32,
    ) -> Result<(), ValidationError> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity(item.id));
        }

        self.store.try_update(|state| {
            let existing = state
                .position(item.id.as_str())
                .and_then(|index| state.items.get(index))
                .map_or(0, |line| line.quantity);
            let requested = u64::from(existing) + u64::from(quantity);

            if let Some(available) = stock
                && requested > available
            {
                return Err(ValidationError::InsufficientStock {
                    id: item.id.clone(),
                    requested,
                    available,
                });
            }

            let merged = u32::try_from(requested).unwrap_or(u32::MAX);
            match state.position(item.id.as_str()).and_then(|i| state.items.get_mut(i)) {
                Some(line) => {
                    line.quantity = merged;
                    if item.color_variant.is_some() {
                        line.color_variant.clone_from(&item.color_variant);
                    }
                    line.name.clone_from(&item.name);
                    if item.image.is_some() {
                        line.image.clone_from(&item.image);
                    }
                }
                None => state.items.push(CartItem {
                    quantity: merged,
                    ..item.clone()
                }),
            }
            Ok(())
        })?;

        debug!(product_id = %item.id, quantity, "Added to cart");
        add_breadcrumb("cart", "Added item", Some(&[("product_id", item.id.as_str())]));
        Ok(())
    }

    /// Set a line's quantity. Zero removes the line.
    pub fn update_quantity(&self, id: &str, quantity: u32) {
        if quantity == 0 {
            self.remove(id);
            return;
        }
        self.store.update(|state| {
            if let Some(line) = state.items.iter_mut().find(|line| line.id.as_str() == id) {
                line.quantity = quantity;
            }
        });
    }

    /// Remove a line. Removing an absent line is a no-op.
    pub fn remove(&self, id: &str) {
        self.store.update(|state| state.items.retain(|line| line.id.as_str() != id));
    }

    /// Remove every line.
    pub fn clear(&self) {
        self.store.update(|state| state.items.clear());
    }

    /// Apply an authoritative change from the real-time channel.
    ///
    /// Created lines are inserted if absent (the server already validated
    /// stock), updates replace the matching line, deletions remove it.
    pub fn apply_remote(&self, change: &Change<CartItem>) {
        self.store.update(|state| match change {
            Change::Created(item) => {
                if state.position(item.id.as_str()).is_none() && item.quantity > 0 {
                    state.items.push(item.clone());
                }
            }
            Change::Updated(item) => {
                if let Some(index) = state.position(item.id.as_str()) {
                    if item.quantity == 0 {
                        state.items.remove(index);
                    } else if let Some(line) = state.items.get_mut(index) {
                        *line = item.clone();
                    }
                }
            }
            Change::Deleted(id) => state.items.retain(|line| line.id.as_str() != id),
        });
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.store.read(|state| state.items.clone())
    }

    /// Σ effective price × quantity.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.store
            .read(|state| state.items.iter().map(CartItem::line_total).sum())
    }

    /// Σ quantity.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.store
            .read(|state| state.items.iter().map(|line| line.quantity).sum())
    }

    /// Whether a line exists for `id`.
    #[must_use]
    pub fn has_item(&self, id: &str) -> bool {
        self.store.read(|state| state.position(id).is_some())
    }

    /// Quantity of the line for `id`, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, id: &str) -> u32 {
        self.store.read(|state| {
            state
                .items
                .iter()
                .find(|line| line.id.as_str() == id)
                .map_or(0, |line| line.quantity)
        })
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read(|state| state.items.is_empty())
    }

    /// Identity of every line.
    #[must_use]
    pub fn ids(&self) -> Vec<ProductId> {
        self.store
            .read(|state| state.items.iter().map(|line| line.id.clone()).collect())
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}
