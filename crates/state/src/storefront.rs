//! The storefront context handed to every UI surface.
//!
//! Construct one per session and clone it freely; clones share the same
//! stores, event bus, and API client.

use std::sync::Arc;

use chrono::Utc;
use shopfront_core::{
    BannerKind, CartItem, CatalogPatch, ProductDocument, ProductId, SessionId, WishlistItem,
};
use tracing::{debug, instrument};

use crate::api::{ApiError, OrderApi, ProductApi, StoreApiClient};
use crate::checkout::{Checkout, ShippingSelection};
use crate::config::StateConfig;
use crate::error::{Result, add_breadcrumb};
use crate::events::{EventBus, Notice};
use crate::persist::{FileStorage, PersistentStore, STORAGE_NAMESPACE};
use crate::realtime::{Interest, RealtimeChannel, Reconciler, SseTransport};
use crate::stores::{AdminSnapshot, BannerStore, CartStore, CatalogSnapshot, WishlistStore};

/// Shared state for one storefront session.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StateConfig,
    session: SessionId,
    api: StoreApiClient,
    storage: PersistentStore,
    cart: Arc<CartStore>,
    wishlist: Arc<WishlistStore>,
    catalog: Arc<CatalogSnapshot>,
    banners: BannerStore,
    admin: Arc<AdminSnapshot>,
    bus: EventBus,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("session", &self.inner.session)
            .field("api", &self.inner.api)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// A session persisting to files under the configured state directory.
    #[must_use]
    pub fn new(config: StateConfig) -> Self {
        let storage = PersistentStore::new(
            Arc::new(FileStorage::new(config.state_dir.clone())),
            STORAGE_NAMESPACE,
        );
        Self::with_storage(config, storage)
    }

    /// A session persisting to `storage`.
    #[must_use]
    pub fn with_storage(config: StateConfig, storage: PersistentStore) -> Self {
        let api = StoreApiClient::new(&config);
        Self {
            inner: Arc::new(StorefrontInner {
                session: SessionId::generate(),
                api,
                cart: Arc::new(CartStore::persistent(storage.clone())),
                wishlist: Arc::new(WishlistStore::persistent(storage.clone())),
                catalog: Arc::new(CatalogSnapshot::persistent(storage.clone())),
                banners: BannerStore::new(),
                admin: Arc::new(AdminSnapshot::new()),
                bus: EventBus::new(),
                storage,
                config,
            }),
        }
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogSnapshot {
        &self.inner.catalog
    }

    #[must_use]
    pub fn banners(&self) -> &BannerStore {
        &self.inner.banners
    }

    #[must_use]
    pub fn admin(&self) -> &AdminSnapshot {
        &self.inner.admin
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    #[must_use]
    pub fn api(&self) -> &StoreApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn config(&self) -> &StateConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionId {
        &self.inner.session
    }

    /// Persistence shared by the stores.
    #[must_use]
    pub fn storage(&self) -> &PersistentStore {
        &self.inner.storage
    }

    /// Wait until the cart, wishlist and catalog snapshot are saved.
    pub async fn flush(&self) {
        tokio::join!(
            self.cart().store().flush(),
            self.wishlist().store().flush(),
            self.catalog().store().flush(),
        );
    }

    // =========================================================================
    // Composite actions
    // =========================================================================

    /// Add `quantity` units of `product` to the cart.
    ///
    /// Stock is checked against the server document. On success the catalog
    /// snapshot's stock is decremented right away so every surface shows the
    /// reduced availability. Failures are published as a notice.
    ///
    /// # Errors
    ///
    /// Returns the validation error; neither cart nor catalog changes.
    #[instrument(skip(self, product), fields(product_id = %product.identity()))]
    pub fn add_to_cart(
        &self,
        product: &ProductDocument,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<()> {
        let variant = variant.and_then(|name| product.variant(name)).cloned();
        let item = CartItem::from_product(product, variant);
        let id = item.id.clone();

        if let Err(e) = self.cart().add(item, product.known_stock(), quantity) {
            self.events()
                .notify(Notice::failure("Add to cart", e.to_string()));
            return Err(e.into());
        }

        self.catalog().ensure(product);
        self.catalog()
            .adjust_stock(id.as_str(), -i64::from(quantity));
        self.events().notify(Notice::success(
            "Add to cart",
            format!("Added {} to cart", product.display_name()),
        ));
        Ok(())
    }

    /// Remove a cart line and give its units back to the catalog snapshot.
    pub fn remove_from_cart(&self, id: &str) {
        let quantity = self.cart().quantity_of(id);
        if quantity == 0 {
            return;
        }
        self.cart().remove(id);
        self.catalog().adjust_stock(id, i64::from(quantity));
        debug!(product_id = id, quantity, "Removed from cart");
    }

    /// Add or remove `product` from the wishlist. Returns whether it is
    /// now wishlisted.
    pub fn toggle_wishlist(&self, product: &ProductDocument) -> bool {
        let present = self
            .wishlist()
            .toggle(WishlistItem::from_product(product, Utc::now()));
        add_breadcrumb(
            "wishlist",
            if present { "Added item" } else { "Removed item" },
            Some(&[("product_id", product.identity().as_str())]),
        );
        present
    }

    /// Fetch the product listing and merge it into the catalog snapshot.
    ///
    /// # Errors
    ///
    /// Returns the API error; the snapshot is left as it was.
    pub async fn refresh_catalog(&self) -> std::result::Result<Vec<ProductDocument>, ApiError> {
        let products = self.api().products().await?;
        self.catalog().refresh(&products);
        Ok(products)
    }

    /// Load both banners.
    pub async fn load_banners(&self) {
        self.banners().load(self.api()).await;
    }

    /// Show or hide a banner (admin).
    ///
    /// # Errors
    ///
    /// Returns the API error after the banner has been restored.
    pub async fn set_banner_active(
        &self,
        kind: BannerKind,
        active: bool,
    ) -> std::result::Result<(), ApiError> {
        self.banners()
            .set_active(self.api(), self.events(), kind, active)
            .await
    }

    /// Edit a product's catalog fields (admin).
    ///
    /// # Errors
    ///
    /// Returns the API error after the snapshot has been restored.
    pub async fn edit_product(
        &self,
        id: &ProductId,
        patch: CatalogPatch,
    ) -> std::result::Result<(), ApiError> {
        self.catalog()
            .edit(self.api(), self.events(), id, patch)
            .await
    }

    /// Start a checkout with the server's shipping methods.
    ///
    /// # Errors
    ///
    /// Returns the API error if shipping methods cannot be fetched.
    pub async fn checkout(&self) -> Result<Checkout<'_>> {
        let methods = self.api().shipping_methods().await?;
        Ok(Checkout::new(
            self.cart(),
            self.catalog(),
            ShippingSelection::from_methods(methods),
            self.config().gst_rate,
        ))
    }

    /// Build the real-time channel for this session.
    ///
    /// Admin sessions join the admin room and refresh KPIs on change.
    #[must_use]
    pub fn realtime(&self, admin: bool) -> RealtimeChannel {
        let inner = &self.inner;
        let interest = if admin {
            Interest::admin(inner.session.clone())
        } else {
            Interest::customer(inner.session.clone())
        };

        let mut reconciler = Reconciler::new(
            Arc::clone(&inner.catalog),
            Arc::clone(&inner.admin),
            Arc::clone(&inner.cart),
            Arc::clone(&inner.wishlist),
            inner.bus.clone(),
        );
        if admin {
            reconciler = reconciler.with_kpi_source(Arc::new(inner.api.clone()));
        }

        RealtimeChannel::new(
            Arc::new(SseTransport::new(inner.api.clone(), inner.session.clone())),
            Arc::new(inner.api.clone()),
            reconciler,
            interest,
            inner.config.realtime,
            inner.bus.clone(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use url::Url;

    use super::*;
    use crate::error::{StateError, ValidationError};
    use crate::events::{NoticeLevel, StoreEvent};

    fn storefront() -> Storefront {
        Storefront::with_storage(
            StateConfig::with_api_url(Url::parse("http://127.0.0.1:9").unwrap()),
            PersistentStore::in_memory(),
        )
    }

    fn product(stock: i64) -> ProductDocument {
        ProductDocument {
            doc_id: Some(ProductId::new("kurta")),
            title: "Cotton Kurta".to_string(),
            slug: "cotton-kurta".to_string(),
            price: Decimal::from(1200),
            stock: Some(stock),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_to_cart_decrements_snapshot_stock() {
        let store = storefront();
        store.add_to_cart(&product(5), None, 2).unwrap();

        assert_eq!(store.cart().quantity_of("kurta"), 2);
        assert_eq!(store.catalog().get("kurta").unwrap().stock(), 3);
    }

    #[test]
    fn test_stock_is_checked_against_server_document() {
        let store = storefront();
        store.add_to_cart(&product(3), None, 2).unwrap();
        // Snapshot now says 1, but the server document still says 3
        store.add_to_cart(&product(3), None, 1).unwrap();
        assert_eq!(store.cart().quantity_of("kurta"), 3);
        assert!(!store.catalog().get("kurta").unwrap().in_stock());
    }

    #[test]
    fn test_failed_add_notifies_and_changes_nothing() {
        let store = storefront();
        let mut events = store.events().subscribe();

        let err = store.add_to_cart(&product(1), None, 2).unwrap_err();
        assert!(matches!(
            err,
            StateError::Validation(ValidationError::InsufficientStock { .. })
        ));
        assert!(store.cart().is_empty());
        assert!(store.catalog().get("kurta").is_none());

        let StoreEvent::Notice(notice) = events.try_recv().unwrap() else {
            panic!("expected a notice");
        };
        assert_eq!(notice.level, NoticeLevel::Failure);
    }

    #[test]
    fn test_remove_from_cart_restores_stock() {
        let store = storefront();
        store.add_to_cart(&product(5), None, 2).unwrap();
        store.remove_from_cart("kurta");
        store.remove_from_cart("kurta");

        assert!(store.cart().is_empty());
        assert_eq!(store.catalog().get("kurta").unwrap().stock(), 5);
    }

    #[test]
    fn test_clones_share_stores() {
        let store = storefront();
        let other = store.clone();
        other.add_to_cart(&product(5), None, 1).unwrap();
        assert_eq!(store.cart().count(), 1);
        assert_eq!(store.session(), other.session());
    }

    #[test]
    fn test_toggle_wishlist() {
        let store = storefront();
        assert!(store.toggle_wishlist(&product(1)));
        assert!(store.wishlist().has_item("kurta"));
        assert!(!store.toggle_wishlist(&product(1)));
    }
}
