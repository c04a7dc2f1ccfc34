//! Applies inbound changes to the entity stores.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ChangeEvent, RawEvent, RefetchBatch};
use crate::api::AdminApi;
use crate::events::{EventBus, StoreEvent};
use crate::stores::{AdminSnapshot, CartStore, CatalogSnapshot, WishlistStore};
use crate::supersede::SupersedingFetch;

/// Routes channel events and refetch batches into the stores.
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<CatalogSnapshot>,
    admin: Arc<AdminSnapshot>,
    cart: Arc<CartStore>,
    wishlist: Arc<WishlistStore>,
    bus: EventBus,
    kpi_source: Option<Arc<dyn AdminApi>>,
    kpi_fetch: SupersedingFetch,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kpi_refresh", &self.kpi_source.is_some())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        catalog: Arc<CatalogSnapshot>,
        admin: Arc<AdminSnapshot>,
        cart: Arc<CartStore>,
        wishlist: Arc<WishlistStore>,
        bus: EventBus,
    ) -> Self {
        Self {
            catalog,
            admin,
            cart,
            wishlist,
            bus,
            kpi_source: None,
            kpi_fetch: SupersedingFetch::new("kpis"),
        }
    }

    /// Refresh KPIs from `api` whenever a `kpi-changed` event arrives.
    #[must_use]
    pub fn with_kpi_source(mut self, api: Arc<dyn AdminApi>) -> Self {
        self.kpi_source = Some(api);
        self
    }

    /// The KPI refresh slot, for callers that need to wait on it.
    #[must_use]
    pub const fn kpi_fetch(&self) -> &SupersedingFetch {
        &self.kpi_fetch
    }

    /// Decode and apply a raw event. Unknown and malformed events are
    /// logged and skipped.
    pub fn handle(&self, raw: &RawEvent) {
        match ChangeEvent::parse(raw) {
            Ok(Some(event)) => self.apply(event),
            Ok(None) => debug!(event = %raw.name, "Ignoring unhandled event"),
            Err(e) => warn!(error = %e, "Skipping malformed event"),
        }
    }

    /// Apply a decoded event.
    pub fn apply(&self, event: ChangeEvent) {
        let entity = event.entity();
        let action = event.action();

        match event {
            ChangeEvent::Product(change) => self.catalog.apply_remote(&change),
            ChangeEvent::Order(change) => self.admin.apply_orders(&change),
            ChangeEvent::Customer(change) => self.admin.apply_customers(&change),
            ChangeEvent::Cart(change) => self.cart.apply_remote(&change),
            ChangeEvent::Wishlist(change) => self.wishlist.apply_remote(&change),
            ChangeEvent::Kpi(inline) => self.refresh_kpis(inline),
        }

        debug!(entity = ?entity, action = %action, "Reconciled change");
        self.bus.publish(StoreEvent::Reconciled { entity, action });
    }

    fn refresh_kpis(&self, inline: Option<serde_json::Value>) {
        match &self.kpi_source {
            Some(api) => {
                let api = Arc::clone(api);
                let admin = Arc::clone(&self.admin);
                self.kpi_fetch.spawn(async move { api.kpis().await }, move |result| {
                    match result {
                        Ok(kpis) => admin.replace_kpis(kpis),
                        Err(e) => warn!(error = %e, "KPI refresh failed"),
                    }
                });
            }
            None => {
                if let Some(kpis) = inline {
                    self.admin.replace_kpis(kpis);
                }
            }
        }
    }

    /// Apply a polling refetch. Safe to repeat.
    pub fn apply_batch(&self, batch: RefetchBatch) {
        self.catalog.refresh(&batch.products);
        if let Some(orders) = batch.orders {
            self.admin.replace_orders(orders);
        }
        if let Some(customers) = batch.customers {
            self.admin.replace_customers(customers);
        }
        if let Some(kpis) = batch.kpis {
            self.admin.replace_kpis(kpis);
        }
        self.bus.publish(StoreEvent::Refetched);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use shopfront_core::{ChangeAction, EntityKind, ProductDocument, ProductId, Record};

    use super::*;
    use crate::api::ApiError;

    fn reconciler() -> (Reconciler, Arc<CatalogSnapshot>, Arc<AdminSnapshot>) {
        let catalog = Arc::new(CatalogSnapshot::new());
        let admin = Arc::new(AdminSnapshot::new());
        let reconciler = Reconciler::new(
            Arc::clone(&catalog),
            Arc::clone(&admin),
            Arc::new(CartStore::new()),
            Arc::new(WishlistStore::new()),
            EventBus::new(),
        );
        (reconciler, catalog, admin)
    }

    struct FixedKpis;

    #[async_trait]
    impl AdminApi for FixedKpis {
        async fn orders(&self) -> Result<Vec<Record>, ApiError> {
            Ok(vec![])
        }

        async fn customers(&self) -> Result<Vec<Record>, ApiError> {
            Ok(vec![])
        }

        async fn kpis(&self) -> Result<Value, ApiError> {
            Ok(json!({"revenue": 42}))
        }
    }

    #[test]
    fn test_duplicate_product_update_is_idempotent() {
        let (reconciler, catalog, _) = reconciler();
        catalog.ensure(&ProductDocument {
            doc_id: Some(ProductId::new("p1")),
            price: Decimal::from(100),
            stock: Some(10),
            ..Default::default()
        });

        let raw = RawEvent::new(
            "product-changed",
            json!({"action": "updated", "product": {"_id": "p1", "stock": 4, "salesCount": 6}})
                .to_string(),
        );
        reconciler.handle(&raw);
        let once = catalog.entries();
        reconciler.handle(&raw);
        assert_eq!(catalog.entries(), once);
        assert_eq!(catalog.get("p1").unwrap().sales_count(), 6);
    }

    #[test]
    fn test_malformed_event_changes_nothing() {
        let (reconciler, catalog, admin) = reconciler();
        reconciler.handle(&RawEvent::new("product-changed", "{oops"));
        reconciler.handle(&RawEvent::new("order-changed", r#"{"action":"created"}"#));
        assert!(catalog.entries().is_empty());
        assert!(admin.orders().is_empty());
    }

    #[test]
    fn test_events_publish_reconciled() {
        let (reconciler, _, admin) = reconciler();
        let mut events = reconciler.bus.subscribe();
        reconciler.handle(&RawEvent::new(
            "order-changed",
            json!({"action": "created", "order": {"_id": "o1"}}).to_string(),
        ));
        assert_eq!(admin.orders().len(), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::Reconciled {
                entity: EntityKind::Order,
                action: ChangeAction::Created,
            }
        );
    }

    #[test]
    fn test_inline_kpis_without_source() {
        let (reconciler, _, admin) = reconciler();
        reconciler.handle(&RawEvent::new(
            "kpi-changed",
            json!({"kpis": {"revenue": 7}}).to_string(),
        ));
        assert_eq!(admin.kpis(), Some(json!({"revenue": 7})));
    }

    #[tokio::test]
    async fn test_kpi_event_triggers_refresh() {
        let (reconciler, _, admin) = reconciler();
        let reconciler = reconciler.with_kpi_source(Arc::new(FixedKpis));

        reconciler.handle(&RawEvent::new("kpi-changed", "{}"));
        reconciler.kpi_fetch().settle().await;
        assert_eq!(admin.kpis(), Some(json!({"revenue": 42})));
    }

    #[test]
    fn test_batch_applied_twice_equals_once() {
        let (reconciler, catalog, admin) = reconciler();
        let batch = RefetchBatch {
            products: vec![ProductDocument {
                doc_id: Some(ProductId::new("p1")),
                stock: Some(3),
                ..Default::default()
            }],
            orders: Some(vec![Record::try_from(json!({"_id": "o1"})).unwrap()]),
            customers: None,
            kpis: None,
        };
        reconciler.apply_batch(batch.clone());
        let (entries, orders) = (catalog.entries(), admin.orders());
        reconciler.apply_batch(batch);
        assert_eq!(catalog.entries(), entries);
        assert_eq!(admin.orders(), orders);
    }
}
