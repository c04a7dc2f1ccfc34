//! Checkout: shipping selection, quoting, and order placement.

use rust_decimal::Decimal;
use shopfront_core::{Quote, ShippingMethod, ShippingMethodId};
use tracing::{info, instrument, warn};

use crate::api::{OrderApi, OrderConfirmation, OrderRequest, ShippingAddress};
use crate::error::{Result, ValidationError, add_breadcrumb};
use crate::stores::{CartStore, CatalogSnapshot};

/// Shipping methods offered at checkout and the one chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingSelection {
    methods: Vec<ShippingMethod>,
    selected: Option<ShippingMethodId>,
}

impl ShippingSelection {
    /// Keep the active methods and preselect the default one (or the first).
    #[must_use]
    pub fn from_methods(methods: Vec<ShippingMethod>) -> Self {
        let methods: Vec<ShippingMethod> = methods.into_iter().filter(|m| m.is_active).collect();
        let selected = methods
            .iter()
            .find(|m| m.is_default)
            .or_else(|| methods.first())
            .map(|m| m.id.clone());
        Self { methods, selected }
    }

    /// Choose a method by id.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownShippingMethod` if no active method
    /// has that id. The previous selection is kept.
    pub fn select(&mut self, id: &ShippingMethodId) -> std::result::Result<(), ValidationError> {
        if !self.methods.iter().any(|m| &m.id == id) {
            return Err(ValidationError::UnknownShippingMethod(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    /// The chosen method.
    #[must_use]
    pub fn selected(&self) -> Option<&ShippingMethod> {
        let id = self.selected.as_ref()?;
        self.methods.iter().find(|m| &m.id == id)
    }

    /// Active methods, in server order.
    #[must_use]
    pub fn methods(&self) -> &[ShippingMethod] {
        &self.methods
    }
}

/// A checkout session over the cart.
#[derive(Debug)]
pub struct Checkout<'a> {
    cart: &'a CartStore,
    catalog: &'a CatalogSnapshot,
    shipping: ShippingSelection,
    gst_rate: Decimal,
}

impl<'a> Checkout<'a> {
    #[must_use]
    pub const fn new(
        cart: &'a CartStore,
        catalog: &'a CatalogSnapshot,
        shipping: ShippingSelection,
        gst_rate: Decimal,
    ) -> Self {
        Self {
            cart,
            catalog,
            shipping,
            gst_rate,
        }
    }

    /// Shipping selection, for changing the chosen method.
    pub const fn shipping_mut(&mut self) -> &mut ShippingSelection {
        &mut self.shipping
    }

    #[must_use]
    pub const fn shipping(&self) -> &ShippingSelection {
        &self.shipping
    }

    /// Totals for the cart as it is now.
    #[must_use]
    pub fn quote(&self) -> Quote {
        Quote::compute(&self.cart.items(), self.shipping.selected(), self.gst_rate)
    }

    /// Place the order.
    ///
    /// On success every purchased line is recorded as a sale in the catalog
    /// snapshot and the cart is cleared. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyCart` if the cart is empty, or the
    /// API error if the server refuses the order.
    #[instrument(skip_all)]
    pub async fn place_order(
        &self,
        api: &dyn OrderApi,
        address: ShippingAddress,
    ) -> Result<OrderConfirmation> {
        let items = self.cart.items();
        if items.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let method = self
            .shipping
            .selected()
            .ok_or(ValidationError::NoShippingMethod)?;

        let quote = Quote::compute(&items, Some(method), self.gst_rate);
        let request = OrderRequest {
            items,
            shipping: address,
            shipping_method: method.id.clone(),
            quote,
        };

        let confirmation = api.place_order(&request).await?;
        if confirmation.amount != quote.total {
            warn!(
                order_id = %confirmation.order_id,
                server = %confirmation.amount,
                local = %quote.total,
                "Server amount differs from displayed total"
            );
        }

        for item in &request.items {
            self.catalog.record_sale(item.id.as_str(), item.quantity);
        }
        self.cart.clear();

        add_breadcrumb(
            "checkout",
            "Order placed",
            Some(&[("order_id", confirmation.order_id.as_str())]),
        );
        info!(order_id = %confirmation.order_id, total = %quote.total, "Order placed");
        Ok(confirmation)
    }
}
