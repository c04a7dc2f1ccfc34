//! Request and response bodies of the store API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shopfront_core::{
    Banner, CartItem, OrderId, ProductDocument, Quote, Record, ShippingMethod, ShippingMethodId,
};

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "IN".to_string()
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<CartItem>,
    pub shipping: ShippingAddress,
    pub shipping_method: ShippingMethodId,
    pub quote: Quote,
}

/// Successful order placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    /// Payment gateway order to complete the purchase with.
    pub payment_order_id: String,
    /// Amount the server will charge.
    pub amount: Decimal,
}

/// Body of `PATCH /api/banners/{kind}`.
///
/// Carries the banner's uninterpreted fields along so the server keeps them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BannerUpdate {
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BannerUpdate {
    /// Update `banner`'s visibility, keeping everything else as is.
    #[must_use]
    pub fn visibility(banner: &Banner, visible: bool) -> Self {
        Self {
            visible,
            content: banner.content().map(str::to_string),
            extra: banner.extra.clone(),
        }
    }
}

/// Error body returned on rejected requests.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductsBody {
    #[serde(default)]
    pub products: Vec<ProductDocument>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductBody {
    pub product: Option<ProductDocument>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShippingMethodsBody {
    #[serde(default)]
    pub methods: Vec<ShippingMethod>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BannerBody {
    pub banner: Option<Banner>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersBody {
    #[serde(default)]
    pub orders: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomersBody {
    #[serde(default)]
    pub customers: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KpisBody {
    #[serde(default)]
    pub kpis: Value,
}
