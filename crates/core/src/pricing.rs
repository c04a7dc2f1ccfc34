//! Order pricing: subtotal, shipping, tax, and total.
//!
//! [`Quote::compute`] is the single pricing rule for the whole storefront.
//! The cart summary, the checkout summary, and the order record all call it,
//! so the numbers a shopper sees are the numbers that get persisted.
//!
//! # Rules
//!
//! - `subtotal = Σ price × quantity`, using each line's effective price as
//!   frozen at add-time (a later discount change does not reprice the cart).
//! - `shipping = method.cost`, or zero when no method is selected. There is
//!   no free-shipping threshold.
//! - `tax = round((subtotal + shipping) × rate / 100)`: shipping is part of
//!   the tax base, and rounding happens once on the full base, to a whole
//!   currency unit.
//! - `total = subtotal + shipping + tax`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CartItem, ShippingMethod, round_money};

/// Default GST rate, in percent.
pub const DEFAULT_GST_RATE: u32 = 18;

/// A computed price breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    /// GST rate used for `tax`, in percent.
    pub gst_rate: Decimal,
    /// Total units across all lines.
    pub item_count: u32,
}

impl Quote {
    /// Price a set of cart lines with an optional shipping method.
    #[must_use]
    pub fn compute(
        items: &[CartItem],
        shipping: Option<&ShippingMethod>,
        gst_rate_percent: Decimal,
    ) -> Self {
        let subtotal: Decimal = items.iter().map(CartItem::line_total).sum();
        let shipping = shipping.map_or(Decimal::ZERO, ShippingMethod::charge);
        Self::from_parts(
            subtotal,
            shipping,
            gst_rate_percent,
            items.iter().map(|item| item.quantity).sum(),
        )
    }

    /// Price with the default GST rate.
    #[must_use]
    pub fn with_default_rate(items: &[CartItem], shipping: Option<&ShippingMethod>) -> Self {
        Self::compute(items, shipping, Decimal::from(DEFAULT_GST_RATE))
    }

    /// Apply the tax and total rules to an already-summed subtotal.
    #[must_use]
    pub fn from_parts(
        subtotal: Decimal,
        shipping: Decimal,
        gst_rate_percent: Decimal,
        item_count: u32,
    ) -> Self {
        let tax = round_money((subtotal + shipping) * gst_rate_percent / Decimal::ONE_HUNDRED, 0);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
            gst_rate: gst_rate_percent,
            item_count,
        }
    }

    /// Whether the quote prices an empty cart.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}
