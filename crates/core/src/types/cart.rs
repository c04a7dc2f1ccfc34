//! Cart and wishlist line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::round_money;
use super::product::{ColorVariant, ProductDocument};

/// A cart line.
///
/// `price` is the effective unit price: the discount is applied once, when
/// the line is created, and later discount changes do not reprice it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Stable product identity; unique within a cart.
    pub id: ProductId,
    /// Server product id (may equal `id`).
    pub product_id: ProductId,
    pub name: String,
    /// Effective (already discounted) unit price.
    pub price: Decimal,
    /// Discount percentage that was applied at add-time.
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_variant: Option<ColorVariant>,
}

impl CartItem {
    /// Build a cart line for one unit of `product`, freezing its effective price.
    #[must_use]
    pub fn from_product(product: &ProductDocument, variant: Option<ColorVariant>) -> Self {
        let image = variant
            .as_ref()
            .and_then(|v| v.images.first().cloned())
            .or_else(|| product.main_image.clone());

        Self {
            id: product.identity(),
            product_id: product.doc_id.clone().unwrap_or_else(|| product.identity()),
            name: product.display_name().to_string(),
            price: effective_price(product.price, product.discount),
            discount: clamp_discount(product.discount),
            image,
            quantity: 1,
            slug: product.slug.clone(),
            color_variant: variant,
        }
    }

    /// Line total: effective price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A wishlist entry. Wishlists hold each product at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: ProductId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub slug: String,
    pub added_at: DateTime<Utc>,
}

impl WishlistItem {
    /// Build a wishlist entry for `product`.
    #[must_use]
    pub fn from_product(product: &ProductDocument, added_at: DateTime<Utc>) -> Self {
        Self {
            id: product.identity(),
            product_id: product.doc_id.clone().unwrap_or_else(|| product.identity()),
            name: product.display_name().to_string(),
            price: effective_price(product.price, product.discount),
            discount: clamp_discount(product.discount),
            image: product.main_image.clone(),
            slug: product.slug.clone(),
            added_at,
        }
    }
}

/// Apply a percentage discount to a list price, rounded to minor units.
#[must_use]
pub fn effective_price(price: Decimal, discount_percent: Decimal) -> Decimal {
    let discount = clamp_discount(discount_percent);
    round_money(price - price * discount / Decimal::ONE_HUNDRED, 2)
}

fn clamp_discount(discount: Decimal) -> Decimal {
    discount.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, discount: i64) -> ProductDocument {
        ProductDocument {
            doc_id: Some(ProductId::new("p1")),
            title: "Canvas Tote".to_string(),
            slug: "canvas-tote".to_string(),
            price: Decimal::from(price),
            discount: Decimal::from(discount),
            main_image: Some("tote.jpg".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_product_freezes_discounted_price() {
        let item = CartItem::from_product(&product(999, 15), None);
        // 999 - 149.85
        assert_eq!(item.price, Decimal::new(84_915, 2));
        assert_eq!(item.discount, Decimal::from(15));
        assert_eq!(item.quantity, 1);
        assert_eq!(item.image.as_deref(), Some("tote.jpg"));
    }

    #[test]
    fn test_variant_image_wins() {
        let variant = ColorVariant {
            name: "Olive".to_string(),
            hex: "#556b2f".to_string(),
            images: vec!["olive.jpg".to_string()],
        };
        let item = CartItem::from_product(&product(500, 0), Some(variant));
        assert_eq!(item.image.as_deref(), Some("olive.jpg"));
        assert_eq!(item.price, Decimal::from(500));
    }

    #[test]
    fn test_effective_price_clamps_discount() {
        assert_eq!(effective_price(Decimal::from(200), Decimal::from(150)), Decimal::ZERO);
        assert_eq!(
            effective_price(Decimal::from(200), Decimal::from(-5)),
            Decimal::from(200)
        );
    }

    #[test]
    fn test_line_total() {
        let mut item = CartItem::from_product(&product(250, 0), None);
        item.quantity = 3;
        assert_eq!(item.line_total(), Decimal::from(750));
    }
}
