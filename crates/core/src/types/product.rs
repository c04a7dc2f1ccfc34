//! Product documents as returned by the listing and detail endpoints.
//!
//! The state layer seeds its catalog snapshot from these documents and never
//! invents fields that are not present here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::clamp_count;
use super::id::ProductId;

/// Aggregate review rating for a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratings {
    /// Average rating value (e.g., 4.5).
    pub average: f64,
    /// Total number of reviews.
    pub count: u64,
}

/// A selectable color variant of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorVariant {
    /// Display name (e.g., "Midnight Blue").
    pub name: String,
    /// Hex swatch color (e.g., "#1a2b3c").
    pub hex: String,
    /// Variant-specific image URLs.
    pub images: Vec<String>,
}

/// A product document from the product listing or detail fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductDocument {
    /// Server document id.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<ProductId>,
    /// Display title.
    pub title: String,
    /// Short name (some documents only carry one of `title`/`name`).
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// List price before discount.
    pub price: Decimal,
    /// Discount percentage (0-100).
    pub discount: Decimal,
    /// Units in stock, if the server tracks inventory for this product.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    /// Lifetime units sold.
    pub sales_count: i64,
    /// Review aggregate.
    pub ratings: Ratings,
    /// Category slug or name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Primary image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    /// Whether the product is featured on the home grid.
    pub featured: bool,
    /// Available color variants.
    pub color_variants: Vec<ColorVariant>,
}

impl ProductDocument {
    /// Stable identity for cart and wishlist lines.
    ///
    /// Uses the server id when present, otherwise an id derived from the slug.
    #[must_use]
    pub fn identity(&self) -> ProductId {
        self.doc_id
            .clone()
            .unwrap_or_else(|| ProductId::new(format!("slug:{}", self.slug)))
    }

    /// Display name, preferring `name` and falling back to `title`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.title
        } else {
            &self.name
        }
    }

    /// Known stock level, clamped to zero, or `None` if inventory is untracked.
    #[must_use]
    pub fn known_stock(&self) -> Option<u64> {
        self.stock.map(clamp_count)
    }

    /// Find a color variant by name.
    #[must_use]
    pub fn variant(&self, name: &str) -> Option<&ColorVariant> {
        self.color_variants.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_document_parses_upstream_shape() {
        let json = r##"{
            "_id": "p1",
            "title": "Linen Shirt",
            "slug": "linen-shirt",
            "price": 1200,
            "discount": 10,
            "stock": 4,
            "salesCount": 12,
            "ratings": {"average": 4.5, "count": 8},
            "colorVariants": [{"name": "Sand", "hex": "#d8c8a8", "images": ["a.jpg"]}],
            "unknownField": true
        }"##;

        let product: ProductDocument = serde_json::from_str(json).unwrap();
        assert_eq!(product.identity(), ProductId::new("p1"));
        assert_eq!(product.display_name(), "Linen Shirt");
        assert_eq!(product.price, Decimal::from(1200));
        assert_eq!(product.known_stock(), Some(4));
        assert_eq!(product.variant("Sand").map(|v| v.hex.as_str()), Some("#d8c8a8"));
    }

    #[test]
    fn test_identity_falls_back_to_slug() {
        let product = ProductDocument {
            slug: "tote-bag".to_string(),
            ..Default::default()
        };
        assert_eq!(product.identity().as_str(), "slug:tote-bag");
    }

    #[test]
    fn test_negative_stock_is_known_as_zero() {
        let product = ProductDocument {
            stock: Some(-2),
            ..Default::default()
        };
        assert_eq!(product.known_stock(), Some(0));
        assert_eq!(ProductDocument::default().known_stock(), None);
    }
}
