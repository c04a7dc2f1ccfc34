//! Catalog snapshot entries: the per-product dynamic fields shared by every
//! product-rendering surface.
//!
//! `stock` and `sales_count` are kept private so the only way to change them
//! is [`CatalogSnapshotEntry::apply`], which clamps both to zero and
//! re-derives `in_stock`. Deserialization goes through the same path: an
//! entry is decoded as a [`CatalogPatch`] applied to an empty entry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::{ProductDocument, Ratings};

/// Clamp a signed counter to the non-negative range.
#[must_use]
pub fn clamp_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Partial update for a catalog snapshot entry.
///
/// Every field is optional; `None` leaves the entry's field untouched.
/// Counters are signed so out-of-range input is clamped rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogPatch {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratings: Option<Ratings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

impl CatalogPatch {
    /// A patch that only sets stock.
    #[must_use]
    pub fn stock(stock: i64) -> Self {
        Self {
            stock: Some(stock),
            ..Self::default()
        }
    }

    /// The identifier this patch refers to, `_id` first.
    #[must_use]
    pub const fn key(&self) -> Option<&ProductId> {
        match (&self.doc_id, &self.id) {
            (Some(id), _) | (None, Some(id)) => Some(id),
            (None, None) => None,
        }
    }
}

impl From<&ProductDocument> for CatalogPatch {
    fn from(product: &ProductDocument) -> Self {
        Self {
            doc_id: product.doc_id.clone(),
            id: Some(product.identity()),
            title: Some(product.title.clone()),
            name: Some(product.name.clone()),
            price: Some(product.price),
            stock: product.stock,
            sales_count: Some(product.sales_count),
            ratings: Some(product.ratings.clone()),
            category: product.category.clone(),
            slug: Some(product.slug.clone()),
            main_image: product.main_image.clone(),
            discount: Some(product.discount),
            featured: Some(product.featured),
        }
    }
}

impl From<&CatalogSnapshotEntry> for CatalogPatch {
    fn from(entry: &CatalogSnapshotEntry) -> Self {
        Self {
            doc_id: entry.doc_id.clone(),
            id: entry.id.clone(),
            title: Some(entry.title.clone()),
            name: Some(entry.name.clone()),
            price: Some(entry.price),
            stock: Some(i64::try_from(entry.stock).unwrap_or(i64::MAX)),
            sales_count: Some(i64::try_from(entry.sales_count).unwrap_or(i64::MAX)),
            ratings: Some(entry.ratings.clone()),
            category: entry.category.clone(),
            slug: Some(entry.slug.clone()),
            main_image: entry.main_image.clone(),
            discount: Some(entry.discount),
            featured: Some(entry.featured),
        }
    }
}

/// A product's mutable fields as cached in the catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "CatalogPatch")]
pub struct CatalogSnapshotEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub title: String,
    pub name: String,
    pub price: Decimal,
    stock: u64,
    sales_count: u64,
    pub ratings: Ratings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    pub discount: Decimal,
    pub featured: bool,
    in_stock: bool,
}

impl CatalogSnapshotEntry {
    /// Shallow-merge a patch, then clamp counters and re-derive `in_stock`.
    pub fn apply(&mut self, patch: &CatalogPatch) {
        if let Some(doc_id) = &patch.doc_id {
            self.doc_id = Some(doc_id.clone());
        }
        if let Some(id) = &patch.id {
            self.id = Some(id.clone());
        }
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = clamp_count(stock);
        }
        if let Some(sales_count) = patch.sales_count {
            self.sales_count = clamp_count(sales_count);
        }
        if let Some(ratings) = &patch.ratings {
            self.ratings = ratings.clone();
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone());
        }
        if let Some(slug) = &patch.slug {
            self.slug.clone_from(slug);
        }
        if let Some(main_image) = &patch.main_image {
            self.main_image = Some(main_image.clone());
        }
        if let Some(discount) = patch.discount {
            self.discount = discount;
        }
        if let Some(featured) = patch.featured {
            self.featured = featured;
        }
        self.in_stock = self.stock > 0;
    }

    /// Units in stock (never negative).
    #[must_use]
    pub const fn stock(&self) -> u64 {
        self.stock
    }

    /// Lifetime units sold (never negative).
    #[must_use]
    pub const fn sales_count(&self) -> u64 {
        self.sales_count
    }

    /// Whether the product can currently be purchased (`stock > 0`).
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.in_stock
    }

    /// Whether this entry is identified by `id` under either `_id` or `id`.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        self.doc_id.as_ref().is_some_and(|d| d.as_str() == id)
            || self.id.as_ref().is_some_and(|i| i.as_str() == id)
    }

    /// The entry's primary key, `_id` first.
    #[must_use]
    pub const fn key(&self) -> Option<&ProductId> {
        match (&self.doc_id, &self.id) {
            (Some(id), _) | (None, Some(id)) => Some(id),
            (None, None) => None,
        }
    }

    /// Overlay the cached dynamic fields onto a server-rendered product.
    #[must_use]
    pub fn overlay(&self, product: &ProductDocument) -> ProductDocument {
        ProductDocument {
            stock: Some(i64::try_from(self.stock).unwrap_or(i64::MAX)),
            sales_count: i64::try_from(self.sales_count).unwrap_or(i64::MAX),
            ratings: self.ratings.clone(),
            discount: self.discount,
            featured: self.featured,
            ..product.clone()
        }
    }
}

impl From<CatalogPatch> for CatalogSnapshotEntry {
    fn from(patch: CatalogPatch) -> Self {
        let mut entry = Self::default();
        entry.apply(&patch);
        entry
    }
}

impl From<&ProductDocument> for CatalogSnapshotEntry {
    fn from(product: &ProductDocument) -> Self {
        Self::from(CatalogPatch::from(product))
    }
}
