//! Cache types for store API responses.

use shopfront_core::{ProductDocument, ShippingMethod};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(String),
    Products,
    ShippingMethods,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<ProductDocument>),
    Products(Vec<ProductDocument>),
    ShippingMethods(Vec<ShippingMethod>),
}
