//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts and
//! the wire shapes exchanged with the storefront API.

pub mod banner;
pub mod cart;
pub mod catalog;
pub mod id;
pub mod price;
pub mod product;
pub mod record;
pub mod shipping;
pub mod status;

pub use banner::{Banner, BannerKind};
pub use cart::{CartItem, WishlistItem};
pub use catalog::{CatalogPatch, CatalogSnapshotEntry, clamp_count};
pub use id::*;
pub use price::{CurrencyCode, Price, round_money};
pub use product::{ColorVariant, ProductDocument, Ratings};
pub use record::Record;
pub use shipping::{EstimatedDays, ShippingMethod};
pub use status::*;
