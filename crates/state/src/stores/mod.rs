//! Entity stores.
//!
//! Each store wraps a [`Store`](crate::store::Store) and exposes the domain
//! operations surfaces call. Cart, wishlist and catalog persist their durable
//! projection; banners and admin data are always fetched fresh.

pub mod admin;
pub mod banner;
pub mod cart;
pub mod catalog;
pub mod wishlist;

pub use admin::{AdminSnapshot, AdminState};
pub use banner::{BannerSlot, BannerStore};
pub use cart::{CartState, CartStore};
pub use catalog::{CatalogSnapshot, CatalogState};
pub use wishlist::{WishlistState, WishlistStore};
