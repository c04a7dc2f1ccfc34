//! Shopfront State - client-side reactive commerce state.
//!
//! This crate keeps the storefront's cart, wishlist, catalog snapshot,
//! banners, and admin dashboard data consistent across every UI surface:
//!
//! - [`store`] - Observable state containers with durable persistence
//! - [`stores`] - The entity stores built on them
//! - [`optimistic`] - Apply-then-confirm mutations with rollback
//! - [`realtime`] - Server push subscription, reconnect policy, and polling fallback
//! - [`checkout`] - Shipping selection, quoting, and order placement
//! - [`api`] - HTTP client for the store backend
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_state::{StateConfig, Storefront};
//!
//! let storefront = Storefront::new(StateConfig::from_env()?);
//! storefront.refresh_catalog().await?;
//!
//! let channel = storefront.realtime(false);
//! tokio::spawn(async move { channel.run(std::future::pending()).await });
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod checkout;
pub mod config;
pub mod error;
pub mod events;
pub mod optimistic;
pub mod persist;
pub mod realtime;
pub mod store;
pub mod stores;
pub mod storefront;
pub mod supersede;

pub use api::{ApiError, StoreApiClient};
pub use checkout::{Checkout, ShippingSelection};
pub use config::{ConfigError, RealtimeConfig, StateConfig};
pub use error::{Result, StateError, ValidationError};
pub use events::{EventBus, Notice, NoticeLevel, StoreEvent};
pub use persist::{FileStorage, MemoryStorage, PersistentStore, STORAGE_NAMESPACE, StorageBackend};
pub use realtime::{ChannelState, RealtimeChannel};
pub use store::Store;
pub use storefront::Storefront;
