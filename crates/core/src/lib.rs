//! Shopfront Core - Shared types library.
//!
//! This crate provides the commerce types used across all Shopfront components:
//! - `state` - Client-side reactive commerce state (stores, sync, checkout)
//! - `cli` - Command-line tools for quoting and inspecting persisted state
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and lets the same pricing
//! rules run wherever a price is displayed or persisted.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, statuses, and the commerce data model
//! - [`pricing`] - Subtotal, shipping, tax, and total derivation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{DEFAULT_GST_RATE, Quote};
pub use types::*;
