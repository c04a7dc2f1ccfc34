//! Unified error handling with Sentry integration.
//!
//! Each layer has its own error enum; [`StateError`] aggregates them for
//! callers that drive several layers at once (checkout, the CLI).
//!
//! # Taxonomy
//!
//! - [`ValidationError`] - synchronous, local, never retried, never partially applied
//! - [`ApiError`] - transport and server rejections; optimistic sites roll back
//! - [`ChannelError`] - real-time transport; recovered by reconnect or polling
//! - [`StorageError`] - persistence medium; swallowed by `PersistentStore`

use shopfront_core::{ProductId, ShippingMethodId};
use thiserror::Error;

pub use crate::api::ApiError;
pub use crate::config::ConfigError;
pub use crate::realtime::ChannelError;

/// A mutation was refused before touching any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Adding the requested quantity would exceed known stock.
    #[error("Insufficient stock for {id}: requested {requested}, available {available}")]
    InsufficientStock {
        id: ProductId,
        requested: u64,
        available: u64,
    },

    /// Quantity must be at least one when adding.
    #[error("Invalid quantity for {0}: must be at least 1")]
    InvalidQuantity(ProductId),

    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The selected shipping method is not offered.
    #[error("Unknown shipping method: {0}")]
    UnknownShippingMethod(ShippingMethodId),

    /// Checkout needs a shipping method and none is offered.
    #[error("No shipping method selected")]
    NoShippingMethod,
}

/// Persistence medium failure. Never surfaced past `PersistentStore`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage is not available (read-only medium, private mode).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Storage refused the write for lack of space.
    #[error("Storage quota exceeded for {0}")]
    QuotaExceeded(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Application-level error type for the state layer.
#[derive(Debug, Error)]
pub enum StateError {
    /// Local validation refused the mutation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storefront API operation failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Real-time channel failed.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StateError {
    /// Message safe to show in a toast.
    ///
    /// Validation errors are shown verbatim; transport details are hidden.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::Api(ApiError::Rejected(message)) => message.clone(),
            Self::Api(ApiError::RateLimited(_)) => {
                "Too many requests, please try again shortly".to_string()
            }
            Self::Api(_) | Self::Channel(_) => "Could not reach the store".to_string(),
            Self::Config(_) => "Store is misconfigured".to_string(),
        }
    }

    /// Capture non-validation errors to Sentry and log them.
    pub fn report(&self) {
        if matches!(self, Self::Validation(_)) {
            tracing::debug!(error = %self, "Validation error");
            return;
        }

        let event_id = sentry::capture_error(self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "State layer error"
        );
    }
}

/// Result type alias for `StateError`.
pub type Result<T> = std::result::Result<T, StateError>;

/// Add a breadcrumb for store activity.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of mutations
/// and rollbacks leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InsufficientStock {
            id: ProductId::new("p1"),
            requested: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for p1: requested 3, available 2"
        );
        assert_eq!(ValidationError::EmptyCart.to_string(), "Cart is empty");
    }

    #[test]
    fn test_user_message_hides_transport_details() {
        let err = StateError::Api(ApiError::Status {
            status: 502,
            message: "upstream exploded at 10.0.0.3".to_string(),
        });
        assert_eq!(err.user_message(), "Could not reach the store");

        let err = StateError::Api(ApiError::Rejected("Coupon expired".to_string()));
        assert_eq!(err.user_message(), "Coupon expired");

        let err = StateError::from(ValidationError::EmptyCart);
        assert_eq!(err.user_message(), "Cart is empty");
    }

    #[test]
    fn test_breadcrumb_without_client_is_noop() {
        add_breadcrumb("cart", "Added item", Some(&[("product_id", "p1")]));
    }
}
