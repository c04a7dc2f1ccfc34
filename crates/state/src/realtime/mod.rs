//! Real-time reconciliation channel.
//!
//! The server pushes named change events (`product-changed`, `order-changed`,
//! ...) over a long-lived connection. Each event is parsed into a
//! [`ChangeEvent`] and applied by the [`Reconciler`] through the same
//! idempotent merge paths the stores use locally, so a duplicated event or a
//! polling refetch that overlaps with pushed events is harmless.
//!
//! Connection lifecycle is a bounded-retry state machine (see
//! [`ConnectionMachine`]); once the retry budget is spent the channel falls
//! back to polling.

mod channel;
mod event;
mod machine;
mod reconcile;
mod sse;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shopfront_core::{ProductDocument, Record, SessionId};
use thiserror::Error;

use crate::api::ApiError;

pub use channel::RealtimeChannel;
pub use event::{Change, ChangeEvent, Frame, RawEvent};
pub use machine::{ChannelState, ConnectionMachine};
pub use reconcile::Reconciler;
pub use sse::{SseConnection, SseDecoder, SseTransport};

/// Errors raised by the real-time transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The connection could not be opened.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// An open stream failed.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Interest announcement was refused.
    #[error("Announce failed: {0}")]
    Announce(String),

    /// An event payload could not be decoded.
    #[error("Malformed {event} payload: {reason}")]
    Decode { event: String, reason: String },

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// What a session announces on every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interest {
    #[serde(rename = "sessionId")]
    pub session: SessionId,
    /// Join the admin room (orders, customers, KPIs).
    pub admin: bool,
}

impl Interest {
    /// A shopper session.
    #[must_use]
    pub const fn customer(session: SessionId) -> Self {
        Self {
            session,
            admin: false,
        }
    }

    /// An admin dashboard session.
    #[must_use]
    pub const fn admin(session: SessionId) -> Self {
        Self {
            session,
            admin: true,
        }
    }
}

/// Opens connections to the event source.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, ChannelError>;
}

/// One open connection.
#[async_trait]
pub trait Connection: Send {
    /// Announce the session's interest. Called once per connection.
    async fn announce(&mut self, interest: &Interest) -> Result<(), ChannelError>;

    /// Wait for the next frame; `Ok(None)` when the server closed the stream.
    async fn next_event(&mut self) -> Result<Option<Frame>, ChannelError>;
}

/// Everything a polling refetch brings back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefetchBatch {
    pub products: Vec<ProductDocument>,
    /// Admin data, fetched only for admin interest.
    pub orders: Option<Vec<Record>>,
    pub customers: Option<Vec<Record>>,
    pub kpis: Option<Value>,
}

/// Source of full refetches for polling and stall recovery.
#[async_trait]
pub trait Refetch: Send + Sync {
    async fn refetch(&self, interest: &Interest) -> Result<RefetchBatch, ApiError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_wire_shape() {
        let interest = Interest::admin(SessionId::new("s-1"));
        assert_eq!(
            serde_json::to_value(&interest).unwrap(),
            serde_json::json!({"sessionId": "s-1", "admin": true})
        );
        assert!(!Interest::customer(SessionId::new("s-2")).admin);
    }
}
