//! Status enums for change events and sessions.

use serde::{Deserialize, Serialize};

/// What happened to an entity in a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Entity types carried by the real-time channel.
///
/// Each kind maps to one named channel event (`product-changed`, ...) and to
/// the payload key holding the entity (`product`) or its id (`productId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Order,
    Customer,
    Kpi,
    Cart,
    Wishlist,
}

impl EntityKind {
    /// All entity kinds, in dispatch order.
    pub const ALL: [Self; 6] = [
        Self::Product,
        Self::Order,
        Self::Customer,
        Self::Kpi,
        Self::Cart,
        Self::Wishlist,
    ];

    /// Channel event name for this entity kind.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Product => "product-changed",
            Self::Order => "order-changed",
            Self::Customer => "customer-changed",
            Self::Kpi => "kpi-changed",
            Self::Cart => "cart-changed",
            Self::Wishlist => "wishlist-changed",
        }
    }

    /// Payload key holding the full entity.
    #[must_use]
    pub const fn payload_key(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Order => "order",
            Self::Customer => "customer",
            Self::Kpi => "kpis",
            Self::Cart | Self::Wishlist => "item",
        }
    }

    /// Payload key holding the entity id on deletions.
    #[must_use]
    pub const fn id_key(self) -> &'static str {
        match self {
            Self::Product => "productId",
            Self::Order => "orderId",
            Self::Customer => "customerId",
            Self::Kpi => "kpiId",
            Self::Cart | Self::Wishlist => "itemId",
        }
    }

    /// Resolve a channel event name to its entity kind.
    #[must_use]
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.event_name() == name)
    }
}

/// Role a session announces on the real-time channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// Shopper session: cart and wishlist events only.
    #[default]
    Customer,
    /// Admin dashboard: additionally joins the admin room.
    Admin,
}

impl SessionRole {
    /// Whether this role joins the admin room.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for SessionRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid session role: {s}")),
        }
    }
}
