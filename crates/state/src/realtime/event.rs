//! Channel events and their payloads.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shopfront_core::{CartItem, CatalogPatch, ChangeAction, EntityKind, Record, WishlistItem};

use super::ChannelError;

/// A frame read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Event(RawEvent),
    /// Keep-alive with no payload.
    Heartbeat,
}

/// A named event with its undecoded JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub name: String,
    pub data: String,
}

impl RawEvent {
    #[must_use]
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// An entity change. Deletions carry only the id.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Created(T),
    Updated(T),
    Deleted(String),
}

impl<T> Change<T> {
    #[must_use]
    pub const fn action(&self) -> ChangeAction {
        match self {
            Self::Created(_) => ChangeAction::Created,
            Self::Updated(_) => ChangeAction::Updated,
            Self::Deleted(_) => ChangeAction::Deleted,
        }
    }
}

/// A decoded channel event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Product(Change<CatalogPatch>),
    Order(Change<Record>),
    Customer(Change<Record>),
    /// KPIs changed; the payload may carry the new values.
    Kpi(Option<Value>),
    Cart(Change<CartItem>),
    Wishlist(Change<WishlistItem>),
}

impl ChangeEvent {
    /// Decode a raw event.
    ///
    /// Returns `Ok(None)` for event names this layer does not handle.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Decode` if the payload is not a JSON object,
    /// has no valid `action`, or lacks the entity (or id, for deletions).
    pub fn parse(raw: &RawEvent) -> Result<Option<Self>, ChannelError> {
        let Some(kind) = EntityKind::from_event_name(&raw.name) else {
            return Ok(None);
        };
        let decode_error = |reason: String| ChannelError::Decode {
            event: raw.name.clone(),
            reason,
        };

        let payload: Map<String, Value> =
            serde_json::from_str(&raw.data).map_err(|e| decode_error(e.to_string()))?;

        if kind == EntityKind::Kpi {
            return Ok(Some(Self::Kpi(payload.get(kind.payload_key()).cloned())));
        }

        let action: ChangeAction = payload
            .get("action")
            .cloned()
            .ok_or_else(|| decode_error("missing action".to_string()))
            .and_then(|action| {
                serde_json::from_value(action).map_err(|e| decode_error(e.to_string()))
            })?;

        let event = match kind {
            EntityKind::Product => Self::Product(change(kind, action, &payload).map_err(decode_error)?),
            EntityKind::Order => Self::Order(change(kind, action, &payload).map_err(decode_error)?),
            EntityKind::Customer => {
                Self::Customer(change(kind, action, &payload).map_err(decode_error)?)
            }
            EntityKind::Cart => Self::Cart(change(kind, action, &payload).map_err(decode_error)?),
            EntityKind::Wishlist => {
                Self::Wishlist(change(kind, action, &payload).map_err(decode_error)?)
            }
            EntityKind::Kpi => return Ok(Some(Self::Kpi(None))),
        };
        Ok(Some(event))
    }

    /// Entity kind of this event.
    #[must_use]
    pub const fn entity(&self) -> EntityKind {
        match self {
            Self::Product(_) => EntityKind::Product,
            Self::Order(_) => EntityKind::Order,
            Self::Customer(_) => EntityKind::Customer,
            Self::Kpi(_) => EntityKind::Kpi,
            Self::Cart(_) => EntityKind::Cart,
            Self::Wishlist(_) => EntityKind::Wishlist,
        }
    }

    /// Action of this event (`updated` for KPI notifications).
    #[must_use]
    pub const fn action(&self) -> ChangeAction {
        match self {
            Self::Product(change) => change.action(),
            Self::Order(change) | Self::Customer(change) => change.action(),
            Self::Cart(change) => change.action(),
            Self::Wishlist(change) => change.action(),
            Self::Kpi(_) => ChangeAction::Updated,
        }
    }
}

fn change<T: DeserializeOwned>(
    kind: EntityKind,
    action: ChangeAction,
    payload: &Map<String, Value>,
) -> Result<Change<T>, String> {
    let entity = payload.get(kind.payload_key());

    if action == ChangeAction::Deleted {
        let id = payload
            .get(kind.id_key())
            .and_then(Value::as_str)
            .or_else(|| {
                entity.and_then(|e| e.get("_id").or_else(|| e.get("id")).and_then(Value::as_str))
            })
            .ok_or_else(|| format!("missing {}", kind.id_key()))?;
        return Ok(Change::Deleted(id.to_string()));
    }

    let entity = entity.ok_or_else(|| format!("missing {}", kind.payload_key()))?;
    let entity: T = serde_json::from_value(entity.clone()).map_err(|e| e.to_string())?;
    Ok(match action {
        ChangeAction::Created => Change::Created(entity),
        ChangeAction::Updated | ChangeAction::Deleted => Change::Updated(entity),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(name: &str, data: &Value) -> RawEvent {
        RawEvent::new(name, data.to_string())
    }

    #[test]
    fn test_product_update_parses() {
        let event = ChangeEvent::parse(&raw(
            "product-changed",
            &json!({"action": "updated", "product": {"_id": "p1", "stock": 3}}),
        ))
        .unwrap()
        .unwrap();

        let ChangeEvent::Product(Change::Updated(patch)) = &event else {
            panic!("unexpected {event:?}");
        };
        assert_eq!(patch.stock, Some(3));
        assert_eq!(event.entity(), EntityKind::Product);
        assert_eq!(event.action(), ChangeAction::Updated);
    }

    #[test]
    fn test_deletion_uses_id_key() {
        let event = ChangeEvent::parse(&raw(
            "order-changed",
            &json!({"action": "deleted", "orderId": "o9"}),
        ))
        .unwrap();
        assert_eq!(event, Some(ChangeEvent::Order(Change::Deleted("o9".to_string()))));
    }

    #[test]
    fn test_deletion_falls_back_to_entity_id() {
        let event = ChangeEvent::parse(&raw(
            "customer-changed",
            &json!({"action": "deleted", "customer": {"_id": "c3"}}),
        ))
        .unwrap();
        assert_eq!(
            event,
            Some(ChangeEvent::Customer(Change::Deleted("c3".to_string())))
        );
    }

    #[test]
    fn test_cart_event_uses_item_key() {
        let event = ChangeEvent::parse(&raw(
            "cart-changed",
            &json!({"action": "deleted", "itemId": "p1"}),
        ))
        .unwrap();
        assert_eq!(event, Some(ChangeEvent::Cart(Change::Deleted("p1".to_string()))));
    }

    #[test]
    fn test_kpi_event_carries_optional_payload() {
        let event = ChangeEvent::parse(&raw("kpi-changed", &json!({"kpis": {"orders": 4}}))).unwrap();
        assert_eq!(event, Some(ChangeEvent::Kpi(Some(json!({"orders": 4})))));

        let bare = ChangeEvent::parse(&raw("kpi-changed", &json!({}))).unwrap();
        assert_eq!(bare, Some(ChangeEvent::Kpi(None)));
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        assert_eq!(
            ChangeEvent::parse(&RawEvent::new("presence", "{}")).unwrap(),
            None
        );
    }

    #[test]
    fn test_malformed_payloads_are_errors() {
        for data in [
            "not json",
            r#"{"product": {"_id": "p1"}}"#,
            r#"{"action": "exploded", "product": {}}"#,
            r#"{"action": "updated"}"#,
            r#"{"action": "deleted"}"#,
        ] {
            let result = ChangeEvent::parse(&RawEvent::new("product-changed", data));
            assert!(
                matches!(result, Err(ChannelError::Decode { .. })),
                "{data} should not decode"
            );
        }
    }
}
