//! Shipping methods offered at cart and checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ShippingMethodId;

/// Delivery estimate in days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatedDays {
    pub min: u32,
    pub max: u32,
}

/// A shipping method returned by the shipping-methods fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingMethod {
    #[serde(rename = "_id")]
    pub id: ShippingMethodId,
    pub name: String,
    /// Flat cost; negative values from upstream are treated as zero.
    pub cost: Decimal,
    #[serde(default)]
    pub estimated_days: EstimatedDays,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl ShippingMethod {
    /// Shipping cost, never negative.
    #[must_use]
    pub fn charge(&self) -> Decimal {
        self.cost.max(Decimal::ZERO)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shipping_method() {
        let json = r#"{"_id": "std", "name": "Standard", "cost": 150,
            "estimatedDays": {"min": 3, "max": 5}, "isDefault": true}"#;
        let method: ShippingMethod = serde_json::from_str(json).unwrap();
        assert_eq!(method.id.as_str(), "std");
        assert!(method.is_default);
        assert!(method.is_active);
        assert_eq!(method.estimated_days.max, 5);
        assert_eq!(method.charge(), Decimal::from(150));
    }

    #[test]
    fn test_negative_cost_charges_zero() {
        let method = ShippingMethod {
            id: ShippingMethodId::new("x"),
            name: "Broken".to_string(),
            cost: Decimal::from(-10),
            estimated_days: EstimatedDays::default(),
            is_default: false,
            is_active: true,
        };
        assert_eq!(method.charge(), Decimal::ZERO);
    }
}
