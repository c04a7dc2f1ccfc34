//! Offline price quotes for a cart file.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use shopfront_core::{
    CartItem, DEFAULT_GST_RATE, EstimatedDays, Quote, ShippingMethod, ShippingMethodId,
};

use super::{CommandError, write_json};

/// Accepted cart file layouts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CartFile {
    Lines(Vec<CartItem>),
    Wrapped { items: Vec<CartItem> },
}

impl CartFile {
    fn into_items(self) -> Vec<CartItem> {
        match self {
            Self::Lines(items) | Self::Wrapped { items } => items,
        }
    }
}

/// Read cart lines from `path` and print their quote.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a cart.
pub fn run(
    path: &Path,
    shipping_cost: Option<Decimal>,
    gst: Option<Decimal>,
) -> Result<(), CommandError> {
    let items = parse_cart(&std::fs::read_to_string(path)?)?;
    let quote = price(&items, shipping_cost, gst);
    tracing::debug!(lines = items.len(), total = %quote.total, "Computed quote");
    write_json(&quote)
}

fn parse_cart(json: &str) -> Result<Vec<CartItem>, serde_json::Error> {
    Ok(serde_json::from_str::<CartFile>(json)?.into_items())
}

fn price(items: &[CartItem], shipping_cost: Option<Decimal>, gst: Option<Decimal>) -> Quote {
    let method = shipping_cost.map(|cost| ShippingMethod {
        id: ShippingMethodId::new("flat"),
        name: "Flat rate".to_string(),
        cost,
        estimated_days: EstimatedDays::default(),
        is_default: true,
        is_active: true,
    });
    Quote::compute(
        items,
        method.as_ref(),
        gst.unwrap_or_else(|| Decimal::from(DEFAULT_GST_RATE)),
    )
}
