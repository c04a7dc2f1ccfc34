//! Cart to order: shipping selection, quoting, placement.

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use shopfront_core::{ProductDocument, ShippingMethodId};
use shopfront_integration_tests::{FakeBackend, Failure, product_json};
use shopfront_state::api::ShippingAddress;
use shopfront_state::{StateError, ValidationError};

fn shipping_methods() -> Vec<Value> {
    vec![
        json!({"_id": "express", "name": "Express", "cost": 250, "estimatedDays": {"min": 1, "max": 2}, "isDefault": false, "isActive": true}),
        json!({"_id": "standard", "name": "Standard", "cost": 150, "estimatedDays": {"min": 3, "max": 5}, "isDefault": true, "isActive": true}),
        json!({"_id": "pickup", "name": "Pickup", "cost": 0, "estimatedDays": {"min": 0, "max": 0}, "isDefault": false, "isActive": false}),
    ]
}

fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Rao".to_string(),
        phone: "9800000000".to_string(),
        address_line1: "12 MG Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "KA".to_string(),
        postal_code: "560001".to_string(),
        ..ShippingAddress::default()
    }
}

async fn seeded() -> (FakeBackend, Vec<ProductDocument>) {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.products = vec![product_json("p1", 1000, 5), product_json("p2", 250, 2)];
        s.shipping_methods = shipping_methods();
    });
    let products = backend.storefront().refresh_catalog().await.unwrap();
    (backend, products)
}

#[tokio::test]
async fn test_checkout_places_order_and_settles_state() {
    let (backend, products) = seeded().await;
    let storefront = backend.storefront();
    storefront.add_to_cart(&products[0], None, 1).unwrap();
    storefront.add_to_cart(&products[1], None, 2).unwrap();

    let checkout = storefront.checkout().await.unwrap();
    assert_eq!(checkout.shipping().methods().len(), 2);
    assert_eq!(checkout.shipping().selected().unwrap().id.as_str(), "standard");

    let quote = checkout.quote();
    assert_eq!(quote.subtotal, Decimal::from(1500));
    assert_eq!(quote.shipping, Decimal::from(150));
    assert_eq!(quote.tax, Decimal::from(297));
    assert_eq!(quote.total, Decimal::from(1947));

    let confirmation = checkout.place_order(storefront.api(), address()).await.unwrap();
    assert_eq!(confirmation.order_id.as_str(), "order-1");
    assert_eq!(confirmation.amount, quote.total);

    assert!(storefront.cart().is_empty());
    let p2 = storefront.catalog().get("p2").unwrap();
    assert_eq!(p2.sales_count(), 2);
    assert_eq!(p2.stock(), 0);

    let sent = backend.with_state(|s| s.placed_orders[0].clone());
    assert_eq!(sent["shippingMethod"], "standard");
    assert_eq!(sent["shipping"]["country"], "IN");
    assert_eq!(sent["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_changing_shipping_method_requotes() {
    let (backend, products) = seeded().await;
    let storefront = backend.storefront();
    storefront.add_to_cart(&products[0], None, 1).unwrap();

    let mut checkout = storefront.checkout().await.unwrap();
    checkout
        .shipping_mut()
        .select(&ShippingMethodId::new("express"))
        .unwrap();
    // round((1000 + 250) * 0.18) = 225
    assert_eq!(checkout.quote().total, Decimal::from(1475));

    let err = checkout
        .shipping_mut()
        .select(&ShippingMethodId::new("pickup"))
        .unwrap_err();
    assert!(matches!(err, ValidationError::UnknownShippingMethod(_)));
    assert_eq!(checkout.shipping().selected().unwrap().id.as_str(), "express");
}

#[tokio::test]
async fn test_rejected_order_keeps_cart() {
    let (backend, products) = seeded().await;
    backend.with_state(|s| {
        s.order_failure = Some(Failure::rejected(StatusCode::OK, "Insufficient stock for Product p1"));
    });
    let storefront = backend.storefront();
    storefront.add_to_cart(&products[0], None, 2).unwrap();

    let checkout = storefront.checkout().await.unwrap();
    let err = checkout
        .place_order(storefront.api(), address())
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Insufficient stock for Product p1");
    assert_eq!(storefront.cart().quantity_of("p1"), 2);
    assert_eq!(storefront.catalog().get("p1").unwrap().sales_count(), 0);
}

#[tokio::test]
async fn test_empty_cart_never_reaches_server() {
    let (backend, _) = seeded().await;
    let storefront = backend.storefront();

    let checkout = storefront.checkout().await.unwrap();
    let err = checkout
        .place_order(storefront.api(), address())
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::Validation(ValidationError::EmptyCart)));
    assert!(backend.with_state(|s| s.placed_orders.is_empty()));
}
