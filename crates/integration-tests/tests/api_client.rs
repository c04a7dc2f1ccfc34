//! Store API client against the fake backend.
//!
//! These tests cover response decoding, error mapping, and the product cache.

use axum::http::StatusCode;
use serde_json::json;
use shopfront_core::{BannerKind, CatalogPatch, ProductId};
use shopfront_integration_tests::{FakeBackend, Failure, product_json};
use shopfront_state::ApiError;
use shopfront_state::api::{BannerApi, ProductApi};

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_products_are_cached() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| s.products = vec![product_json("p1", 500, 3), product_json("p2", 900, 0)]);
    let storefront = backend.storefront();

    let first = storefront.api().products().await.unwrap();
    let second = storefront.api().products().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(backend.with_state(|s| s.product_requests), 1);
}

#[tokio::test]
async fn test_missing_product_is_none() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| s.products = vec![product_json("p1", 500, 3)]);
    let api = backend.storefront().api().clone();

    assert!(api.product("p1").await.unwrap().is_some());
    assert!(api.product("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_product_edit_invalidates_cache() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| s.products = vec![product_json("p1", 500, 3)]);
    let api = backend.storefront().api().clone();

    api.products().await.unwrap();
    let updated = api
        .update_product(&ProductId::new("p1"), &CatalogPatch::stock(9))
        .await
        .unwrap();
    assert_eq!(updated.stock, Some(9));

    let products = api.products().await.unwrap();
    assert_eq!(products[0].stock, Some(9));
    assert_eq!(backend.with_state(|s| s.product_requests), 2);
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn test_error_body_maps_to_rejected() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.products_failure = Some(Failure::rejected(StatusCode::BAD_REQUEST, "Catalog offline"));
    });

    let err = backend.storefront().api().products().await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref message) if message == "Catalog offline"));
}

#[tokio::test]
async fn test_error_body_on_success_status_maps_to_rejected() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.products_failure = Some(Failure::rejected(StatusCode::OK, "Maintenance"));
    });

    let err = backend.storefront().api().products().await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref message) if message == "Maintenance"));
}

#[tokio::test]
async fn test_plain_failure_maps_to_status() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.products_failure = Some(Failure::status(StatusCode::BAD_GATEWAY, "upstream down"));
    });

    let err = backend.storefront().api().products().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Status { status: 502, ref message } if message == "upstream down"
    ));
}

#[tokio::test]
async fn test_rate_limit_reads_retry_after() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| s.products_failure = Some(Failure::rate_limited(7)));

    let err = backend.storefront().api().products().await.unwrap_err();
    assert!(matches!(err, ApiError::RateLimited(7)));
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.products = vec![product_json("p1", 500, 3)];
        s.products_failure = Some(Failure::status(StatusCode::SERVICE_UNAVAILABLE, "busy"));
    });
    let api = backend.storefront().api().clone();

    assert!(api.products().await.is_err());
    backend.with_state(|s| s.products_failure = None);
    assert_eq!(api.products().await.unwrap().len(), 1);
}

// =============================================================================
// Banners
// =============================================================================

#[tokio::test]
async fn test_banner_fetch_keeps_unknown_fields() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.banners.insert(
            "ad".to_string(),
            json!({"_id": "b1", "isActive": true, "image": "/ad.png", "link": "/sale"}),
        );
    });
    let api = backend.storefront().api().clone();

    let banner = api.banner(BannerKind::Ad).await.unwrap().unwrap();
    assert!(banner.is_active);
    assert_eq!(banner.content(), Some("/ad.png"));
    assert_eq!(banner.extra.get("link"), Some(&json!("/sale")));

    assert!(api.banner(BannerKind::Announcement).await.unwrap().is_none());
}
