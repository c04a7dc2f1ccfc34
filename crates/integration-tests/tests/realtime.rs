//! Real-time channel end to end over server-sent events.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use shopfront_core::EntityKind;
use shopfront_integration_tests::{
    FakeBackend, Failure, eventually, fast_realtime, product_json, spawn_channel,
};
use shopfront_state::{ChannelState, PersistentStore, StoreEvent, Storefront};

#[tokio::test]
async fn test_pushed_changes_reach_the_catalog() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| s.products = vec![product_json("p1", 500, 5)]);
    let storefront = backend.storefront();
    storefront.refresh_catalog().await.unwrap();
    let mut events = storefront.events().subscribe();

    let (stop, handle) = spawn_channel(storefront.realtime(false));
    eventually("join", || backend.with_state(|s| s.joins.len() == 1)).await;

    let update = json!({"action": "updated", "product": {"_id": "p1", "stock": 2, "salesCount": 3}});
    backend.push("product-changed", &update);
    eventually("stock update", || {
        storefront.catalog().get("p1").is_some_and(|e| e.stock() == 2)
    })
    .await;
    let once = storefront.catalog().entries();

    // A duplicate delivery changes nothing
    backend.push("product-changed", &update);
    backend.push(
        "product-changed",
        &json!({"action": "created", "product": {"_id": "p2", "title": "New", "stock": 1}}),
    );
    eventually("create", || storefront.catalog().get("p2").is_some()).await;
    assert_eq!(storefront.catalog().get("p1"), once.into_iter().next());
    assert_eq!(storefront.catalog().get("p1").unwrap().sales_count(), 3);

    backend.push("product-changed", &json!({"action": "deleted", "productId": "p2"}));
    eventually("delete", || storefront.catalog().get("p2").is_none()).await;

    let reconciled = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, StoreEvent::Reconciled { entity: EntityKind::Product, .. }))
        .count();
    assert_eq!(reconciled, 4);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_reconnect_announces_exactly_once_per_connection() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    let channel = storefront.realtime(false);
    let state = channel.state();

    let (stop, handle) = spawn_channel(channel);
    eventually("first join", || backend.with_state(|s| s.joins.len() == 1)).await;

    backend.drop_streams();
    eventually("second join", || backend.with_state(|s| s.joins.len() == 2)).await;
    backend.drop_streams();
    eventually("third join", || backend.with_state(|s| s.joins.len() == 3)).await;
    eventually("connected", || *state.borrow() == ChannelState::Connected).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    backend.with_state(|s| {
        assert_eq!(s.stream_sessions.len(), 3);
        assert_eq!(s.joins.len(), 3);
        for join in &s.joins {
            assert_eq!(join["sessionId"], storefront.session().as_str());
            assert_eq!(join["admin"], false);
        }
        assert!(s.stream_sessions.iter().all(|id| id == storefront.session().as_str()));
    });

    stop.send(()).unwrap();
    handle.await.unwrap();
    assert_eq!(*state.borrow(), ChannelState::Disconnected);
}

#[tokio::test]
async fn test_exhausted_reconnects_fall_back_to_polling() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.refuse_streams = true;
        s.products = vec![product_json("p1", 500, 5)];
        s.orders = vec![json!({"_id": "o1", "status": "paid"})];
        s.kpis = json!({"revenue": 1200});
    });
    let storefront = backend.storefront();
    let channel = storefront.realtime(true);
    let state = channel.state();

    let (stop, handle) = spawn_channel(channel);
    eventually("exhausted", || *state.borrow() == ChannelState::Exhausted).await;
    eventually("polled twice", || backend.with_state(|s| s.product_requests >= 2)).await;

    let attempts = fast_realtime().max_reconnect_attempts as usize;
    assert_eq!(backend.with_state(|s| s.stream_sessions.len()), attempts + 1);
    assert!(backend.with_state(|s| s.joins.is_empty()));
    assert!(storefront.catalog().get("p1").is_some());
    assert_eq!(storefront.admin().orders().len(), 1);
    assert_eq!(storefront.admin().kpis(), Some(json!({"revenue": 1200})));

    // Polling keeps tracking the server
    backend.with_state(|s| s.products = vec![product_json("p1", 500, 1)]);
    eventually("polled stock", || {
        storefront.catalog().get("p1").is_some_and(|e| e.stock() == 1)
    })
    .await;

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_failed_poll_keeps_polling() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.refuse_streams = true;
        s.products_failure = Some(Failure::status(StatusCode::SERVICE_UNAVAILABLE, "busy"));
    });
    let storefront = backend.storefront();

    let (stop, handle) = spawn_channel(storefront.realtime(false));
    eventually("polled", || backend.with_state(|s| s.product_requests >= 1)).await;
    backend.with_state(|s| {
        s.products_failure = None;
        s.products = vec![product_json("p1", 500, 5)];
    });
    eventually("recovered", || storefront.catalog().get("p1").is_some()).await;

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_stalled_stream_triggers_refetch() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| {
        s.silent_streams = true;
        s.products = vec![product_json("p1", 500, 5)];
    });
    let mut config = backend.config();
    config.realtime.stall_timeout = Duration::from_millis(200);
    let storefront = Storefront::with_storage(config, PersistentStore::in_memory());
    let channel = storefront.realtime(false);
    let state = channel.state();

    let (stop, handle) = spawn_channel(channel);
    eventually("stall refetch", || storefront.catalog().get("p1").is_some()).await;

    // Still on the first connection
    assert_eq!(*state.borrow(), ChannelState::Connected);
    assert_eq!(backend.with_state(|s| s.stream_sessions.len()), 1);

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_admin_session_follows_dashboard_events() {
    let backend = FakeBackend::start().await;
    backend.with_state(|s| s.kpis = json!({"orders": 1}));
    let storefront = backend.storefront();

    let (stop, handle) = spawn_channel(storefront.realtime(true));
    eventually("join", || backend.with_state(|s| s.joins.len() == 1)).await;
    assert_eq!(backend.with_state(|s| s.joins[0]["admin"].clone()), json!(true));

    backend.push(
        "order-changed",
        &json!({"action": "created", "order": {"_id": "o1", "total": "1357"}}),
    );
    backend.push(
        "customer-changed",
        &json!({"action": "created", "customer": {"_id": "c1", "name": "Asha"}}),
    );
    eventually("order", || storefront.admin().orders().len() == 1).await;
    eventually("customer", || storefront.admin().customers().len() == 1).await;

    backend.push(
        "order-changed",
        &json!({"action": "updated", "order": {"_id": "o1", "status": "shipped"}}),
    );
    eventually("order status", || {
        storefront.admin().orders()[0].get("status") == Some(&json!("shipped"))
    })
    .await;
    assert_eq!(storefront.admin().orders()[0].get("total"), Some(&json!("1357")));

    backend.push("kpi-changed", &json!({}));
    eventually("kpis", || storefront.admin().kpis() == Some(json!({"orders": 1}))).await;

    stop.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_cart_events_sync_other_sessions() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    let (stop, handle) = spawn_channel(storefront.realtime(false));
    eventually("join", || backend.with_state(|s| s.joins.len() == 1)).await;

    backend.push(
        "cart-changed",
        &json!({"action": "created", "item": {"id": "p1", "productId": "p1", "name": "Kurta", "price": "500", "quantity": 2}}),
    );
    eventually("cart line", || storefront.cart().quantity_of("p1") == 2).await;

    backend.push("cart-changed", &json!({"action": "deleted", "itemId": "p1"}));
    eventually("cart cleared", || storefront.cart().is_empty()).await;

    stop.send(()).unwrap();
    handle.await.unwrap();
}
