//! Integration tests for Shopfront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```
//!
//! Every test starts its own [`FakeBackend`]: an in-process axum server that
//! speaks the store API (products, banners, shipping methods, orders, admin
//! reads) and the real-time event stream. Tests script its responses through
//! [`FakeBackend::with_state`] and push events with [`FakeBackend::push`].

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use shopfront_state::{PersistentStore, RealtimeChannel, RealtimeConfig, StateConfig, Storefront};
use tokio::sync::{broadcast, oneshot};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use url::Url;

/// A scripted failure for one endpoint.
#[derive(Debug, Clone)]
pub struct Failure {
    pub status: StatusCode,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl Failure {
    /// A failure with a plain-text body.
    #[must_use]
    pub fn status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: Vec::new(),
        }
    }

    /// A failure with an `{error}` JSON body.
    #[must_use]
    pub fn rejected(status: StatusCode, message: &str) -> Self {
        Self::status(status, &json!({ "error": message }).to_string())
    }

    /// A 429 with a `Retry-After` header.
    #[must_use]
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
            headers: vec![("Retry-After", retry_after.to_string())],
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            if let Ok(value) = value.parse() {
                headers.insert(name, value);
            }
        }
        (self.status, headers, self.body).into_response()
    }
}

/// Everything the fake backend serves and records.
#[derive(Debug, Default)]
pub struct BackendState {
    pub products: Vec<Value>,
    pub banners: HashMap<String, Value>,
    pub shipping_methods: Vec<Value>,
    pub orders: Vec<Value>,
    pub customers: Vec<Value>,
    pub kpis: Value,

    /// Served instead of the product listing while set.
    pub products_failure: Option<Failure>,
    /// Served instead of applying banner edits while set.
    pub banner_failure: Option<Failure>,
    /// Served instead of accepting orders while set.
    pub order_failure: Option<Failure>,
    /// Refuse event stream connections while set.
    pub refuse_streams: bool,
    /// Send no keep-alive comments on new event streams while set.
    pub silent_streams: bool,

    /// Number of product listing requests received.
    pub product_requests: usize,
    /// Banner edit bodies received, in order.
    pub banner_edits: Vec<Value>,
    /// Order bodies received, in order.
    pub placed_orders: Vec<Value>,
    /// Session ids of event stream connections, in order.
    pub stream_sessions: Vec<String>,
    /// Join bodies received, in order.
    pub joins: Vec<Value>,
}

#[derive(Debug, Clone)]
enum Push {
    Event { name: String, data: String },
    Close,
}

#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<BackendState>>,
    push: broadcast::Sender<Push>,
}

impl Shared {
    fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// An in-process store backend bound to a random local port.
pub struct FakeBackend {
    url: Url,
    shared: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    #[allow(clippy::unwrap_used)]
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let shared = Shared {
            state: Arc::new(Mutex::new(BackendState::default())),
            push,
        };

        let app = Router::new()
            .route("/api/products", get(products))
            .route("/api/products/{slug}", get(product))
            .route("/api/admin/products/{id}", patch(update_product))
            .route("/api/banners/{kind}", get(banner).patch(update_banner))
            .route("/api/shipping-methods", get(shipping_methods))
            .route("/api/orders", post(place_order))
            .route("/api/admin/orders", get(orders))
            .route("/api/admin/customers", get(customers))
            .route("/api/admin/kpis", get(kpis))
            .route("/api/realtime", get(stream))
            .route("/api/realtime/join", post(join))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            shared,
            server,
        }
    }

    /// Base URL of the backend.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Read or script the backend state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        self.shared.with(f)
    }

    /// Push a named event to every open event stream.
    pub fn push(&self, name: &str, data: &Value) {
        let _ = self.shared.push.send(Push::Event {
            name: name.to_string(),
            data: data.to_string(),
        });
    }

    /// End every open event stream.
    pub fn drop_streams(&self) {
        let _ = self.shared.push.send(Push::Close);
    }

    /// A client configuration pointing at this backend with fast reconnects.
    #[must_use]
    pub fn config(&self) -> StateConfig {
        let mut config = StateConfig::with_api_url(self.url.clone());
        config.realtime = fast_realtime();
        config
    }

    /// A storefront session against this backend with in-memory persistence.
    #[must_use]
    pub fn storefront(&self) -> Storefront {
        Storefront::with_storage(self.config(), PersistentStore::in_memory())
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Channel timing short enough for tests.
#[must_use]
pub const fn fast_realtime() -> RealtimeConfig {
    RealtimeConfig {
        max_reconnect_attempts: 3,
        reconnect_delay: Duration::from_millis(10),
        max_reconnect_delay: Duration::from_millis(50),
        poll_interval: Duration::from_millis(50),
        stall_timeout: Duration::from_secs(5),
    }
}

/// Run `channel` in the background until the returned sender fires or drops.
#[must_use]
pub fn spawn_channel(channel: RealtimeChannel) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        channel
            .run(async {
                let _ = stopped.await;
            })
            .await;
    });
    (stop, handle)
}

/// Poll `condition` every 10ms until it holds.
///
/// # Panics
///
/// Panics if it does not hold within five seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A product document as the listing returns it.
#[must_use]
pub fn product_json(id: &str, price: u32, stock: i64) -> Value {
    json!({
        "_id": id,
        "title": format!("Product {id}"),
        "slug": id,
        "price": price,
        "stock": stock,
        "salesCount": 0,
        "inStock": stock > 0,
    })
}

// =============================================================================
// Handlers
// =============================================================================

async fn products(State(shared): State<Shared>) -> Response {
    shared.with(|state| {
        state.product_requests += 1;
        match &state.products_failure {
            Some(failure) => failure.clone().into_response(),
            None => Json(json!({ "products": state.products })).into_response(),
        }
    })
}

async fn product(State(shared): State<Shared>, Path(slug): Path<String>) -> Response {
    shared.with(|state| {
        state
            .products
            .iter()
            .find(|p| p["slug"] == slug.as_str())
            .map_or_else(
                || Failure::status(StatusCode::NOT_FOUND, "not found").into_response(),
                |p| Json(json!({ "product": p })).into_response(),
            )
    })
}

async fn update_product(
    State(shared): State<Shared>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Response {
    shared.with(|state| {
        let Some(product) = state.products.iter_mut().find(|p| p["_id"] == id.as_str()) else {
            return Failure::rejected(StatusCode::NOT_FOUND, "Product not found").into_response();
        };
        if let (Some(product), Some(patch)) = (product.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                product.insert(key.clone(), value.clone());
            }
        }
        Json(json!({ "product": product })).into_response()
    })
}

async fn banner(State(shared): State<Shared>, Path(kind): Path<String>) -> Json<Value> {
    shared.with(|state| Json(json!({ "banner": state.banners.get(&kind) })))
}

async fn update_banner(
    State(shared): State<Shared>,
    Path(kind): Path<String>,
    Json(edit): Json<Value>,
) -> Response {
    shared.with(|state| {
        state.banner_edits.push(edit.clone());
        if let Some(failure) = &state.banner_failure {
            return failure.clone().into_response();
        }
        let banner = state.banners.entry(kind).or_insert_with(|| json!({}));
        banner["isActive"] = edit["visible"].clone();
        Json(json!({ "banner": banner })).into_response()
    })
}

async fn shipping_methods(State(shared): State<Shared>) -> Json<Value> {
    shared.with(|state| Json(json!({ "methods": state.shipping_methods })))
}

async fn place_order(State(shared): State<Shared>, Json(order): Json<Value>) -> Response {
    shared.with(|state| {
        state.placed_orders.push(order.clone());
        if let Some(failure) = &state.order_failure {
            return failure.clone().into_response();
        }
        let number = state.placed_orders.len();
        Json(json!({
            "orderId": format!("order-{number}"),
            "paymentOrderId": format!("pay_{number}"),
            "amount": order["quote"]["total"],
        }))
        .into_response()
    })
}

async fn orders(State(shared): State<Shared>) -> Json<Value> {
    shared.with(|state| Json(json!({ "orders": state.orders })))
}

async fn customers(State(shared): State<Shared>) -> Json<Value> {
    shared.with(|state| Json(json!({ "customers": state.customers })))
}

async fn kpis(State(shared): State<Shared>) -> Json<Value> {
    shared.with(|state| Json(json!({ "kpis": state.kpis })))
}

async fn join(State(shared): State<Shared>, Json(interest): Json<Value>) -> StatusCode {
    shared.with(|state| state.joins.push(interest));
    StatusCode::NO_CONTENT
}

async fn stream(
    State(shared): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let (refused, silent) = shared.with(|state| {
        state
            .stream_sessions
            .push(query.get("sessionId").cloned().unwrap_or_default());
        (state.refuse_streams, state.silent_streams)
    });
    if refused {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let events = futures::stream::unfold(shared.push.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(Push::Event { name, data }) => {
                    return Some((Ok::<_, Infallible>(Event::default().event(name).data(data)), rx));
                }
                Ok(Push::Close) | Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(_)) => {}
            }
        }
    });
    if silent {
        return Sse::new(events).into_response();
    }
    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_millis(100)))
        .into_response()
}
