//! Store API client.
//!
//! Uses `reqwest` 0.13 for HTTP with JSON bodies.
//! Caches product and shipping-method reads using `moka` (5-minute TTL).
//!
//! Each concern is a trait ([`ProductApi`], [`BannerApi`], [`OrderApi`],
//! [`AdminApi`]) so stores and tests can depend on exactly what they call.

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shopfront_core::{
    Banner, BannerKind, CatalogPatch, ProductDocument, ProductId, Record, ShippingMethod,
};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::StateConfig;
use crate::realtime::{Interest, Refetch, RefetchBatch};

use cache::{CacheKey, CacheValue};
pub use types::{BannerUpdate, OrderConfirmation, OrderRequest, ShippingAddress};
use types::{
    BannerBody, CustomersBody, ErrorBody, KpisBody, OrdersBody, ProductBody, ProductsBody,
    ShippingMethodsBody,
};

/// Errors that can occur when talking to the store API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without an error body.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The server refused the request and said why (`{error}` body).
    #[error("{0}")]
    Rejected(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

// =============================================================================
// Traits
// =============================================================================

/// Product reads and admin product edits.
#[async_trait]
pub trait ProductApi: Send + Sync {
    /// All listed products.
    async fn products(&self) -> Result<Vec<ProductDocument>, ApiError>;

    /// A product by slug, `None` if it does not exist.
    async fn product(&self, slug: &str) -> Result<Option<ProductDocument>, ApiError>;

    /// Apply an admin edit and return the canonical product.
    async fn update_product(
        &self,
        id: &ProductId,
        patch: &CatalogPatch,
    ) -> Result<ProductDocument, ApiError>;
}

/// Banner reads and visibility edits.
#[async_trait]
pub trait BannerApi: Send + Sync {
    /// The current banner of `kind`, `None` if none is configured.
    async fn banner(&self, kind: BannerKind) -> Result<Option<Banner>, ApiError>;

    /// Update a banner and return the canonical representation.
    async fn update_banner(&self, kind: BannerKind, update: &BannerUpdate)
    -> Result<Banner, ApiError>;
}

/// Checkout endpoints.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Shipping methods offered at checkout.
    async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, ApiError>;

    /// Place an order.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderConfirmation, ApiError>;
}

/// Admin dashboard reads.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// All orders.
    async fn orders(&self) -> Result<Vec<Record>, ApiError>;

    /// All customers.
    async fn customers(&self) -> Result<Vec<Record>, ApiError>;

    /// Latest KPI payload.
    async fn kpis(&self) -> Result<Value, ApiError>;
}

// =============================================================================
// StoreApiClient
// =============================================================================

/// Client for the store's HTTP API.
///
/// Products and shipping methods are cached for 5 minutes; admin edits
/// invalidate the product entries they touch.
#[derive(Clone)]
pub struct StoreApiClient {
    inner: Arc<StoreApiClientInner>,
}

struct StoreApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for StoreApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl StoreApiClient {
    /// Create a new API client.
    #[must_use]
    pub fn new(config: &StateConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .support_invalidation_closures()
            .build();

        Self {
            inner: Arc::new(StoreApiClientInner {
                client: reqwest::Client::new(),
                base_url: config.api_url.clone(),
                api_token: config.api_token.clone(),
                cache,
            }),
        }
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The shared HTTP client.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.client
    }

    /// Resolve an API path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Url` if the path does not form a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Build a request with authentication attached.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Url` if the path does not form a valid URL.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        Ok(self.request_url(method, self.endpoint(path)?))
    }

    /// Build a request for an absolute URL with authentication attached.
    #[must_use]
    pub fn request_url(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self
            .inner
            .client
            .request(method, url)
            .header("Accept", "application/json");
        match &self.inner.api_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Send a request and decode its JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Store API returned non-success status"
            );
            if let Ok(body) = serde_json::from_str::<ErrorBody>(&response_text) {
                return Err(ApiError::Rejected(body.error));
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        // Some endpoints answer 2xx with an error body
        if let Ok(body) = serde_json::from_str::<ErrorBody>(&response_text) {
            return Err(ApiError::Rejected(body.error));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse store API response"
            );
            ApiError::Parse(e)
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.request(Method::GET, path)?).await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(self.request(method, path)?.json(body)).await
    }

    /// Drop cached product reads.
    pub async fn invalidate_products(&self) {
        self.inner.cache.invalidate(&CacheKey::Products).await;
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(|key, _| matches!(key, CacheKey::Product(_)))
        {
            tracing::warn!(error = %e, "Failed to invalidate product cache");
        }
    }
}

#[async_trait]
impl ProductApi for StoreApiClient {
    #[instrument(skip(self))]
    async fn products(&self) -> Result<Vec<ProductDocument>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&CacheKey::Products).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let body: ProductsBody = self.get("/api/products").await?;

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(body.products.clone()))
            .await;

        Ok(body.products)
    }

    #[instrument(skip(self), fields(slug = %slug))]
    async fn product(&self, slug: &str) -> Result<Option<ProductDocument>, ApiError> {
        let cache_key = CacheKey::Product(slug.to_string());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let body: ProductBody = match self.get(&format!("/api/products/{slug}")).await {
            Ok(body) => body,
            Err(ApiError::Status { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if let Some(product) = &body.product {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }

        Ok(body.product)
    }

    #[instrument(skip(self, patch), fields(product_id = %id))]
    async fn update_product(
        &self,
        id: &ProductId,
        patch: &CatalogPatch,
    ) -> Result<ProductDocument, ApiError> {
        let body: ProductBody = self
            .send_json(Method::PATCH, &format!("/api/admin/products/{id}"), patch)
            .await?;
        self.invalidate_products().await;

        body.product
            .ok_or_else(|| ApiError::Rejected(format!("Product not found: {id}")))
    }
}

#[async_trait]
impl BannerApi for StoreApiClient {
    #[instrument(skip(self), fields(kind = %kind))]
    async fn banner(&self, kind: BannerKind) -> Result<Option<Banner>, ApiError> {
        let body: BannerBody = self.get(&format!("/api/banners/{kind}")).await?;
        Ok(body.banner)
    }

    #[instrument(skip(self, update), fields(kind = %kind, visible = update.visible))]
    async fn update_banner(
        &self,
        kind: BannerKind,
        update: &BannerUpdate,
    ) -> Result<Banner, ApiError> {
        let body: BannerBody = self
            .send_json(Method::PATCH, &format!("/api/banners/{kind}"), update)
            .await?;
        body.banner
            .ok_or_else(|| ApiError::Rejected(format!("No {kind} banner configured")))
    }
}

#[async_trait]
impl OrderApi for StoreApiClient {
    #[instrument(skip(self))]
    async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, ApiError> {
        if let Some(CacheValue::ShippingMethods(methods)) =
            self.inner.cache.get(&CacheKey::ShippingMethods).await
        {
            debug!("Cache hit for shipping methods");
            return Ok(methods);
        }

        let body: ShippingMethodsBody = self.get("/api/shipping-methods").await?;

        self.inner
            .cache
            .insert(
                CacheKey::ShippingMethods,
                CacheValue::ShippingMethods(body.methods.clone()),
            )
            .await;

        Ok(body.methods)
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderConfirmation, ApiError> {
        let confirmation: OrderConfirmation =
            self.send_json(Method::POST, "/api/orders", request).await?;
        // Stock and sales counts changed server-side
        self.invalidate_products().await;
        Ok(confirmation)
    }
}

#[async_trait]
impl AdminApi for StoreApiClient {
    #[instrument(skip(self))]
    async fn orders(&self) -> Result<Vec<Record>, ApiError> {
        let body: OrdersBody = self.get("/api/admin/orders").await?;
        Ok(body.orders)
    }

    #[instrument(skip(self))]
    async fn customers(&self) -> Result<Vec<Record>, ApiError> {
        let body: CustomersBody = self.get("/api/admin/customers").await?;
        Ok(body.customers)
    }

    #[instrument(skip(self))]
    async fn kpis(&self) -> Result<Value, ApiError> {
        let body: KpisBody = self.get("/api/admin/kpis").await?;
        Ok(body.kpis)
    }
}

#[async_trait]
impl Refetch for StoreApiClient {
    #[instrument(skip(self, interest), fields(admin = interest.admin))]
    async fn refetch(&self, interest: &Interest) -> Result<RefetchBatch, ApiError> {
        // Polling must observe fresh data
        self.invalidate_products().await;
        let products = self.products().await?;

        if !interest.admin {
            return Ok(RefetchBatch {
                products,
                ..RefetchBatch::default()
            });
        }

        let (orders, customers, kpis) =
            futures::try_join!(self.orders(), self.customers(), self.kpis())?;
        Ok(RefetchBatch {
            products,
            orders: Some(orders),
            customers: Some(customers),
            kpis: Some(kpis),
        })
    }
}
