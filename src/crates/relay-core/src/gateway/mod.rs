//! The rate-limited upstream gateway (§4.1): the only component in this
//! crate that knows a concrete HTTP client exists. Every call consumes one
//! token from the shared reservoir before it is allowed onto the wire;
//! transient failures (429, 5xx, connection errors) are retried with
//! exponential backoff, permanent failures (4xx other than 429) propagate
//! unchanged.

pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use error::GatewayError;
pub use rate_limit::RateLimiter;
pub use retry::RetryConfig;
pub use types::{Page, PropertyBag, PropertyPage, PropertyValue, QueryFilter, QueryPage, RollupType};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

/// The subset of upstream operations this service needs (§4.1, §6). A
/// trait rather than a concrete struct so tests can substitute a fake
/// in-process upstream (SPEC_FULL.md §1.1).
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    async fn query_database(
        &self,
        db_id: &str,
        cursor: Option<&str>,
        page_size: u32,
        filter: Option<&QueryFilter>,
    ) -> Result<QueryPage, GatewayError>;

    async fn retrieve_page(&self, id: &str) -> Result<Page, GatewayError>;

    async fn retrieve_property(
        &self,
        page_id: &str,
        property_id: &str,
        cursor: Option<&str>,
    ) -> Result<PropertyPage, GatewayError>;

    async fn update_page(
        &self,
        id: &str,
        properties: &Value,
    ) -> Result<Page, GatewayError>;

    async fn create_page(
        &self,
        parent_db_id: &str,
        properties: &Value,
    ) -> Result<Page, GatewayError>;

    async fn archive_page(&self, id: &str) -> Result<Page, GatewayError>;
}

/// `reqwest`-backed implementation, the only place an HTTP client is
/// constructed.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
    limiter: RateLimiter,
    retry: RetryConfig,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, reservoir: u64, refill_per_sec: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with a static config");
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
            limiter: RateLimiter::new(reservoir, refill_per_sec),
            retry: RetryConfig::default(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<T, GatewayError> {
        retry::retry_with_backoff(&self.retry, operation, || async {
            self.limiter.acquire().await;
            let resp = build()
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(GatewayError::Transport)?;
            classify_status(resp.status().as_u16(), operation)?;
            resp.json::<T>()
                .await
                .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
        })
        .await
    }
}

fn classify_status(status: u16, operation: &str) -> Result<(), GatewayError> {
    match status {
        200..=299 => Ok(()),
        401 => Err(GatewayError::Unauthorized(format!("{operation}: 401"))),
        404 => Err(GatewayError::NotFound(format!("{operation}: 404"))),
        400 | 409 => Err(GatewayError::BadRequest(format!("{operation}: {status}"))),
        429 => Err(GatewayError::RateLimited(format!("{operation}: 429"))),
        500..=599 => Err(GatewayError::Unavailable(format!("{operation}: {status}"))),
        other => Err(GatewayError::BadRequest(format!("{operation}: unexpected status {other}"))),
    }
}

#[async_trait]
impl UpstreamGateway for HttpGateway {
    #[instrument(skip(self, filter))]
    async fn query_database(
        &self,
        db_id: &str,
        cursor: Option<&str>,
        page_size: u32,
        filter: Option<&QueryFilter>,
    ) -> Result<QueryPage, GatewayError> {
        let url = self.url(&format!("/v1/databases/{db_id}/query"));
        let mut body = serde_json::json!({ "page_size": page_size.min(100) });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor.to_string());
        }
        if let Some(filter) = filter {
            body["filter"] = Value::Object(filter.clone());
        }

        #[derive(serde::Deserialize)]
        struct Raw {
            results: Vec<Page>,
            next_cursor: Option<String>,
            has_more: bool,
        }
        let raw: Raw = self
            .send_json(|| self.client.post(&url).json(&body), "query_database")
            .await?;
        Ok(QueryPage {
            pages: raw.results,
            next_cursor: raw.next_cursor,
            has_more: raw.has_more,
        })
    }

    #[instrument(skip(self))]
    async fn retrieve_page(&self, id: &str) -> Result<Page, GatewayError> {
        let url = self.url(&format!("/v1/pages/{id}"));
        self.send_json(|| self.client.get(&url), "retrieve_page").await
    }

    #[instrument(skip(self))]
    async fn retrieve_property(
        &self,
        page_id: &str,
        property_id: &str,
        cursor: Option<&str>,
    ) -> Result<PropertyPage, GatewayError> {
        let mut url = self.url(&format!("/v1/pages/{page_id}/properties/{property_id}"));
        if let Some(cursor) = cursor {
            url = format!("{url}?start_cursor={cursor}");
        }

        #[derive(serde::Deserialize)]
        struct Raw {
            value: PropertyValue,
            next_cursor: Option<String>,
            has_more: bool,
        }
        let raw: Raw = self
            .send_json(|| self.client.get(&url), "retrieve_property")
            .await?;
        Ok(PropertyPage {
            value: raw.value,
            next_cursor: raw.next_cursor,
            has_more: raw.has_more,
        })
    }

    #[instrument(skip(self, properties))]
    async fn update_page(&self, id: &str, properties: &Value) -> Result<Page, GatewayError> {
        let url = self.url(&format!("/v1/pages/{id}"));
        let body = serde_json::json!({ "properties": properties });
        self.send_json(|| self.client.patch(&url).json(&body), "update_page")
            .await
    }

    #[instrument(skip(self, properties))]
    async fn create_page(&self, parent_db_id: &str, properties: &Value) -> Result<Page, GatewayError> {
        let url = self.url("/v1/pages");
        let body = serde_json::json!({
            "parent": { "database_id": parent_db_id },
            "properties": properties,
        });
        self.send_json(|| self.client.post(&url).json(&body), "create_page")
            .await
    }

    #[instrument(skip(self))]
    async fn archive_page(&self, id: &str) -> Result<Page, GatewayError> {
        let url = self.url(&format!("/v1/pages/{id}"));
        let body = serde_json::json!({ "archived": true });
        self.send_json(|| self.client.patch(&url).json(&body), "archive_page")
            .await
    }
}
