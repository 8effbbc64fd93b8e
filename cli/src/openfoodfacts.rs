use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use fitplat_core::error::RemoteError;
use fitplat_core::models::RemoteFood;
use fitplat_core::openfoodfacts::{ProductResponse, SearchResponse, product_to_remote};
use fitplat_core::service::FoodLookupProvider;

pub const DEFAULT_BASE_URL: &str = "https://world.openfoodfacts.net";
pub const DEFAULT_SEARCH_URL: &str = "https://search.openfoodfacts.org";
const STAGING_HOST: &str = "openfoodfacts.net";
const MAX_SEARCH_SIZE: usize = 20;
const SEARCH_FIELDS: &str = "code,product_name,brands,nutriments";

#[derive(Debug, Clone)]
pub struct OffSettings {
    pub base_url: String,
    pub search_url: String,
    pub user: String,
    pub password: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for OffSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user: "off".to_string(),
            password: "off".to_string(),
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub fn default_user_agent() -> String {
    format!(
        "fitplat/{} (fitness tracker nutrition service)",
        env!("CARGO_PKG_VERSION")
    )
}

pub struct OpenFoodFactsClient {
    client: reqwest::Client,
    settings: OffSettings,
    rt: tokio::runtime::Handle,
}

// The staging host sits behind HTTP basic auth.
fn needs_basic_auth(url: &str) -> bool {
    url.contains(STAGING_HOST)
}

fn status_error(status: StatusCode) -> RemoteError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        RemoteError::RateLimited
    } else {
        RemoteError::Unavailable(status.as_u16())
    }
}

fn transport_error(err: &reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Network(err.to_string())
    }
}

impl OpenFoodFactsClient {
    /// Must be called from inside a tokio runtime.
    pub fn new(settings: OffSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            settings,
            rt: tokio::runtime::Handle::current(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Option<T>, RemoteError> {
        let request = if needs_basic_auth(url) {
            request.basic_auth(&self.settings.user, Some(&self.settings.password))
        } else {
            request
        };
        let resp = request.send().await.map_err(|e| transport_error(&e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status));
        }

        let body = resp.bytes().await.map_err(|e| transport_error(&e))?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    pub async fn search_async(&self, query: &str, limit: usize) -> Result<Vec<RemoteFood>, RemoteError> {
        let url = format!("{}/search", self.settings.search_url.trim_end_matches('/'));
        let size = limit.clamp(1, MAX_SEARCH_SIZE).to_string();
        let request = self.client.get(&url).query(&[
            ("q", query),
            ("size", size.as_str()),
            ("fields", SEARCH_FIELDS),
            ("sort_by", "-unique_scans_n"),
        ]);

        let data: SearchResponse = self
            .get_json(request, &url)
            .await?
            .ok_or(RemoteError::Unavailable(StatusCode::NOT_FOUND.as_u16()))?;

        Ok(data.hits.into_iter().filter_map(product_to_remote).collect())
    }

    pub async fn lookup_barcode_async(&self, barcode: &str) -> Result<Option<RemoteFood>, RemoteError> {
        let url = format!(
            "{}/api/v2/product/{barcode}.json",
            self.settings.base_url.trim_end_matches('/')
        );
        let request = self.client.get(&url);

        let Some(data) = self.get_json::<ProductResponse>(request, &url).await? else {
            return Ok(None);
        };
        if data.status != 1 {
            return Ok(None);
        }

        Ok(data.product.and_then(product_to_remote))
    }
}

impl FoodLookupProvider for OpenFoodFactsClient {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<RemoteFood>, RemoteError> {
        tracing::debug!(query, limit, "OpenFoodFacts search");
        self.rt.block_on(self.search_async(query, limit))
    }

    fn lookup_barcode(&self, barcode: &str) -> Result<Option<RemoteFood>, RemoteError> {
        tracing::debug!(barcode, "OpenFoodFacts product lookup");
        self.rt.block_on(self.lookup_barcode_async(barcode))
    }
}
