use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::models::ErrorResponse;
use crate::error::{Error, Result};

/// Public Azure Resource Manager endpoint.
pub const DEFAULT_API_BASE: &str = "https://management.azure.com";

/// Thin ARM REST client: bearer-token GETs that decode JSON.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct AzureClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    subscription_id: String,
}

impl AzureClient {
    /// `token` is an already-issued ARM access token.
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        subscription_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Config("access token is empty".into()));
        }
        let subscription_id = subscription_id.into();
        if subscription_id.trim().is_empty() {
            return Err(Error::Config("subscription ID is empty".into()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)?;

        Ok(Self {
            http,
            base_url,
            token,
            subscription_id,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Resolve an ARM path against the endpoint and attach query parameters.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Whether `url` points at the configured endpoint (scheme, host and port).
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }

    /// GET `path` and decode the body. `Ok(None)` on 404.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>> {
        let url = self.url(path, query)?;
        self.get_url(url).await
    }

    /// GET an absolute URL (e.g. a `nextLink`) and decode the body. `Ok(None)` on 404.
    pub async fn get_url<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        log::debug!("GET {}", url.path());

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Api(format!(
                "GET {} returned {status}: {}",
                url.path(),
                ErrorResponse::describe(&body)
            )));
        }

        serde_json::from_str(&body).map(Some).map_err(|e| {
            Error::Serialization(format!("decoding response from {}: {e}", url.path()))
        })
    }
}
