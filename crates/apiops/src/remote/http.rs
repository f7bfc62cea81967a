//! `reqwest`-backed implementation of [`RemoteService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, Method, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{RemoteError, Result};
use super::RemoteService;

/// Maximum number of retries for transient errors.
const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff (in seconds).
const RETRY_BASE_DELAY_SECS: u64 = 2;
/// Delay between polls of a long-running operation.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The paged listing envelope returned by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(default)]
    next_link: Option<String>,
}

/// HTTP client for one API Management service instance.
pub struct HttpRemote {
    client: Client,
    service_url: Url,
    api_version: String,
    token: SecretString,
}

impl HttpRemote {
    /// Creates a client for the service at `service_url`, e.g.
    /// `https://management.azure.com/subscriptions/../service/my-apim`.
    pub fn new(service_url: &str, api_version: impl Into<String>, token: SecretString) -> Result<Self> {
        let service_url = Url::parse(service_url.trim_end_matches('/'))
            .map_err(|_| RemoteError::InvalidUrl(service_url.to_string()))?;
        if service_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(service_url.to_string()));
        }

        Ok(Self {
            client: Client::new(),
            service_url,
            api_version: api_version.into(),
            token,
        })
    }

    /// Builds the absolute URL of a service-relative path.
    pub fn url(&self, path: &str) -> Result<Url> {
        let mut url = self.service_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.service_url.to_string()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Sends a request, retrying transient failures with exponential backoff.
    async fn send(
        &self,
        method: Method,
        label: &'static str,
        url: Url,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(self.token.expose_secret());
            if let Some(body) = body {
                request = request.json(body);
            }

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status != StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                        return Ok(response);
                    }
                    let text = response.text().await.unwrap_or_default();
                    RemoteError::status(label, path, status.as_u16(), &text)
                }
                Err(source) => RemoteError::Transport {
                    method: label,
                    path: path.to_string(),
                    source,
                },
            };

            if !error.is_retryable() || attempt >= MAX_RETRIES {
                return Err(error);
            }
            attempt += 1;
            let delay = RETRY_BASE_DELAY_SECS * (1 << (attempt - 1)); // 2s, 4s, 8s
            warn!(
                "{} {} failed ({}), retrying (attempt {}/{}) after {}s",
                label,
                path,
                error,
                attempt + 1,
                MAX_RETRIES + 1,
                delay
            );
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
    }

    async fn expect_success(label: &'static str, path: &str, response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            Err(RemoteError::status(label, path, status, &text))
        }
    }

    async fn decode(label: &'static str, path: &str, response: Response) -> Result<Value> {
        response.json().await.map_err(|e| RemoteError::Decode {
            method: label,
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Polls a long-running operation until it leaves the accepted state.
    async fn wait_for_completion(&self, path: &str, mut response: Response) -> Result<()> {
        while response.status() == StatusCode::ACCEPTED {
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Url::parse(value).ok())
            else {
                return Ok(());
            };
            debug!("Waiting for long-running operation on {}", path);
            tokio::time::sleep(POLL_INTERVAL).await;
            response = self.send(Method::GET, "GET", location, path, None).await?;
            response = Self::expect_success("GET", path, response).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let response = self
            .send(Method::GET, "GET", self.url(path)?, path, None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::expect_success("GET", path, response).await?;
        Self::decode("GET", path, response).await.map(Some)
    }

    async fn list(&self, path: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path)?);

        while let Some(url) = next.take() {
            let response = self.send(Method::GET, "GET", url, path, None).await?;
            if response.status() == StatusCode::NOT_FOUND {
                break;
            }
            let response = Self::expect_success("GET", path, response).await?;
            let page: Page = serde_json::from_value(Self::decode("GET", path, response).await?)
                .map_err(|e| RemoteError::Decode {
                    method: "GET",
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            items.extend(page.value);
            next = page
                .next_link
                .filter(|link| !link.is_empty())
                .map(|link| Url::parse(&link).map_err(|_| RemoteError::InvalidUrl(link)))
                .transpose()?;
        }

        Ok(items)
    }

    async fn put(&self, path: &str, body: &Value) -> Result<()> {
        let response = self
            .send(Method::PUT, "PUT", self.url(path)?, path, Some(body))
            .await?;
        let response = Self::expect_success("PUT", path, response).await?;
        self.wait_for_completion(path, response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self
            .send(Method::DELETE, "DELETE", self.url(path)?, path, None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let response = Self::expect_success("DELETE", path, response).await?;
        self.wait_for_completion(path, response).await
    }
}
