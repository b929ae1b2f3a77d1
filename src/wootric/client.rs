use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::auth;
use crate::config::Config;

pub const DEFAULT_BASE_URL: &str = "https://api.wootric.com";

#[derive(Debug, Clone)]
pub struct WootricClientConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl WootricClientConfig {
    pub fn from_tap_config(config: &Config) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WootricClientError {
    #[error("HTTP {status}: {body}")]
    HttpError { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("access token retrieval failed: {0}")]
    AccessToken(String),

    #[error("client is not authenticated")]
    NotAuthenticated,
}

/// One page of listing results. `Exhausted` maps the API's "invalid page"
/// 400 response, which is its only signal that a page number ran past the
/// end of the data.
#[derive(Debug)]
pub enum Page {
    Rows(Vec<Value>),
    Exhausted,
}

pub struct WootricClient {
    http: Client,
    config: WootricClientConfig,
    access_token: Option<String>,
}

impl WootricClient {
    pub fn new(config: WootricClientConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            access_token: None,
        })
    }

    /// Acquire a bearer token via the client-credentials grant.
    pub async fn authenticate(&mut self) -> Result<(), WootricClientError> {
        let token = auth::request_access_token(
            &self.http,
            &self.config.base_url,
            &self.config.client_id,
            &self.config.client_secret,
        )
        .await?;
        self.access_token = Some(token);
        Ok(())
    }

    /// Fetch one listing page, retrying transient failures with exponential
    /// backoff. 5xx and 429 are retried; other 4xx fail fast, except the
    /// benign invalid-page 400 which is returned as `Page::Exhausted`.
    pub async fn fetch_page(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Page, WootricClientError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(WootricClientError::NotAuthenticated)?;
        let url = format!("{}{}", self.config.base_url, path);

        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff_secs = std::cmp::min(1u64 << attempt, 30);
                tracing::warn!(attempt, backoff_secs, "retrying after backoff");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            }

            let mut builder = self.http.get(&url).query(query).bearer_auth(token);
            if let Some(ua) = &self.config.user_agent {
                builder = builder.header(reqwest::header::USER_AGENT, ua);
            }
            let request = builder.build()?;
            tracing::info!(url = %request.url(), "GET");

            let response = match self.http.execute(request).await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Err(WootricClientError::RequestError(e));
                }
            };

            let status = response.status();

            if status.is_success() {
                log_rate_limit_headers(&response);
                let rows = response
                    .json::<Vec<Value>>()
                    .await
                    .map_err(WootricClientError::RequestError)?;
                return Ok(Page::Rows(rows));
            }

            // Honor Retry-After header for 429
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(retry_after) = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    let wait = std::cmp::min(retry_after, 60);
                    tracing::warn!(wait, "rate-limited, waiting Retry-After");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                last_error = "429 Too Many Requests".to_string();
                continue;
            }

            // Retry on 5xx
            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                continue;
            }

            let body = response.text().await.unwrap_or_default();

            // The API has no explicit last-page signal; a page number past
            // the available data comes back as this 400 instead.
            if status == StatusCode::BAD_REQUEST && is_invalid_page_error(&body) {
                tracing::debug!(url = %url, "page past end of results");
                return Ok(Page::Exhausted);
            }

            // Fail fast on remaining 4xx
            tracing::error!(url = %url, status = %status, body = %body, "request failed");
            return Err(WootricClientError::HttpError { status, body });
        }

        Err(WootricClientError::MaxRetriesExceeded {
            attempts: self.config.max_retries + 1,
            last_error,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }
}

fn is_invalid_page_error(body: &str) -> bool {
    body.to_ascii_lowercase().contains("invalid page")
}

fn log_rate_limit_headers(response: &reqwest::Response) {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    tracing::info!(
        limit = %header("X-Rate-Limit-Limit"),
        remaining = %header("X-Rate-Limit-Remaining"),
        "rate limit"
    );
}

#[cfg(test)]
pub(crate) fn test_client_config(base_url: &str) -> WootricClientConfig {
    WootricClientConfig {
        base_url: base_url.to_string(),
        client_id: "test-id".to_string(),
        client_secret: "test-secret".to_string(),
        user_agent: Some("tap-wootric tests".to_string()),
        max_retries: 2,
        timeout_secs: 5,
    }
}
