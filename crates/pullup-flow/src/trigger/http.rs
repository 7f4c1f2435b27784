//! HTTP client for the scrape trigger endpoint.
//!
//! ```text
//! POST {base}/api/scrape/
//! {"companies": ["Apple", "Google"]}
//! ```
//!
//! ## Status Mapping
//!
//! | Response | Outcome |
//! |----------|---------|
//! | 200, 201, 202 | accepted; entities from `companies` |
//! | 207 | accepted; entities from `successful_companies`, failures logged |
//! | any other status | rejected with the body's `error`, else the fallback message |
//! | transport error or timeout | `TriggerFailure` with the fallback message |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use pullup_core::EntitySet;

use super::{Acknowledgement, ScrapeTrigger};
use crate::error::{Error, Result, TRIGGER_FALLBACK_MESSAGE};

/// Path of the scrape endpoint, relative to the service base URL.
pub const SCRAPE_PATH: &str = "/api/scrape/";

/// Default trigger service base URL.
pub const DEFAULT_TRIGGER_URL: &str = "http://localhost:8000";

/// Connection settings for [`HttpScrapeTrigger`].
#[derive(Debug, Clone)]
pub struct HttpTriggerConfig {
    /// Service base URL.
    pub base_url: String,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl Default for HttpTriggerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_URL)
    }
}

impl HttpTriggerConfig {
    /// Creates a config for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Scrape trigger backed by the HTTP scrape endpoint.
#[derive(Debug, Clone)]
pub struct HttpScrapeTrigger {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    companies: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScrapeResponse {
    message: Option<String>,
    error: Option<String>,
    companies: Option<Vec<String>>,
    successful_companies: Option<Vec<String>>,
    failed_companies: Vec<FailedCompany>,
}

#[derive(Debug, Deserialize)]
struct FailedCompany {
    company: String,
    #[serde(default)]
    error: Option<String>,
}

impl HttpScrapeTrigger {
    /// Creates a trigger client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: HttpTriggerConfig) -> Result<Self> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::configuration("trigger service URL is required"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{base}{SCRAPE_PATH}"),
        })
    }

    /// Returns the endpoint this trigger posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn is_accepted(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201 | 202 | 207)
}

/// Decodes the service reply. An unreadable or non-JSON body decodes as an
/// empty reply.
fn decode_reply<E: std::fmt::Display>(
    status: StatusCode,
    body: std::result::Result<String, E>,
) -> ScrapeResponse {
    match body {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(error) => {
            tracing::warn!(%status, %error, "failed to read scrape trigger response body");
            ScrapeResponse::default()
        }
    }
}

#[async_trait]
impl ScrapeTrigger for HttpScrapeTrigger {
    async fn start_scrape(&self, entities: &EntitySet) -> Result<Acknowledgement> {
        let companies = entities.names();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ScrapeRequest {
                companies: &companies,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, endpoint = %self.endpoint, "scrape trigger unreachable");
                Error::trigger(TRIGGER_FALLBACK_MESSAGE)
            })?;

        let status = response.status();
        let parsed = decode_reply(status, response.text().await);

        if !is_accepted(status) {
            tracing::warn!(%status, error = ?parsed.error, "scrape trigger rejected request");
            return Ok(Acknowledgement::rejected(parsed.error));
        }

        for failed in &parsed.failed_companies {
            tracing::warn!(
                company = %failed.company,
                error = failed.error.as_deref().unwrap_or("unknown"),
                "scrape not started for company"
            );
        }

        let accepted = parsed
            .successful_companies
            .or(parsed.companies)
            .unwrap_or_default();
        tracing::info!(%status, accepted = accepted.len(), "scrape trigger accepted request");
        Ok(Acknowledgement::accepted(accepted, parsed.message))
    }
}
