//! PostgREST-compatible HTTP record store.
//!
//! Queries a product table through the PostgREST dialect used by Supabase:
//!
//! ```text
//! GET {base}/rest/v1/{table}?select=*&or=(company_name.ilike."Apple",company_name.ilike."Google")
//! apikey: <key>
//! Authorization: Bearer <key>
//! ```
//!
//! `ilike` without wildcards is a case-insensitive equality match.
//!
//! ## Status Mapping
//!
//! | Response | Outcome |
//! |----------|---------|
//! | 2xx with a JSON array | rows (an empty array means "no data yet") |
//! | 2xx with anything else | `StoreFailure` |
//! | any non-2xx, 404 included | `StoreFailure` |
//! | transport error or timeout | `StoreFailure` |
//!
//! Individual rows that fail to decode (for example a rating above 5) are
//! dropped with a warning; the rest of the response is kept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use pullup_core::{EntitySet, Record};

use super::RecordStore;
use crate::error::{Error, Result};

/// Column holding the entity name.
pub const ENTITY_COLUMN: &str = "company_name";

/// Default product table.
pub const DEFAULT_TABLE: &str = "products";

/// Connection settings for [`RestRecordStore`].
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// API key sent as `apikey` and as a bearer token.
    pub api_key: Option<String>,
    /// Table to query.
    pub table: String,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl RestStoreConfig {
    /// Creates a config for `base_url` with the default table and no key.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            table: DEFAULT_TABLE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Record store backed by a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestRecordStore {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
}

impl RestRecordStore {
    /// Creates a store client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL or table is empty or
    /// the HTTP client cannot be built.
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::configuration("record store URL is required"));
        }
        if config.table.trim().is_empty() {
            return Err(Error::configuration("record store table is required"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{base}/rest/v1/{}", config.table.trim()),
            api_key: config.api_key,
        })
    }

    /// Returns the table endpoint this store queries.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Builds the `or=(...)` filter matching any of `entities`.
#[must_use]
pub fn entity_filter(entities: &EntitySet) -> String {
    let clauses: Vec<String> = entities
        .iter()
        .map(|e| {
            let quoted = e.name().replace('\\', "\\\\").replace('"', "\\\"");
            format!("{ENTITY_COLUMN}.ilike.\"{quoted}\"")
        })
        .collect();
    format!("({})", clauses.join(","))
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn find_by_entities(&self, entities: &EntitySet) -> Result<Vec<Record>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let filter = entity_filter(entities);
        let mut req = self
            .client
            .get(&self.endpoint)
            .query(&[("select", "*"), ("or", filter.as_str())]);
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key).bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::store_with_source("record store request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<PostgrestError>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(Error::store(format!(
                "record store returned {status}: {detail}"
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::store_with_source("record store returned a non-array body", e))?;

        let total = rows.len();
        let records: Vec<Record> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<Record>(row) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::warn!(%error, "dropping undecodable store row");
                    None
                }
            })
            .collect();

        tracing::debug!(
            endpoint = %self.endpoint,
            rows = total,
            decoded = records.len(),
            "record store query finished"
        );
        Ok(records)
    }
}
