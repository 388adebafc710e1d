// Async client for the PostgREST-style table API.
//
// Base path: /rest/v1/
// Auth: `apikey` header on every request, `Authorization: Bearer` with the
// session token (or the anon key when nobody is signed in).

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::query::{TableQuery, parse_content_range_total};
use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::{TransportConfig, service_url};

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const COUNT_EXACT: &str = "count=exact";

// ── Error response shape from the table API ─────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// One page of rows plus the exact total, when it was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows<T> {
    pub rows: Vec<T>,
    pub total: Option<u64>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the table API.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<Credentials>,
}

impl RestClient {
    pub fn new(
        base_url: &Url,
        credentials: Arc<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(credentials.anon_key())?;
        Self::with_client(http, base_url, credentials)
    }

    /// Wrap an existing `reqwest::Client` (caller manages the `apikey` header).
    pub fn with_client(
        http: reqwest::Client,
        base_url: &Url,
        credentials: Arc<Credentials>,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: service_url(base_url, "rest/v1/")?,
            credentials,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, Error> {
        if table.is_empty() || table.contains('/') {
            return Err(Error::InvalidRequest(format!("invalid table name: {table:?}")));
        }
        Ok(self.base_url.join(table)?)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Run a read. When the query asks for an exact count, the total is
    /// taken from `Content-Range`.
    ///
    /// A range past the last row yields an empty page, not an error.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &TableQuery,
    ) -> Result<Rows<T>, Error> {
        let url = self.table_url(table)?;
        let params = query.to_params();
        debug!("GET {url} params={params:?}");

        let mut req = self
            .http
            .get(url)
            .bearer_auth(self.credentials.bearer())
            .query(&params);
        if query.wants_exact_count() {
            req = req.header(PREFER, COUNT_EXACT);
        }
        let resp = req.send().await?;

        let status = resp.status();
        let total = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(Rows {
                rows: Vec::new(),
                total,
            });
        }

        let rows: Vec<T> = Self::handle_response(resp).await?;
        Ok(Rows { rows, total })
    }

    /// First row matching the query, if any.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &TableQuery,
    ) -> Result<Option<T>, Error> {
        let page = self.select(table, &query.clone().limit(1)).await?;
        Ok(page.rows.into_iter().next())
    }

    /// Number of rows matching the query's filters, without fetching them.
    pub async fn count(&self, table: &str, query: &TableQuery) -> Result<u64, Error> {
        let url = self.table_url(table)?;
        let params = query.filter_params();
        debug!("HEAD {url} params={params:?}");

        let resp = self
            .http
            .head(url)
            .bearer_auth(self.credentials.bearer())
            .header(PREFER, COUNT_EXACT)
            .query(&[("select", "*")])
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() && status != StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(Self::parse_error(status, resp).await);
        }
        resp.headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| Error::Deserialization {
                message: "missing row count in Content-Range".into(),
                body: String::new(),
            })
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert one row (or an array of rows) and return what was stored.
    pub async fn insert<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<T>, Error> {
        let url = self.table_url(table)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .bearer_auth(self.credentials.bearer())
            .header(PREFER, RETURN_REPRESENTATION)
            .json(body)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// Patch every row matching the query's filters.
    pub async fn update<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &str,
        query: &TableQuery,
        body: &B,
    ) -> Result<Vec<T>, Error> {
        let url = self.table_url(table)?;
        let params = Self::guarded_filters(query)?;
        debug!("PATCH {url} params={params:?}");

        let resp = self
            .http
            .patch(url)
            .bearer_auth(self.credentials.bearer())
            .header(PREFER, RETURN_REPRESENTATION)
            .query(&params)
            .json(body)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// Delete every row matching the query's filters, returning them.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &TableQuery,
    ) -> Result<Vec<T>, Error> {
        let url = self.table_url(table)?;
        let params = Self::guarded_filters(query)?;
        debug!("DELETE {url} params={params:?}");

        let resp = self
            .http
            .delete(url)
            .bearer_auth(self.credentials.bearer())
            .header(PREFER, RETURN_REPRESENTATION)
            .query(&params)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// Writes without a filter would touch the whole table.
    fn guarded_filters(query: &TableQuery) -> Result<Vec<(String, String)>, Error> {
        let params = query.filter_params();
        if params.is_empty() {
            return Err(Error::InvalidRequest(
                "refusing an unfiltered write against a whole table".into(),
            ));
        }
        Ok(params)
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview = body_preview(&body);
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Error::RateLimited { retry_after_secs };
        }

        let raw = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ErrorResponse>(&raw).ok();

        if status == StatusCode::UNAUTHORIZED
            && parsed
                .as_ref()
                .and_then(|e| e.code.as_deref())
                .is_some_and(|c| c == "PGRST301" || c == "PGRST303")
        {
            return Error::SessionExpired;
        }

        match parsed {
            Some(err) => Error::Rest {
                status: status.as_u16(),
                message: err.message.unwrap_or_else(|| status.to_string()),
                code: err.code,
                hint: err.hint,
            },
            None => Error::Rest {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                code: None,
                hint: None,
            },
        }
    }
}

/// At most the first 200 characters of a response body.
fn body_preview(body: &str) -> &str {
    body.char_indices()
        .nth(200)
        .map_or(body, |(end, _)| &body[..end])
}
