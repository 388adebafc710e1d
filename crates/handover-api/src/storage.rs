// Object storage (`storage/v1`) for listing photos.
//
// Objects live in a single public bucket. Uploads return the object's
// public URL; removals take object paths relative to the bucket, which
// `object_path_from_url` recovers from a stored public URL.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::{TransportConfig, service_url};

#[derive(Deserialize)]
struct StorageErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct RemoveBody<'a> {
    prefixes: &'a [String],
}

/// Client for one storage bucket.
pub struct StorageClient {
    http: reqwest::Client,
    /// `{base}/storage/v1/`
    base_url: Url,
    bucket: String,
    credentials: Arc<Credentials>,
}

impl StorageClient {
    pub fn new(
        base_url: &Url,
        bucket: impl Into<String>,
        credentials: Arc<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(credentials.anon_key())?;
        Self::with_client(http, base_url, bucket, credentials)
    }

    pub fn with_client(
        http: reqwest::Client,
        base_url: &Url,
        bucket: impl Into<String>,
        credentials: Arc<Credentials>,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: service_url(base_url, "storage/v1/")?,
            bucket: bucket.into(),
            credentials,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload an object and return its public URL.
    ///
    /// Existing objects are never overwritten; callers generate unique paths.
    pub async fn upload(
        &self,
        path: &str,
        content_type: &str,
        body: Bytes,
    ) -> Result<String, Error> {
        let url = self
            .base_url
            .join(&format!("object/{}/{}", self.bucket, path.trim_start_matches('/')))?;
        debug!("POST {url} ({} bytes, {content_type})", body.len());

        let resp = self
            .http
            .post(url)
            .bearer_auth(self.credentials.bearer())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", "false")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::storage_error(status, resp).await);
        }
        Ok(self.public_url(path))
    }

    /// Public URL for an object path in this bucket.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }

    /// Recover the bucket-relative object path from a public URL.
    ///
    /// Returns `None` for URLs that do not point into this bucket.
    pub fn object_path_from_url(&self, public_url: &str) -> Option<String> {
        let marker = format!("/object/public/{}/", self.bucket);
        let url = Url::parse(public_url).ok()?;
        let (_, path) = url.path().split_once(&marker)?;
        if path.is_empty() {
            None
        } else {
            Some(path.to_owned())
        }
    }

    /// Remove objects by bucket-relative path. An empty list is a no-op.
    pub async fn remove(&self, paths: &[String]) -> Result<(), Error> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.base_url.join(&format!("object/{}", self.bucket))?;
        debug!("DELETE {url} objects={paths:?}");

        let resp = self
            .http
            .delete(url)
            .bearer_auth(self.credentials.bearer())
            .json(&RemoveBody { prefixes: paths })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::storage_error(status, resp).await)
        }
    }

    async fn storage_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StorageErrorBody>(&raw)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });
        Error::Storage {
            status: status.as_u16(),
            message,
        }
    }
}
