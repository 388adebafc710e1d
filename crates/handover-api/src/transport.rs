// Shared transport configuration for building reqwest::Client instances.
//
// The REST, storage, and auth clients share TLS, timeout, and the
// project `apikey` header through this module, avoiding duplicated
// builder logic.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("handover/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode (api-level mirror of core's TlsVerification).
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (local development stacks).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` that sends the project `apikey` header
    /// on every request.
    pub fn build_client(&self, api_key: &SecretString) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|e| Error::InvalidRequest(format!("invalid API key header value: {e}")))?;
        key_value.set_sensitive(true);
        headers.insert("apikey", key_value);

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Join a service prefix (e.g. `"rest/v1/"`) onto the project base URL.
///
/// The base may or may not carry a trailing slash; the result always does,
/// so further relative joins append rather than replace the last segment.
pub(crate) fn service_url(base: &Url, service: &str) -> Result<Url, Error> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(service)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn service_url_handles_trailing_slash() {
        let with = Url::parse("https://abc.example.co/").unwrap();
        let without = Url::parse("https://abc.example.co").unwrap();
        assert_eq!(
            service_url(&with, "rest/v1/").unwrap().as_str(),
            "https://abc.example.co/rest/v1/"
        );
        assert_eq!(
            service_url(&without, "rest/v1/").unwrap().as_str(),
            "https://abc.example.co/rest/v1/"
        );
    }

    #[test]
    fn service_url_keeps_path_prefix() {
        let base = Url::parse("http://localhost:54321/project").unwrap();
        assert_eq!(
            service_url(&base, "storage/v1/").unwrap().as_str(),
            "http://localhost:54321/project/storage/v1/"
        );
    }
}
