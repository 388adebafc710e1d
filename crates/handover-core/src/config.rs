// ── Runtime backend configuration ──
//
// These types describe *how* to reach the hosted backend. They carry
// credential data and tuning, but never touch disk. The CLI builds a
// `BackendConfig` from its profile and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use handover_api::{TlsMode, TransportConfig};

pub const DEFAULT_BUCKET: &str = "item-photos";
pub const DEFAULT_CHANNEL: &str = "announcements_changes";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (local development stacks only).
    DangerAcceptInvalid,
}

/// Configuration for one backend project.
///
/// Built by the CLI, passed to `Marketplace`; core never reads config files.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL (e.g. `https://abc.example.co`).
    pub url: Url,
    /// Public (anon) project key.
    pub anon_key: SecretString,
    /// Storage bucket holding listing photos.
    pub bucket: String,
    /// Realtime channel name for listing changes.
    pub channel: String,
    pub tls: TlsVerification,
    pub timeout: Duration,
    /// Quiet period before a typed search runs.
    pub debounce: Duration,
    /// Open the realtime channel for live searches.
    pub realtime_enabled: bool,
}

impl BackendConfig {
    pub fn new(url: Url, anon_key: SecretString) -> Self {
        Self {
            url,
            anon_key,
            bucket: DEFAULT_BUCKET.into(),
            channel: DEFAULT_CHANNEL.into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            debounce: DEFAULT_DEBOUNCE,
            realtime_enabled: true,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }
}
