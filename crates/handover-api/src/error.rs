use thiserror::Error;

/// Top-level error type for the `handover-api` crate.
///
/// Covers every failure mode across the backend surfaces: auth, transport,
/// the table API, object storage, and the realtime channel.
/// `handover-core` maps these into domain errors so nothing above the
/// boundary inspects vendor error shapes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Sign-in or sign-up rejected (bad credentials, unconfirmed email, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The access token is no longer accepted by the backend.
    #[error("Session expired -- sign in again")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by the gateway. Includes retry-after in seconds.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Table API ───────────────────────────────────────────────────
    /// Structured error from the table API (`{message, code, hint}`).
    #[error("REST API error (HTTP {status}): {message}")]
    Rest {
        status: u16,
        message: String,
        code: Option<String>,
        hint: Option<String>,
    },

    // ── Storage ─────────────────────────────────────────────────────
    /// Object storage rejected an upload or removal.
    #[error("Storage error (HTTP {status}): {message}")]
    Storage { status: u16, message: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// Realtime WebSocket connection failed.
    #[error("Realtime connection failed: {0}")]
    RealtimeConnect(String),

    /// Realtime WebSocket closed unexpectedly.
    #[error("Realtime channel closed (code {code}): {reason}")]
    RealtimeClosed { code: u16, reason: String },

    /// The server refused to join the change channel.
    #[error("Realtime subscription rejected: {0}")]
    SubscriptionRejected(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and signing in again might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::RealtimeConnect(_)
            | Self::RealtimeClosed { .. } => true,
            Self::Rest { status, .. } | Self::Storage { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Rest { status: 404, .. } | Self::Storage { status: 404, .. } => true,
            // PostgREST: "JSON object requested, multiple (or no) rows returned"
            Self::Rest { code, .. } => code.as_deref() == Some("PGRST116"),
            _ => false,
        }
    }

    /// Extract the backend error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Rest { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
