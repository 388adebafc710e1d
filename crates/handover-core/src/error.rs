// ── Core error types ──
//
// User-facing errors from handover-core. These are NOT API-specific:
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<handover_api::Error>` impl translates transport-layer errors
// into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("You need to sign in first")]
    NotSignedIn,

    #[error("Not connected to the backend")]
    Disconnected,

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    // ── Operation errors ─────────────────────────────────────────────
    /// Input rejected before any remote call.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// A remote call failed. `retryable` drives the "try again" affordance.
    #[error("Backend error: {message}")]
    Remote {
        message: String,
        code: Option<String>,
        retryable: bool,
    },

    /// A multi-step operation failed after some steps had succeeded.
    /// `cleaned_up` reports whether the compensating cleanup succeeded.
    #[error("{message}{}", cleanup_suffix(.cleaned_up))]
    PartialFailure { message: String, cleaned_up: bool },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn cleanup_suffix(cleaned_up: &bool) -> &'static str {
    if *cleaned_up { "" } else { " (cleanup incomplete)" }
}

impl CoreError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.to_string(),
        }
    }

    /// Whether retrying the same operation might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::Disconnected => true,
            Self::Remote { retryable, .. } => *retryable,
            Self::PartialFailure { cleaned_up, .. } => *cleaned_up,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<handover_api::Error> for CoreError {
    fn from(err: handover_api::Error) -> Self {
        use handover_api::Error as Api;

        let retryable = err.is_transient();
        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- sign in again".into(),
            },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Remote {
                        message: e.to_string(),
                        code: None,
                        retryable,
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::RateLimited { retry_after_secs } => CoreError::Remote {
                message: format!("Rate limited -- retry after {retry_after_secs}s"),
                code: Some("rate_limited".into()),
                retryable: true,
            },
            Api::Rest {
                status: 401 | 403,
                message,
                ..
            } => CoreError::Forbidden { message },
            Api::Rest {
                message, code, ..
            } => CoreError::Remote {
                message,
                code,
                retryable,
            },
            Api::Storage { status: 403, message } => CoreError::Forbidden { message },
            Api::Storage { message, .. } => CoreError::Remote {
                message: format!("Storage: {message}"),
                code: None,
                retryable,
            },
            Api::RealtimeConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Realtime connection failed: {reason}"),
            },
            Api::RealtimeClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Realtime channel closed (code {code}): {reason}"),
            },
            Api::SubscriptionRejected(reason) => CoreError::Remote {
                message: format!("Realtime subscription rejected: {reason}"),
                code: None,
                retryable: false,
            },
            // A row the client cannot read is a remote data problem.
            Api::Deserialization { message, body: _ } => CoreError::Remote {
                message: format!("Unexpected response: {message}"),
                code: None,
                retryable: true,
            },
            Api::InvalidRequest(message) => CoreError::Internal(message),
        }
    }
}
