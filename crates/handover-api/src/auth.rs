// Password auth against the backend's `auth/v1` service.
//
// `Credentials` is the shared cell every client reads its bearer token
// from: the project anon key until someone signs in, the session's access
// token afterwards.

use std::sync::{Arc, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{TransportConfig, service_url};

// ── Credentials ─────────────────────────────────────────────────────

/// Project key plus the (optional) signed-in access token.
///
/// Shared between all clients via `Arc`. Signing in or out swaps the
/// token in place, so already-built clients pick it up on their next call.
#[derive(Debug)]
pub struct Credentials {
    anon_key: SecretString,
    access_token: RwLock<Option<SecretString>>,
}

impl Credentials {
    pub fn new(anon_key: SecretString) -> Arc<Self> {
        Arc::new(Self {
            anon_key,
            access_token: RwLock::new(None),
        })
    }

    /// The project's public (anon) key.
    pub fn anon_key(&self) -> &SecretString {
        &self.anon_key
    }

    /// Install or clear the user's access token.
    pub fn set_access_token(&self, token: Option<SecretString>) {
        *self.access_token.write().expect("credentials lock poisoned") = token;
    }

    /// Whether a user access token is currently installed.
    pub fn is_signed_in(&self) -> bool {
        self.access_token
            .read()
            .expect("credentials lock poisoned")
            .is_some()
    }

    /// The bearer token to send: the access token when signed in,
    /// the anon key otherwise.
    pub fn bearer(&self) -> String {
        let guard = self.access_token.read().expect("credentials lock poisoned");
        guard
            .as_ref()
            .unwrap_or(&self.anon_key)
            .expose_secret()
            .to_owned()
    }
}

// ── Wire types ──────────────────────────────────────────────────────

/// A user as returned by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata supplied at sign-up (avatar URL, full name, ...).
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// A signed-in session.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: SecretString,
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

/// Sign-up result. Projects with email confirmation disabled return a
/// full session; otherwise only the pending user comes back.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUp {
    Session(Session),
    Pending(AuthUser),
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a serde_json::Value,
}

/// Error bodies differ between auth endpoints; take whichever field is set.
#[derive(Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Client for the `auth/v1` service.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<Credentials>,
}

impl AuthClient {
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
            base_url: service_url(base_url, "auth/v1/")?,
            credentials,
        })
    }

    /// Register a new account.
    ///
    /// If the backend returns a session, its access token is installed.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        metadata: &serde_json::Value,
    ) -> Result<SignUp, Error> {
        let url = self.base_url.join("signup")?;
        debug!("POST {url}");

        let body = SignUpBody {
            email,
            password: password.expose_secret(),
            data: metadata,
        };
        let resp = self.http.post(url).json(&body).send().await?;
        let result: SignUp = Self::parse(resp).await?;

        if let SignUp::Session(ref session) = result {
            self.credentials
                .set_access_token(Some(session.access_token.clone()));
        }
        Ok(result)
    }

    /// Exchange email + password for a session and install its token.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, Error> {
        let url = self.base_url.join("token")?;
        debug!("POST {url} grant_type=password");

        let body = PasswordGrant {
            email,
            password: password.expose_secret(),
        };
        let resp = self
            .http
            .post(url)
            .query(&[("grant_type", "password")])
            .json(&body)
            .send()
            .await?;
        let session: Session = Self::parse(resp).await?;

        self.credentials
            .set_access_token(Some(session.access_token.clone()));
        Ok(session)
    }

    /// Revoke the current session. The local token is cleared even if
    /// the backend call fails.
    pub async fn sign_out(&self) -> Result<(), Error> {
        if !self.credentials.is_signed_in() {
            return Ok(());
        }
        let url = self.base_url.join("logout")?;
        debug!("POST {url}");

        let bearer = self.credentials.bearer();
        self.credentials.set_access_token(None);

        let resp = self.http.post(url).bearer_auth(bearer).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::auth_error(status, resp).await)
        }
    }

    // ── Response handling ────────────────────────────────────────────

    async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::auth_error(status, resp).await);
        }
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    async fn auth_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        let raw = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<AuthErrorBody>(&raw)
            .ok()
            .and_then(|b| b.error_description.or(b.msg).or(b.message))
            .unwrap_or_else(|| {
                if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                }
            });

        match status.as_u16() {
            400 | 401 | 403 | 422 => Error::Authentication { message },
            429 => Error::RateLimited {
                retry_after_secs: 60,
            },
            code => Error::Rest {
                status: code,
                message,
                code: None,
                hint: None,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let creds = Credentials::new(SecretString::from("anon"));
        assert_eq!(creds.bearer(), "anon");
        assert!(!creds.is_signed_in());

        creds.set_access_token(Some(SecretString::from("jwt")));
        assert_eq!(creds.bearer(), "jwt");
        assert!(creds.is_signed_in());

        creds.set_access_token(None);
        assert_eq!(creds.bearer(), "anon");
    }

    #[test]
    fn sign_up_without_session_is_pending() {
        let json = serde_json::json!({
            "id": "0b7c8d1e-0000-4000-8000-000000000001",
            "email": "donor@example.org",
            "user_metadata": { "full_name": "Dana" }
        });
        let parsed: SignUp = serde_json::from_value(json).unwrap();
        assert!(matches!(parsed, SignUp::Pending(ref u) if u.email.as_deref() == Some("donor@example.org")));
    }
}
