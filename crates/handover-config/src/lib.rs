//! Shared configuration for the handover CLI.
//!
//! TOML profiles, credential resolution (keyring + env + plaintext),
//! and translation to `handover_core::BackendConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use handover_core::config::{DEFAULT_BUCKET, DEFAULT_CHANNEL};
use handover_core::{BackendConfig, TlsVerification};

/// Keyring service name; entries are keyed `<profile>/<secret>`.
const KEYRING_SERVICE: &str = "handover";

/// Env var that points the CLI at a different config file.
pub const CONFIG_PATH_ENV: &str = "HANDOVER_CONFIG";
/// Env var that points the CLI at a different persisted-state file.
pub const STATE_PATH_ENV: &str = "HANDOVER_STATE";
/// Env var consulted first when a password is needed.
pub const PASSWORD_ENV: &str = "HANDOVER_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no anon key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Quiet period for `search --watch` before a typed query runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_debounce_ms() -> u64 {
    300
}

/// A named backend profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Project URL (e.g., "https://abc.example.co").
    pub url: String,

    /// Anon key (plaintext; prefer keyring or env var).
    pub anon_key: Option<String>,

    /// Environment variable name containing the anon key.
    pub anon_key_env: Option<String>,

    /// Email used by `auth login` when none is given.
    pub email: Option<String>,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Realtime channel name override.
    pub channel: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification (local stacks only).
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: None,
            anon_key_env: None,
            email: None,
            bucket: default_bucket(),
            channel: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.into()
}

// ── File paths ──────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "handover", "handover")
}

/// Resolve the config file path via XDG / platform conventions.
/// `HANDOVER_CONFIG` overrides it.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where persisted UI state (the theme) lives. `HANDOVER_STATE`
/// overrides it.
pub fn state_path() -> PathBuf {
    if let Some(path) = std::env::var_os(STATE_PATH_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback(".local/share").join("state.json"),
        |dirs| dirs.data_dir().join("state.json"),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("handover");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file, merged over defaults and under
/// `HANDOVER_*` env vars (`HANDOVER_DEFAULTS__OUTPUT=json`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HANDOVER_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str, secret: &str) -> Result<keyring::Entry, ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{secret}"))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Resolve the anon key: `anon_key_env` → keyring → plaintext.
pub fn resolve_anon_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's anon_key_env → env var lookup
    if let Some(ref env_name) = profile.anon_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name, "anon-key") {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.anon_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Look up a stored password: `HANDOVER_PASSWORD` → keyring.
///
/// `None` means the caller should prompt.
pub fn resolve_password(profile_name: &str) -> Option<SecretString> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(pw));
    }
    keyring_entry(profile_name, "password")
        .ok()?
        .get_password()
        .ok()
        .map(SecretString::from)
}

/// Store the anon key in the system keyring.
pub fn store_anon_key(profile_name: &str, key: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "anon-key")?
        .set_password(key)
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Remember the account password for `profile_name`.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "password")?
        .set_password(password.expose_secret())
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Drop a stored password. Returns whether one was there.
pub fn forget_password(profile_name: &str) -> Result<bool, ConfigError> {
    match keyring_entry(profile_name, "password")?.delete_credential() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(ConfigError::Keyring(e.to_string())),
    }
}

/// Build a `BackendConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_backend_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BackendConfig, ConfigError> {
    let anon_key = resolve_anon_key(profile, profile_name)?;
    backend_config(profile, anon_key, defaults)
}

/// Build a `BackendConfig` from a profile with an already-resolved key.
pub fn backend_config(
    profile: &Profile,
    anon_key: SecretString,
    defaults: &Defaults,
) -> Result<BackendConfig, ConfigError> {
    let url = parse_url(&profile.url)?;
    let mut config = BackendConfig::new(url, anon_key);
    config.bucket.clone_from(&profile.bucket);
    config.channel = profile
        .channel
        .clone()
        .unwrap_or_else(|| DEFAULT_CHANNEL.into());
    config.tls = tls_for(profile, false);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.debounce = Duration::from_millis(defaults.debounce_ms);
    Ok(config)
}

/// Parse a project URL, rejecting anything but http(s).
pub fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected an http(s) URL, got '{raw}'"),
        });
    }
    Ok(url)
}

/// TLS strategy for a profile; `force_insecure` comes from a CLI flag.
pub fn tls_for(profile: &Profile, force_insecure: bool) -> TlsVerification {
    if force_insecure || profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}
