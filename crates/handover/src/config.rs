//! CLI configuration: a thin wrapper around `handover_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --anon-key, --insecure, --timeout, --email).

use std::time::Duration;

use secrecy::SecretString;

use handover_core::{BackendConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use handover_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config, state_path,
};

/// Everything a backend-bound command needs from config and flags.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub backend: BackendConfig,
    /// Account email for commands that sign in.
    pub email: Option<String>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the backend config from the config file, profile, and CLI
/// overrides. Flags take priority over profile values.
pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let (mut backend, email) = if let Some(profile) = cfg.profiles.get(&profile_name) {
        let mut profile = profile.clone();
        if let Some(ref url) = global.url {
            profile.url.clone_from(url);
        }
        let backend = match global.anon_key {
            Some(ref key) => {
                handover_config::backend_config(&profile, SecretString::from(key.clone()), &cfg.defaults)?
            }
            None => handover_config::profile_to_backend_config(&profile, &profile_name, &cfg.defaults)?,
        };
        (backend, profile.email)
    } else {
        // No profile: flags / env vars alone.
        let url = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let key = global
            .anon_key
            .clone()
            .ok_or_else(|| CliError::NoCredentials {
                profile: profile_name.clone(),
            })?;
        let profile = Profile::new(url);
        let backend = handover_config::backend_config(&profile, SecretString::from(key), &cfg.defaults)?;
        (backend, None)
    };

    if global.insecure {
        backend.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        backend.timeout = Duration::from_secs(secs);
    }

    Ok(Resolved {
        profile_name,
        backend,
        email: global.email.clone().or(email),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["handover"];
        argv.extend_from_slice(args);
        argv.push("dashboard");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_profile() -> Config {
        let mut cfg = Config::default();
        let mut profile = Profile::new("https://abc.example.co");
        profile.anon_key = Some("from-profile".into());
        profile.email = Some("donor@example.org".into());
        profile.timeout = Some(12);
        cfg.profiles.insert("default".into(), profile);
        cfg
    }

    #[test]
    fn flags_override_profile() {
        let cfg = config_with_profile();
        let resolved = resolve(
            &global(&[
                "--url",
                "http://localhost:54321",
                "--anon-key",
                "from-flag",
                "--timeout",
                "3",
                "--email",
                "other@example.org",
                "-k",
            ]),
            &cfg,
        )
        .unwrap();

        assert_eq!(resolved.backend.url.as_str(), "http://localhost:54321/");
        assert_eq!(resolved.backend.timeout, Duration::from_secs(3));
        assert_eq!(resolved.backend.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(resolved.email.as_deref(), Some("other@example.org"));
    }

    #[test]
    fn profile_values_apply_without_flags() {
        let cfg = config_with_profile();
        let resolved = resolve(&global(&["--anon-key", "k"]), &cfg).unwrap();
        assert_eq!(resolved.profile_name, "default");
        assert_eq!(resolved.backend.timeout, Duration::from_secs(12));
        assert_eq!(resolved.email.as_deref(), Some("donor@example.org"));
    }

    #[test]
    fn missing_profile_needs_url_and_key() {
        let cfg = Config::default();
        assert!(matches!(
            resolve(&global(&[]), &cfg),
            Err(CliError::NoConfig { .. })
        ));
        assert!(matches!(
            resolve(&global(&["--url", "http://localhost:54321"]), &cfg),
            Err(CliError::NoCredentials { .. })
        ));
        assert!(resolve(&global(&["--url", "http://localhost:54321", "--anon-key", "k"]), &cfg).is_ok());
    }
}
