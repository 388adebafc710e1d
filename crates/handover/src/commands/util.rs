//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;

use handover_core::{
    Category, CategoryFilter, Condition, Dimensions, ListingStatus, PhotoUpload, Role,
    SessionUser, SortKey,
};

use crate::cli::{CategoryArg, ConditionArg, RoleArg, SortArg, StatusArg};
use crate::error::CliError;

use super::Context;

// ── Arg conversions ─────────────────────────────────────────────────

impl From<CategoryArg> for CategoryFilter {
    fn from(arg: CategoryArg) -> Self {
        let category = match arg {
            CategoryArg::All => return Self::All,
            CategoryArg::Furniture => Category::Furniture,
            CategoryArg::Electronics => Category::Electronics,
            CategoryArg::Clothing => Category::Clothing,
            CategoryArg::Books => Category::Books,
            CategoryArg::Kitchen => Category::Kitchen,
            CategoryArg::Sports => Category::Sports,
            CategoryArg::Toys => Category::Toys,
            CategoryArg::Tools => Category::Tools,
            CategoryArg::Other => Category::Other,
        };
        Self::Only(category)
    }
}

impl From<ConditionArg> for Condition {
    fn from(arg: ConditionArg) -> Self {
        match arg {
            ConditionArg::LikeNew => Self::LikeNew,
            ConditionArg::Good => Self::Good,
            ConditionArg::Worn => Self::Worn,
            ConditionArg::Broken => Self::Broken,
        }
    }
}

impl From<StatusArg> for ListingStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Claimed => Self::Claimed,
            StatusArg::Completed => Self::Completed,
        }
    }
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Donor => Self::Donor,
            RoleArg::Beneficiary => Self::Beneficiary,
        }
    }
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Newest => Self::NewestFirst,
            SortArg::Oldest => Self::OldestFirst,
            SortArg::TitleAsc => Self::TitleAsc,
            SortArg::TitleDesc => Self::TitleDesc,
            SortArg::RatingDesc => Self::RatingHighLow,
            SortArg::RatingAsc => Self::RatingLowHigh,
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Sign in for a command that needs an account.
///
/// Email comes from the flag, env, or profile; the password from
/// `HANDOVER_PASSWORD`, the keyring, or an interactive prompt.
pub async fn sign_in(ctx: &Context<'_>) -> Result<Arc<SessionUser>, CliError> {
    if let Some(user) = ctx.marketplace.current_user() {
        return Ok(user);
    }
    let email = ctx.email.ok_or(CliError::NotSignedIn)?;
    let password = password_for(ctx.profile_name)?;
    ctx.marketplace.sign_in(email, &password).await?;
    ctx.marketplace.current_user().ok_or(CliError::NotSignedIn)
}

/// Stored password, or a prompt when attached to a terminal.
pub fn password_for(profile_name: &str) -> Result<SecretString, CliError> {
    if let Some(password) = handover_config::resolve_password(profile_name) {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NotSignedIn);
    }
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(password))
}

// ── Interactive ─────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

// ── Input files ─────────────────────────────────────────────────────

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Read photo files for upload. Size and type limits are checked by core.
pub fn read_photos(paths: &[std::path::PathBuf]) -> Result<Vec<PhotoUpload>, CliError> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|e| CliError::Validation {
                field: "photo".into(),
                reason: format!("{}: {e}", path.display()),
            })?;
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            Ok(PhotoUpload::new(name, bytes))
        })
        .collect()
}

/// Parse `LENGTHxWIDTHxHEIGHT` (e.g. `120x60x75`).
pub fn parse_dimensions(raw: &str, unit: &str) -> Result<Dimensions, CliError> {
    let invalid = || CliError::Validation {
        field: "dimensions".into(),
        reason: format!("expected LENGTHxWIDTHxHEIGHT, got '{raw}'"),
    };
    let parts: Vec<f64> = raw
        .split(['x', 'X', '×'])
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;
    let [length, width, height] = parts[..] else {
        return Err(invalid());
    };
    Ok(Dimensions {
        length,
        width,
        height,
        unit: unit.to_owned(),
    })
}
