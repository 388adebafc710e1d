//! Account commands: sign up, log in, log out, whoami.

use std::io::IsTerminal;

use secrecy::SecretString;

use handover_core::{NotificationKind, Role, SessionUser, SignUpOutcome};

use crate::cli::{AuthArgs, AuthCommand};
use crate::error::CliError;
use crate::output::{self, Palette};

use super::Context;
use super::util;

fn detail(u: &SessionUser, palette: &Palette) -> String {
    [
        palette.heading(u.full_name.as_deref().unwrap_or("(no name)")),
        format!("ID:     {}", u.id),
        format!("Email:  {}", u.email.as_deref().unwrap_or("-")),
        format!("Role:   {}", u.role.map_or_else(|| "-".to_owned(), |r| r.to_string())),
        format!("Avatar: {}", u.avatar_url.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

/// A new password, typed twice. `HANDOVER_PASSWORD` skips the prompt.
fn new_password() -> Result<SecretString, CliError> {
    if let Ok(pw) = std::env::var(handover_config::PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: format!("set {} when not running interactively", handover_config::PASSWORD_ENV),
        });
    }
    let first = rpassword::prompt_password("Choose a password: ").map_err(util::prompt_err)?;
    let second = rpassword::prompt_password("Repeat it: ").map_err(util::prompt_err)?;
    if first != second {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "passwords do not match".into(),
        });
    }
    if first.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(SecretString::from(first))
}

fn account_email(ctx: &Context<'_>) -> Result<String, CliError> {
    if let Some(email) = ctx.email {
        return Ok(email.to_owned());
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NotSignedIn);
    }
    dialoguer::Input::<String>::new()
        .with_prompt("Email")
        .interact_text()
        .map_err(util::prompt_err)
}

pub async fn handle(ctx: &Context<'_>, args: AuthArgs) -> Result<(), CliError> {
    match args.command {
        AuthCommand::Signup { email, name, role } => {
            let role = Role::from(role);
            let password = new_password()?;
            let outcome = ctx
                .marketplace
                .sign_up(&email, &password, name.as_deref(), role)
                .await?;
            let message = match outcome {
                SignUpOutcome::SignedIn(user) => {
                    let role = role.to_string().to_lowercase();
                    format!("Account created as a {role}, signed in as {}", user.id)
                }
                SignUpOutcome::ConfirmationPending { email } => {
                    format!("Account created. Confirm it from the email sent to {email}.")
                }
            };
            output::print_status(
                &ctx.palette.notification(NotificationKind::Success, &message),
                ctx.global.quiet,
            );
            Ok(())
        }

        AuthCommand::Login { save } => {
            let email = account_email(ctx)?;
            let password = util::password_for(ctx.profile_name)?;
            let user = ctx.marketplace.sign_in(&email, &password).await?;
            if save {
                handover_config::store_password(ctx.profile_name, &password)?;
                tracing::debug!(profile = ctx.profile_name, "password stored in keyring");
            }
            let who = user.email.as_deref().unwrap_or(&email);
            let mut message = format!("Signed in as {who}");
            if save {
                message.push_str(&format!(" (password saved for profile '{}')", ctx.profile_name));
            }
            output::print_status(
                &ctx.palette.notification(NotificationKind::Success, &message),
                ctx.global.quiet,
            );
            Ok(())
        }

        AuthCommand::Logout => {
            let forgot = handover_config::forget_password(ctx.profile_name)?;
            if ctx.marketplace.current_user().is_some() {
                ctx.marketplace.sign_out().await?;
            }
            let message = if forgot {
                format!("Stored password for profile '{}' removed", ctx.profile_name)
            } else {
                format!("No stored password for profile '{}'", ctx.profile_name)
            };
            output::print_status(
                &ctx.palette.notification(NotificationKind::Info, &message),
                ctx.global.quiet,
            );
            Ok(())
        }

        AuthCommand::Whoami => {
            let user = util::sign_in(ctx).await?;
            let out = output::render_single(
                ctx.global.output,
                user.as_ref(),
                |u| detail(u, ctx.palette),
                |u| u.id.to_string(),
            )?;
            output::print_output(&out, ctx.global.quiet);
            Ok(())
        }
    }
}
