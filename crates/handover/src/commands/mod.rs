//! Command dispatch: bridges CLI args -> marketplace calls -> output formatting.

pub mod auth;
pub mod config_cmd;
pub mod dashboard;
pub mod listings;
pub mod search;
pub mod theme;
pub mod util;

use handover_core::Marketplace;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output::Palette;

/// What every backend-bound handler gets.
pub struct Context<'a> {
    pub marketplace: &'a Marketplace,
    pub profile_name: &'a str,
    /// Account email for commands that sign in.
    pub email: Option<&'a str>,
    pub palette: &'a Palette,
    pub global: &'a GlobalOpts,
}

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context<'_>) -> Result<(), CliError> {
    match cmd {
        Command::Search(args) => search::handle(ctx, &args).await,
        Command::Listings(args) => listings::handle(ctx, args).await,
        Command::Dashboard => dashboard::handle(ctx).await,
        Command::Auth(args) => auth::handle(ctx, args).await,
        // Handled before a backend connection is made
        Command::Theme(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
