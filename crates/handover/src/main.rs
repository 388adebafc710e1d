mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use handover_core::{AppState, FileStorage, Marketplace};

use crate::cli::{Cli, Command};
use crate::commands::Context;
use crate::error::CliError;
use crate::output::Palette;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;

    // The persisted theme picks the palette before anything is printed.
    let palette = Arc::new(Palette::new(global.color));
    let state = Arc::new(AppState::restore(
        Arc::new(FileStorage::new(config::state_path())),
        Arc::clone(&palette) as Arc<dyn handover_core::VisualMode>,
    ));

    match cli.command {
        // Local-only commands
        Command::Config(args) => commands::config_cmd::handle(args, &global),
        Command::Theme(args) => commands::theme::handle(&args, &state, &palette, &global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "handover", &mut std::io::stdout());
            Ok(())
        }

        // Everything else talks to the backend
        cmd => {
            let cfg = config::load_config_or_default();
            let resolved = config::resolve(&global, &cfg)?;
            tracing::debug!(command = ?cmd, profile = %resolved.profile_name, "dispatching command");

            if let Command::Search(ref args) = cmd {
                if args.watch {
                    // Live searches keep the realtime channel open.
                    let marketplace = Marketplace::new(resolved.backend, state);
                    marketplace.connect().await?;
                    let ctx = Context {
                        marketplace: &marketplace,
                        profile_name: &resolved.profile_name,
                        email: resolved.email.as_deref(),
                        palette: &palette,
                        global: &global,
                    };
                    let result = commands::search::watch(&ctx, args).await;
                    marketplace.disconnect().await;
                    return result;
                }
            }

            let profile_name = resolved.profile_name;
            let email = resolved.email;
            Marketplace::oneshot(resolved.backend, state, |marketplace| async move {
                let ctx = Context {
                    marketplace: &marketplace,
                    profile_name: &profile_name,
                    email: email.as_deref(),
                    palette: &palette,
                    global: &global,
                };
                Ok(commands::dispatch(cmd, &ctx).await)
            })
            .await?
        }
    }
}
