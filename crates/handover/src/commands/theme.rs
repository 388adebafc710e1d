//! `handover theme`: print, set, or toggle the persisted output theme.

use handover_core::{AppState, Theme};

use crate::cli::{GlobalOpts, ThemeArgs, ThemeChoice};
use crate::error::CliError;
use crate::output::{self, Palette};

pub fn handle(
    args: &ThemeArgs,
    state: &AppState,
    palette: &Palette,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let theme = match args.mode {
        None => state.theme(),
        Some(ThemeChoice::Light) => set(state, Theme::Light)?,
        Some(ThemeChoice::Dark) => set(state, Theme::Dark)?,
        Some(ThemeChoice::Toggle) => state.toggle_theme()?,
    };
    if args.mode.is_some() {
        tracing::info!(%theme, "theme switched");
    }

    let out = output::render_single(
        global.output,
        &serde_json::json!({ "theme": theme.to_string() }),
        |_| format!("Theme: {}", palette.accent(&theme.to_string())),
        |_| theme.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn set(state: &AppState, theme: Theme) -> Result<Theme, CliError> {
    state.set_theme(theme)?;
    Ok(theme)
}
