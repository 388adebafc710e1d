//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.
//! Colors come from [`Palette`], which follows the persisted theme.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use owo_colors::{AnsiColors, OwoColorize};
use tabled::{Table, Tabled, settings::Style};

use handover_core::{ListingStatus, NotificationKind, Theme, VisualMode};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Palette ──────────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

#[derive(Clone, Copy)]
enum Role {
    Heading,
    Accent,
    Muted,
    Good,
    Warn,
    Bad,
}

/// Terminal colors for the light or dark theme.
///
/// The dark theme uses the bright ANSI variants so text stays legible on
/// dark backgrounds.
#[derive(Debug)]
pub struct Palette {
    enabled: bool,
    dark: AtomicBool,
}

impl Palette {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            enabled: should_color(mode),
            dark: AtomicBool::new(false),
        }
    }

    pub fn theme(&self) -> Theme {
        if self.dark.load(Ordering::Relaxed) {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    fn color(&self, role: Role) -> AnsiColors {
        let dark = self.dark.load(Ordering::Relaxed);
        match (role, dark) {
            (Role::Heading, false) => AnsiColors::Blue,
            (Role::Heading, true) => AnsiColors::BrightCyan,
            (Role::Accent, false) => AnsiColors::Magenta,
            (Role::Accent, true) => AnsiColors::BrightMagenta,
            (Role::Muted, false) => AnsiColors::Black,
            (Role::Muted, true) => AnsiColors::BrightBlack,
            (Role::Good, false) => AnsiColors::Green,
            (Role::Good, true) => AnsiColors::BrightGreen,
            (Role::Warn, false) => AnsiColors::Yellow,
            (Role::Warn, true) => AnsiColors::BrightYellow,
            (Role::Bad, false) => AnsiColors::Red,
            (Role::Bad, true) => AnsiColors::BrightRed,
        }
    }

    fn paint(&self, role: Role, text: &str) -> String {
        if self.enabled {
            text.color(self.color(role)).to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn heading(&self, text: &str) -> String {
        if self.enabled {
            text.color(self.color(Role::Heading)).bold().to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn accent(&self, text: &str) -> String {
        self.paint(Role::Accent, text)
    }

    pub fn muted(&self, text: &str) -> String {
        self.paint(Role::Muted, text)
    }

    pub fn status(&self, status: ListingStatus) -> String {
        let role = match status {
            ListingStatus::Pending => Role::Good,
            ListingStatus::Claimed => Role::Warn,
            ListingStatus::Completed => Role::Muted,
        };
        self.paint(role, &status.to_string())
    }

    pub fn notification(&self, kind: NotificationKind, message: &str) -> String {
        let (role, mark) = match kind {
            NotificationKind::Success => (Role::Good, "✓"),
            NotificationKind::Error => (Role::Bad, "✗"),
            NotificationKind::Info => (Role::Accent, "•"),
        };
        format!("{} {message}", self.paint(role, mark))
    }
}

impl VisualMode for Palette {
    fn apply(&self, theme: Theme) {
        self.dark.store(theme.is_dark(), Ordering::Relaxed);
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views are not tables.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Status line on stderr, respecting quiet mode.
pub fn print_status(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ── Format-specific renderers ────────────────────────────────────────

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Config(format!("YAML output failed: {e}")))
}

/// Coarse "how long ago" for timestamps in detail views.
pub fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let plural = |n: i64, unit: &str| format!("{n} {unit}{} ago", if n == 1 { "" } else { "s" });
    match elapsed.num_minutes() {
        m if m < 1 => "just now".into(),
        m if m < 60 => plural(m, "minute"),
        _ if elapsed.num_hours() < 24 => plural(elapsed.num_hours(), "hour"),
        _ if elapsed.num_days() < 30 => plural(elapsed.num_days(), "day"),
        _ => plural(elapsed.num_days() / 30, "month"),
    }
}

/// Shorten `text` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
