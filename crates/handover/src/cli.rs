//! Clap derive structures for the `handover` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Also compiled by `build.rs` for man pages, so nothing here may depend
//! on crates other than clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// handover -- give things away, find things for free
#[derive(Debug, Parser)]
#[command(
    name = "handover",
    version,
    about = "Browse and manage donation listings from the command line",
    long_about = "A CLI for the handover donation marketplace.\n\n\
        Search listings with live updates, post and edit your own donations,\n\
        and keep an eye on your dashboard.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "HANDOVER_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Project URL (overrides profile)
    #[arg(long, env = "HANDOVER_URL", global = true)]
    pub url: Option<String>,

    /// Project anon key (overrides profile)
    #[arg(long, env = "HANDOVER_ANON_KEY", global = true, hide_env_values = true)]
    pub anon_key: Option<String>,

    /// Account email for commands that need a session
    #[arg(long, short = 'e', env = "HANDOVER_EMAIL", global = true)]
    pub email: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HANDOVER_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates (local stacks only)
    #[arg(long, short = 'k', env = "HANDOVER_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "HANDOVER_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Listing value enums ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// No category filter
    All,
    Furniture,
    Electronics,
    Clothing,
    Books,
    Kitchen,
    Sports,
    Toys,
    Tools,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConditionArg {
    /// Item is in perfect condition
    LikeNew,
    /// Item shows minimal wear
    Good,
    /// Item shows visible signs of use
    Worn,
    /// Item needs fixing before use
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Available for pickup
    Pending,
    Claimed,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RoleArg {
    /// Gives items away
    #[default]
    Donor,
    /// Looks for items
    Beneficiary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    Newest,
    Oldest,
    TitleAsc,
    TitleDesc,
    RatingDesc,
    RatingAsc,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search available listings
    #[command(alias = "s")]
    Search(SearchArgs),

    /// Show, post, edit, and delete listings
    #[command(alias = "l", alias = "ls")]
    Listings(ListingsArgs),

    /// Your own listings with totals
    #[command(alias = "dash")]
    Dashboard,

    /// Sign up, log in, and check the current account
    Auth(AuthArgs),

    /// Show or switch the output theme
    Theme(ThemeArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SEARCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Words to match in the title or description
    pub text: Option<String>,

    /// Only this category
    #[arg(long, short = 'c', default_value = "all")]
    pub category: CategoryArg,

    /// Only this condition
    #[arg(long)]
    pub condition: Option<ConditionArg>,

    /// Sort order
    #[arg(long, short = 's', default_value = "newest")]
    pub sort: SortArg,

    /// Page number (12 listings per page)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Keep the results current and read new search text from stdin,
    /// one query per line
    #[arg(long, short = 'w')]
    pub watch: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LISTINGS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ListingsArgs {
    #[command(subcommand)]
    pub command: ListingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ListingsCommand {
    /// Show one listing with its donor, reviews, and related items
    #[command(alias = "get")]
    Show {
        /// Listing ID
        id: String,
    },

    /// Post a new listing
    #[command(alias = "new")]
    Create(CreateArgs),

    /// Edit one of your listings
    Edit(EditArgs),

    /// Delete one of your listings and its photos
    #[command(alias = "rm")]
    Delete {
        /// Listing ID
        id: String,
    },

    /// Add or remove a listing from your favorites
    #[command(alias = "fav")]
    Favorite {
        /// Listing ID
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Read the listing fields from a JSON file (flags override it)
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,

    /// Title (up to 50 characters)
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Description (up to 500 characters)
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'c')]
    pub category: Option<CategoryArg>,

    #[arg(long)]
    pub condition: Option<ConditionArg>,

    /// Pickup location
    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// Pickup instructions
    #[arg(long)]
    pub pickup: Option<String>,

    /// Tag (repeatable, up to 5)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Dimensions as LENGTHxWIDTHxHEIGHT
    #[arg(long)]
    pub dimensions: Option<String>,

    /// Unit for --dimensions
    #[arg(long, default_value = "cm", requires = "dimensions")]
    pub unit: String,

    /// Photo file to upload (repeatable, up to 5)
    #[arg(long = "photo")]
    pub photos: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Listing ID
    pub id: String,

    #[arg(long, short = 't')]
    pub title: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'c')]
    pub category: Option<CategoryArg>,

    #[arg(long)]
    pub condition: Option<ConditionArg>,

    #[arg(long)]
    pub status: Option<StatusArg>,

    #[arg(long, short = 'l')]
    pub location: Option<String>,

    #[arg(long)]
    pub pickup: Option<String>,

    /// Replace the tags (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Remove all tags
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,

    /// Dimensions as LENGTHxWIDTHxHEIGHT
    #[arg(long)]
    pub dimensions: Option<String>,

    #[arg(long, default_value = "cm", requires = "dimensions")]
    pub unit: String,

    /// Photo file to add (repeatable)
    #[arg(long = "photo")]
    pub photos: Vec<PathBuf>,

    /// Position (1-based) of an existing photo to remove (repeatable)
    #[arg(long = "remove-photo", value_parser = clap::value_parser!(u32).range(1..))]
    pub remove_photos: Vec<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  AUTH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Create an account
    Signup {
        /// Account email
        email: String,

        /// Full name shown on your listings
        #[arg(long)]
        name: Option<String>,

        /// Register as a donor or a beneficiary
        #[arg(long, value_enum, default_value_t = RoleArg::Donor)]
        role: RoleArg,
    },

    /// Check your credentials and optionally remember the password
    Login {
        /// Store the password in the system keyring
        #[arg(long)]
        save: bool,
    },

    /// Forget the stored password and end the session
    Logout,

    /// Show the signed-in account
    Whoami,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  THEME
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ThemeArgs {
    /// New theme; omit to print the current one
    pub mode: Option<ThemeChoice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeChoice {
    Light,
    Dark,
    /// Switch to the other theme
    Toggle,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a profile value
    Set {
        /// Key (url, anon_key_env, email, bucket, channel, insecure, timeout, ca_cert)
        key: String,

        /// Value to set
        value: String,
    },

    /// Store the anon key in the system keyring
    SetKey {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
