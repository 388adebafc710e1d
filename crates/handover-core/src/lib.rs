//! Data layer between `handover-api` and the CLI.
//!
//! This crate owns the business logic and domain model of the handover
//! donation marketplace:
//!
//! - **[`Marketplace`]**: central facade managing the full lifecycle:
//!   [`connect()`](Marketplace::connect) builds the service clients and
//!   spawns the command processor. [`Marketplace::oneshot()`] provides a
//!   lightweight mode for single CLI invocations.
//!
//! - **Listing search** ([`search`]): [`SearchCriteria`] turns the search
//!   view's text, category, condition, sort, and page into one remote
//!   query; [`SearchDebouncer`] keeps only the last keystroke.
//!
//! - **Realtime reconciliation** ([`reconcile`]): [`ResultSet::apply`]
//!   folds row changes into a held page; [`LiveSearch`] drives it from
//!   the realtime channel and publishes snapshots on a `watch` channel.
//!
//! - **Client state** ([`state`]): [`AppState`] holds the session user,
//!   loading flag, notification queue, and theme. Only the theme is
//!   persisted.
//!
//! - **[`Command`]**: typed listing writes routed through an `mpsc`
//!   channel to the marketplace's command processor. Reads bypass the
//!   channel.

pub mod command;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod model;
pub mod reconcile;
pub mod search;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::{ListingDraft, PhotoUpload, content_type_for, validate_photos};
pub use command::{Command, CommandResult, UploadProgress};
pub use config::{BackendConfig, TlsVerification};
pub use error::CoreError;
pub use marketplace::{ConnectionState, Marketplace, SignUpOutcome};
pub use reconcile::{ChangeEvent, ListingSource, LiveSearch, LiveSnapshot, Outcome, ResultSet};
pub use search::{PAGE_SIZE, SearchCriteria, SearchDebouncer, SearchPage, SortKey};
pub use state::{
    AppState, FileStorage, MemoryStorage, Notification, NotificationId, NotificationKind,
    StateStorage, Theme, VisualMode,
};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Category, CategoryFilter, Condition, Dashboard, DashboardStats, Dimensions, Listing,
    ListingDetail, ListingId, ListingStatus, NewProfile, Profile, RelatedListing, Review, Role,
    SessionUser, UserId,
};
