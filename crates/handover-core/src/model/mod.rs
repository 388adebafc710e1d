// ── Domain model ──
//
// Typed rows and page aggregates. Consumers never see raw JSON.

mod detail;
mod ids;
mod listing;
mod user;

pub use detail::{Dashboard, DashboardStats, ListingDetail};
pub use ids::{ListingId, UserId};
pub use listing::{
    Category, CategoryFilter, Condition, Dimensions, Listing, ListingStatus, RelatedListing,
};
pub use user::{NewProfile, Profile, Review, Reviewer, Role, SessionUser, mean_rating};
