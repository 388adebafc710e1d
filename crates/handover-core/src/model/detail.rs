// ── Page-level aggregates ──
//
// What the detail and dashboard views render, assembled from several
// table reads.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::listing::{Listing, ListingStatus, RelatedListing};
use super::user::{Profile, Review};

/// Everything the detail view shows for one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub listing: Listing,
    pub owner: Profile,
    /// Mean of the owner's review ratings; 0 when unreviewed.
    pub owner_rating: f64,
    pub review_count: usize,
    pub reviews: Vec<Review>,
    /// Up to four other listings in the same category.
    pub related: Vec<RelatedListing>,
    /// Whether the signed-in user has this listing on their wishlist.
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    /// Still available (`PENDING`).
    pub active: usize,
    pub completed: usize,
    /// Distinct users who claimed one of the listings.
    pub beneficiaries: usize,
}

impl DashboardStats {
    pub fn from_listings(items: &[Listing]) -> Self {
        let count = |status: ListingStatus| items.iter().filter(|l| l.status == status).count();
        let beneficiaries: HashSet<_> = items.iter().filter_map(|l| l.claimed_by.as_ref()).collect();

        Self {
            total: items.len(),
            active: count(ListingStatus::Pending),
            completed: count(ListingStatus::Completed),
            beneficiaries: beneficiaries.len(),
        }
    }
}

/// The signed-in donor's own listings, newest first, with totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub items: Vec<Listing>,
    pub stats: DashboardStats,
}

impl Dashboard {
    pub fn new(items: Vec<Listing>) -> Self {
        let stats = DashboardStats::from_listings(&items);
        Self { items, stats }
    }
}
