// ── Listing domain types ──
//
// Mirrors a row of the `announcements` table. Enumerations carry the exact
// wire spellings the table stores; human labels live on the types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::ids::{ListingId, UserId};

// ── Category ────────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    Furniture,
    Electronics,
    Clothing,
    Books,
    Kitchen,
    Sports,
    Toys,
    Tools,
    /// Also the landing spot for categories this client does not know.
    #[serde(other)]
    Other,
}

/// Category selection in a search. `All` is the "All Categories" sentinel
/// and applies no filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub const ALL_LABEL: &'static str = "All Categories";

    pub fn category(self) -> Option<Category> {
        match self {
            Self::All => None,
            Self::Only(c) => Some(c),
        }
    }
}

impl std::fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(Self::ALL_LABEL),
            Self::Only(c) => write!(f, "{c}"),
        }
    }
}

impl std::str::FromStr for CategoryFilter {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case(Self::ALL_LABEL)
        {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

impl From<Option<Category>> for CategoryFilter {
    fn from(c: Option<Category>) -> Self {
        c.map_or(Self::All, Self::Only)
    }
}

// ── Condition ───────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Condition {
    LikeNew,
    #[default]
    Good,
    Worn,
    Broken,
}

impl Condition {
    pub fn label(self) -> &'static str {
        match self {
            Self::LikeNew => "Like New",
            Self::Good => "Good",
            Self::Worn => "Worn",
            Self::Broken => "Needs Repair",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::LikeNew => "Item is in perfect condition",
            Self::Good => "Item shows minimal wear",
            Self::Worn => "Item shows visible signs of use",
            Self::Broken => "Item needs fixing before use",
        }
    }
}

// ── ListingStatus ───────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum ListingStatus {
    /// Available for pickup.
    #[default]
    Pending,
    Claimed,
    Completed,
}

// ── Listing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub unit: String,
}

/// A donated item offered for pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub category: Category,
    pub condition: Condition,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    /// Public photo URLs, in display order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<String>,
    /// Free-text tags; unique, in insertion order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub pickup_instructions: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
    #[serde(default)]
    pub claimed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listing {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id == *user
    }
}

/// Slim projection used for "related items".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedListing {
    pub id: ListingId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<String>,
    pub condition: Condition,
    #[serde(default)]
    pub status: ListingStatus,
}

impl RelatedListing {
    /// Column list for the projection.
    pub const COLUMNS: &'static str = "id,title,photos,condition,status";
}

/// Nullable columns that the domain treats as "empty".
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
