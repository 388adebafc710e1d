// ── Listing query builder ──
//
// Turns the search view's filter/sort/page selection into one table
// query, and evaluates the same predicate locally for the reconciler.

use handover_api::{Direction, TableQuery, sanitize_search_text};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::model::{CategoryFilter, Condition, Listing};

/// Table holding listings.
pub const LISTINGS_TABLE: &str = "announcements";

/// Rows per result page.
pub const PAGE_SIZE: u32 = 12;

/// Columns the free-text query is matched against.
const TEXT_COLUMNS: [&str; 2] = ["title", "description"];

// ── SortKey ─────────────────────────────────────────────────────────

/// Sort options, with wire form `field-direction`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
pub enum SortKey {
    #[default]
    #[strum(serialize = "created_at-desc", serialize = "newest")]
    NewestFirst,
    #[strum(serialize = "created_at-asc", serialize = "oldest")]
    OldestFirst,
    #[strum(serialize = "title-asc")]
    TitleAsc,
    #[strum(serialize = "title-desc")]
    TitleDesc,
    #[strum(serialize = "rating-desc")]
    RatingHighLow,
    #[strum(serialize = "rating-asc")]
    RatingLowHigh,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            Self::NewestFirst | Self::OldestFirst => "created_at",
            Self::TitleAsc | Self::TitleDesc => "title",
            Self::RatingHighLow | Self::RatingLowHigh => "rating",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::OldestFirst | Self::TitleAsc | Self::RatingLowHigh => Direction::Ascending,
            Self::NewestFirst | Self::TitleDesc | Self::RatingHighLow => Direction::Descending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NewestFirst => "Newest First",
            Self::OldestFirst => "Oldest First",
            Self::TitleAsc => "Name A-Z",
            Self::TitleDesc => "Name Z-A",
            Self::RatingHighLow => "Rating High-Low",
            Self::RatingLowHigh => "Rating Low-High",
        }
    }
}

// ── SearchCriteria ──────────────────────────────────────────────────

/// The search view's current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Free text matched against title and description, ignoring case.
    pub text: String,
    pub category: CategoryFilter,
    pub condition: Option<Condition>,
    pub sort: SortKey,
    page: u32,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            text: String::new(),
            category: CategoryFilter::All,
            condition: None,
            sort: SortKey::default(),
            page: 1,
        }
    }
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }

    pub fn with_condition(mut self, condition: Option<Condition>) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// 1-based page; 0 is treated as 1.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Inclusive row range for the current page.
    pub fn row_range(&self) -> (u64, u64) {
        let size = u64::from(PAGE_SIZE);
        let page = u64::from(self.page());
        ((page - 1) * size, page * size - 1)
    }

    /// The single remote query for this selection.
    pub fn to_table_query(&self) -> TableQuery {
        let mut query = TableQuery::new();

        if let Some(category) = self.category.category() {
            query = query.eq("category", category);
        }
        if let Some(condition) = self.condition {
            query = query.eq("condition", condition);
        }
        query = query.ilike_any(&TEXT_COLUMNS, &self.text);

        let (from, to) = self.row_range();
        query
            .order(self.sort.column(), self.sort.direction())
            .range(from, to)
            .exact_count()
    }

    /// Whether `listing` satisfies this selection's filters.
    pub fn matches(&self, listing: &Listing) -> bool {
        if self.category.category().is_some_and(|c| c != listing.category) {
            return false;
        }
        if self.condition.is_some_and(|c| c != listing.condition) {
            return false;
        }

        let needle = sanitize_search_text(&self.text).to_lowercase();
        needle.is_empty()
            || listing.title.to_lowercase().contains(&needle)
            || listing.description.to_lowercase().contains(&needle)
    }
}

// ── SearchPage ──────────────────────────────────────────────────────

/// One page of results with the total match count.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<Listing>,
    pub total: u64,
    pub page: u32,
}

impl SearchPage {
    /// `ceil(total / PAGE_SIZE)`
    pub fn page_count(&self) -> u32 {
        u32::try_from(self.total.div_ceil(u64::from(PAGE_SIZE))).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Category;
    use handover_api::Filter;
    use serde_json::json;

    fn listing(title: &str, description: &str, category: &str, condition: &str) -> Listing {
        serde_json::from_value(json!({
            "id": title, "user_id": "u1", "title": title, "description": description,
            "category": category, "condition": condition, "status": "PENDING",
            "created_at": "2026-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn sort_keys_round_trip_their_wire_form() {
        for key in <SortKey as strum::IntoEnumIterator>::iter() {
            let wire = key.to_string();
            assert_eq!(wire.parse::<SortKey>().unwrap(), key);
            assert_eq!(wire, format!("{}-{}", key.column(), match key.direction() {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            }));
        }
        assert_eq!(SortKey::default().to_string(), "created_at-desc");
    }

    #[test]
    fn page_ranges() {
        let c = SearchCriteria::new();
        assert_eq!(c.row_range(), (0, 11));
        assert_eq!(c.clone().with_page(2).row_range(), (12, 23));
        assert_eq!(c.with_page(0).page(), 1);
    }

    #[test]
    fn query_carries_every_filter() {
        let q = SearchCriteria::new()
            .with_text("oak")
            .with_category(CategoryFilter::Only(Category::Furniture))
            .with_condition(Some(Condition::Good))
            .with_sort(SortKey::TitleAsc)
            .to_table_query();

        assert_eq!(
            q.filters(),
            &[
                Filter::Eq {
                    column: "category".into(),
                    value: "Furniture".into()
                },
                Filter::Eq {
                    column: "condition".into(),
                    value: "GOOD".into()
                },
                Filter::AnyILike {
                    columns: vec!["title".into(), "description".into()],
                    needle: "oak".into()
                },
            ]
        );
        assert!(q.wants_exact_count());
    }

    #[test]
    fn empty_text_and_all_categories_filter_nothing() {
        let q = SearchCriteria::new().with_text("  ").to_table_query();
        assert!(q.filters().is_empty());
    }

    #[test]
    fn local_predicate_matches_remote_semantics() {
        let c = SearchCriteria::new()
            .with_text("CHAIR")
            .with_category(CategoryFilter::Only(Category::Furniture));

        assert!(c.matches(&listing("Oak chair", "", "Furniture", "GOOD")));
        assert!(c.matches(&listing("Seat", "a comfy armchair", "Furniture", "WORN")));
        assert!(!c.matches(&listing("Oak chair", "", "Kitchen", "GOOD")));
        assert!(!c.matches(&listing("Table", "", "Furniture", "GOOD")));

        let c = SearchCriteria::new().with_condition(Some(Condition::Broken));
        assert!(!c.matches(&listing("Lamp", "", "Other", "GOOD")));
        assert!(c.matches(&listing("Lamp", "", "Other", "BROKEN")));

        // The same needle goes to the server: "c_t" is sent as "ct".
        let c = SearchCriteria::new().with_text("c_t");
        assert!(c.matches(&listing("Ctrl key", "", "Other", "GOOD")));
        assert!(!c.matches(&listing("Cat basket", "", "Other", "GOOD")));
    }

    #[test]
    fn page_counts() {
        let page = SearchPage {
            items: Vec::new(),
            total: 15,
            page: 1,
        };
        assert_eq!(page.page_count(), 2);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let last = SearchPage { page: 2, ..page };
        assert!(!last.has_next());
        assert!(last.has_previous());

        assert_eq!(SearchPage::default().page_count(), 0);
        let exact = SearchPage {
            total: 24,
            ..SearchPage::default()
        };
        assert_eq!(exact.page_count(), 2);
    }
}
