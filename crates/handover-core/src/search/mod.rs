// ── Listing search ──
//
// Query construction for the search view plus the debounced submission
// path that feeds it.

mod criteria;
mod debounce;

pub use criteria::{LISTINGS_TABLE, PAGE_SIZE, SearchCriteria, SearchPage, SortKey};
pub use debounce::SearchDebouncer;
