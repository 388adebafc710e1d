// Table API (`rest/v1`): query builder plus the HTTP client that runs it.

mod client;
mod query;

pub use client::{RestClient, Rows};
pub use query::{Direction, Filter, RowRange, TableQuery, sanitize_search_text};
