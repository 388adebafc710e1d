// ── Table query builder ──
//
// Renders filters, ordering, and ranges into the table API's query
// string grammar (`col=eq.v`, `or=(a.ilike.*x*,b.ilike.*x*)`,
// `order=col.desc`, `offset`/`limit`).

/// Sort direction for an `order=` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// A single row predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq { column: String, value: String },
    /// `column <> value`
    Neq { column: String, value: String },
    /// Case-insensitive substring match against any of the columns.
    AnyILike { columns: Vec<String>, needle: String },
}

/// Inclusive row range, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    pub fn row_count(&self) -> u64 {
        self.to.saturating_sub(self.from) + 1
    }
}

/// A read (or the filter part of a write) against a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    columns: Option<String>,
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
    range: Option<RowRange>,
    exact_count: bool,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned columns (defaults to `*`).
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::Neq {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    /// Match rows where any of `columns` contains `needle`, ignoring case.
    ///
    /// Characters that carry meaning inside an `or=(...)` group are
    /// stripped from the needle. A needle that is empty after trimming
    /// adds no filter.
    pub fn ilike_any(mut self, columns: &[&str], needle: &str) -> Self {
        let needle = sanitize_search_text(needle);
        if !needle.is_empty() {
            self.filters.push(Filter::AnyILike {
                columns: columns.iter().map(|c| (*c).to_owned()).collect(),
                needle,
            });
        }
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    /// Inclusive row range, like `.range(from, to)` in the JS SDK.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some(RowRange {
            from,
            to: to.max(from),
        });
        self
    }

    pub fn limit(self, count: u64) -> Self {
        self.range(0, count.max(1) - 1)
    }

    /// Ask the backend for the exact number of matching rows.
    pub fn exact_count(mut self) -> Self {
        self.exact_count = true;
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn row_range(&self) -> Option<RowRange> {
        self.range
    }

    pub fn wants_exact_count(&self) -> bool {
        self.exact_count
    }

    /// Full parameter list for a read.
    pub(crate) fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_owned(),
            self.columns.clone().unwrap_or_else(|| "*".to_owned()),
        )];
        params.extend(self.filter_params());

        if let Some((ref column, direction)) = self.order {
            params.push(("order".to_owned(), format!("{column}.{}", direction.as_str())));
        }
        if let Some(range) = self.range {
            params.push(("offset".to_owned(), range.from.to_string()));
            params.push(("limit".to_owned(), range.row_count().to_string()));
        }
        params
    }

    /// Only the row predicates, for `PATCH` / `DELETE`.
    pub(crate) fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| match f {
                Filter::Eq { column, value } => (column.clone(), format!("eq.{value}")),
                Filter::Neq { column, value } => (column.clone(), format!("neq.{value}")),
                Filter::AnyILike { columns, needle } => {
                    let alternatives: Vec<String> = columns
                        .iter()
                        .map(|c| format!("{c}.ilike.*{needle}*"))
                        .collect();
                    ("or".to_owned(), format!("({})", alternatives.join(",")))
                }
            })
            .collect()
    }
}

/// Strip characters that carry meaning inside an `or=(...)` group or an
/// `ilike` pattern, then trim. An empty result means "no text filter".
pub fn sanitize_search_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '_' | '\\' | '"'))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Parse the total from a `Content-Range` header (`0-11/15`, `*/15`).
/// Returns `None` when the total is unknown (`0-11/*`).
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(q: &TableQuery) -> Vec<(String, String)> {
        q.to_params()
    }

    #[test]
    fn default_query_selects_everything() {
        assert_eq!(
            pairs(&TableQuery::new()),
            vec![("select".to_owned(), "*".to_owned())]
        );
    }

    #[test]
    fn renders_filters_order_and_range() {
        let q = TableQuery::new()
            .eq("category", "Furniture")
            .eq("condition", "GOOD")
            .ilike_any(&["title", "description"], "sofa")
            .order("title", Direction::Ascending)
            .range(12, 23)
            .exact_count();

        assert_eq!(
            pairs(&q),
            vec![
                ("select".to_owned(), "*".to_owned()),
                ("category".to_owned(), "eq.Furniture".to_owned()),
                ("condition".to_owned(), "eq.GOOD".to_owned()),
                (
                    "or".to_owned(),
                    "(title.ilike.*sofa*,description.ilike.*sofa*)".to_owned()
                ),
                ("order".to_owned(), "title.asc".to_owned()),
                ("offset".to_owned(), "12".to_owned()),
                ("limit".to_owned(), "12".to_owned()),
            ]
        );
        assert!(q.wants_exact_count());
    }

    #[test]
    fn blank_needle_adds_no_filter() {
        let q = TableQuery::new().ilike_any(&["title"], "   ");
        assert!(q.filters().is_empty());

        let q = TableQuery::new().ilike_any(&["title"], "(*,)");
        assert!(q.filters().is_empty());
    }

    #[test]
    fn like_wildcards_never_reach_the_pattern() {
        assert_eq!(sanitize_search_text("50%_off"), "50off");
        assert_eq!(sanitize_search_text(" __ "), "");
    }

    #[test]
    fn needle_is_stripped_of_group_syntax() {
        let q = TableQuery::new().ilike_any(&["title"], " chair, (oak) ");
        assert_eq!(
            q.filters(),
            &[Filter::AnyILike {
                columns: vec!["title".to_owned()],
                needle: "chair oak".to_owned(),
            }]
        );
    }

    #[test]
    fn limit_is_a_leading_range() {
        let q = TableQuery::new().limit(4);
        assert_eq!(q.row_range(), Some(RowRange { from: 0, to: 3 }));
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-11/15"), Some(15));
        assert_eq!(parse_content_range_total("*/15"), Some(15));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-11/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }
}
