use serde::{Deserialize, Serialize};

pub const NULL_TEXT: &str = "NULL";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    /// First cell of the first row, for single-value queries such as `count(*)`.
    pub fn scalar(&self) -> Option<&str> {
        self.rows.first()?.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    pub page: i64,
    pub limit: i64,
    /// Rows matched by the count query, when it succeeded.
    pub total: Option<i64>,
    pub rows_on_page: usize,
}

impl PaginationState {
    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .max(0)
            .saturating_mul(self.limit.max(0))
    }

    /// Number of pages in `[1, ceil(total / limit)]`; never less than one.
    pub fn total_pages(&self) -> Option<i64> {
        let total = self.total?;
        if total <= 0 || self.limit <= 0 {
            return Some(1);
        }
        Some((total - 1) / self.limit + 1)
    }

    pub fn is_past_end(&self) -> bool {
        matches!(self.total_pages(), Some(pages) if self.page > pages)
    }

    pub fn status(&self) -> String {
        let pages = self
            .total_pages()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        let total = self
            .total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());

        if self.rows_on_page == 0 {
            return format!("Page {}/{}  |  No rows on this page ({} total)", self.page, pages, total);
        }

        let rows = i64::try_from(self.rows_on_page).unwrap_or(i64::MAX);
        let first = self.offset().saturating_add(1);
        let last = self.offset().saturating_add(rows);
        format!(
            "Page {}/{}  |  Rows {}–{} of {}",
            self.page, pages, first, last, total
        )
    }
}
