//! Listing parameters shared by every collection endpoint.

use serde::{Deserialize, Serialize};

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page a single request may ask for.
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Search and paging parameters for get-all queries.
///
/// `offset` is a 1-based page number, not a row count; the row offset is
/// `(offset - 1) * limit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Case-insensitive substring matched against the primary display field.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl ListFilter {
    /// Page size clamped to `1..=MAX_PAGE_LIMIT`.
    #[must_use]
    pub fn page_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Number of rows to skip. Pages below 1 are treated as the first page.
    #[must_use]
    pub fn row_offset(&self) -> i64 {
        let page = self.offset.unwrap_or(1).max(1);
        (page - 1).saturating_mul(self.page_limit())
    }

    /// `ILIKE` pattern for the search term, or `None` when no search applies.
    ///
    /// `%`, `_` and `\` in the term are escaped so they match literally.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref().map(str::trim).unwrap_or_default();
        if term.is_empty() {
            return None;
        }
        let mut escaped = String::with_capacity(term.len() + 2);
        escaped.push('%');
        for ch in term.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        escaped.push('%');
        Some(escaped)
    }
}
