//! Cursor pagination types for list endpoints.
//!
//! The catalog is listed newest-first with a last-seen-id cursor, so clients
//! can lazily load pages without offsets drifting as new items are added.

use serde::{Deserialize, Serialize};

/// Query parameters for cursor-paginated list endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct CursorQuery {
    /// Maximum number of items to return (default: 10, max: 50)
    #[serde(default)]
    pub limit: Option<i64>,
    /// ID of the last item seen on the previous page
    #[serde(default)]
    pub last_id: Option<String>,
}

impl CursorQuery {
    /// Get the limit, clamped to valid range
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 50)
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Serialize)]
pub struct CursorPage<T> {
    /// The items in this page
    pub items: Vec<T>,
    /// Whether more items exist beyond this page
    pub has_more: bool,
    /// Cursor to pass as `last_id` for the next page (None on an empty page)
    pub last_id: Option<String>,
}

impl<T> CursorPage<T> {
    /// Build a page from items and a next-page flag, deriving the cursor.
    pub fn new(items: Vec<T>, has_more: bool, id_of: impl Fn(&T) -> String) -> Self {
        let last_id = items.last().map(&id_of);
        Self {
            items,
            has_more,
            last_id,
        }
    }
}
