//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models can implement to
//! define how they are constructed from database rows, plus helper functions
//! for common query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::cart::ItemKind;
use crate::models::*;

/// Parse a string column into an enum, converting parse failures to rusqlite
/// errors instead of panicking on corrupt values.
fn parse_enum<T>(
    row: &Row,
    col: usize,
    col_name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    /// Construct an instance from a database row.
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const MIDI_COLS: &str = "id, name, price_cents, key, scale, bpm, genre, preview_url, download_url, hidden, sale_count, created_at";

pub const ORDER_COLS: &str =
    "id, payment_id, customer_email, customer_name, total_cents, status, created_at";

pub const ORDER_ITEM_COLS: &str =
    "id, item_id, kind, title, price_cents, preview_url, download_url";

// ============ FromRow Implementations ============

impl FromRow for Midi {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Midi {
            id: row.get(0)?,
            name: row.get(1)?,
            price_cents: row.get(2)?,
            key: row.get(3)?,
            scale: row.get(4)?,
            bpm: row.get(5)?,
            genre: row.get(6)?,
            preview_url: row.get(7)?,
            download_url: row.get(8)?,
            hidden: row.get(9)?,
            sale_count: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            payment_id: row.get(1)?,
            customer_email: row.get(2)?,
            customer_name: row.get(3)?,
            total_cents: row.get(4)?,
            status: parse_enum(row, 5, "status", OrderStatus::from_str)?,
            created_at: row.get(6)?,
            // Items are loaded by a second query keyed on the order id.
            order_items: Vec::new(),
        })
    }
}

impl FromRow for OrderItem {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderItem {
            id: row.get(0)?,
            item_id: row.get(1)?,
            kind: parse_enum(row, 2, "kind", ItemKind::from_str)?,
            title: row.get(3)?,
            price_cents: row.get(4)?,
            preview_url: row.get(5)?,
            download_url: row.get(6)?,
        })
    }
}
