use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{query_all, query_one, MIDI_COLS, ORDER_COLS, ORDER_ITEM_COLS};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Catalog ============

/// Create a catalog item.
pub fn create_midi(conn: &Connection, input: &CreateMidi) -> Result<Midi> {
    let id = EntityType::Midi.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO midi_files (id, name, price_cents, key, scale, bpm, genre, preview_url, download_url, hidden, sale_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)",
        params![
            &id,
            &input.name,
            input.price_cents,
            &input.key,
            &input.scale,
            input.bpm,
            &input.genre,
            &input.preview_url,
            &input.download_url,
            input.hidden,
            now,
        ],
    )?;

    Ok(Midi {
        id,
        name: input.name.clone(),
        price_cents: input.price_cents,
        key: input.key.clone(),
        scale: input.scale.clone(),
        bpm: input.bpm,
        genre: input.genre.clone(),
        preview_url: input.preview_url.clone(),
        download_url: input.download_url.clone(),
        hidden: input.hidden,
        sale_count: 0,
        created_at: now,
    })
}

pub fn get_midi_by_id(conn: &Connection, id: &str) -> Result<Option<Midi>> {
    query_one(
        conn,
        &format!("SELECT {} FROM midi_files WHERE id = ?1", MIDI_COLS),
        &[&id],
    )
}

/// List non-hidden catalog items newest-first with a last-seen-id cursor.
///
/// Returns the page plus a "more available" flag. The flag is computed by
/// over-fetching one row, so it is accurate even when the page boundary
/// falls exactly on the end of the catalog.
pub fn list_midis_page(
    conn: &Connection,
    limit: i64,
    last_id: Option<&str>,
) -> Result<(Vec<Midi>, bool)> {
    let mut items: Vec<Midi> = match last_id {
        Some(last_id) => {
            // Resolve the cursor row; a stale or garbage cursor just starts
            // from the top rather than erroring.
            let cursor: Option<(i64, String)> = query_one::<Midi>(
                conn,
                &format!("SELECT {} FROM midi_files WHERE id = ?1", MIDI_COLS),
                &[&last_id],
            )?
            .map(|m| (m.created_at, m.id));

            match cursor {
                Some((created_at, id)) => query_all(
                    conn,
                    &format!(
                        "SELECT {} FROM midi_files
                         WHERE hidden = 0 AND (created_at < ?1 OR (created_at = ?1 AND id < ?2))
                         ORDER BY created_at DESC, id DESC LIMIT ?3",
                        MIDI_COLS
                    ),
                    &[&created_at, &id, &(limit + 1)],
                )?,
                None => list_first_page(conn, limit)?,
            }
        }
        None => list_first_page(conn, limit)?,
    };

    let has_more = items.len() as i64 > limit;
    items.truncate(limit as usize);
    Ok((items, has_more))
}

fn list_first_page(conn: &Connection, limit: i64) -> Result<Vec<Midi>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM midi_files WHERE hidden = 0
             ORDER BY created_at DESC, id DESC LIMIT ?1",
            MIDI_COLS
        ),
        &[&(limit + 1)],
    )
}

/// Atomically increment a catalog item's sale counter.
///
/// The increment is a single UPDATE against the stored value, so concurrent
/// fulfillments of the same item cannot lose updates. Returns false if the
/// item no longer exists.
pub fn increment_sale_count(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE midi_files SET sale_count = sale_count + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(affected > 0)
}

pub fn count_midis(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM midi_files", [], |row| row.get(0))?;
    Ok(count)
}

// ============ Orders ============

/// Outcome of an order write attempt.
#[derive(Debug)]
pub enum OrderWrite {
    /// The order was committed.
    Created(Order),
    /// An order already exists for this payment_id - idempotent no-op.
    Duplicate,
}

/// Persist an order and its items as a single atomic write.
///
/// The unique index on payment_id is checked by the INSERT itself: a
/// violation means another delivery of the same event won the race, which is
/// reported as `Duplicate`, not an error. Any other failure rolls the whole
/// write back so the delivering system can safely retry the event.
pub fn create_order(conn: &mut Connection, input: &CreateOrder) -> Result<OrderWrite> {
    let order_id = EntityType::Order.gen_id();
    let now = now();
    let status = OrderStatus::Paid;

    let tx = conn.transaction()?;

    let inserted = tx.execute(
        "INSERT INTO orders (id, payment_id, customer_email, customer_name, total_cents, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &order_id,
            &input.payment_id,
            &input.customer_email,
            &input.customer_name,
            input.total_cents,
            status.as_str(),
            now,
        ],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            // Transaction rolls back on drop; nothing was written.
            return Ok(OrderWrite::Duplicate);
        }
        Err(e) => return Err(e.into()),
    }

    let mut order_items = Vec::with_capacity(input.items.len());
    for (position, item) in input.items.iter().enumerate() {
        let item_row_id = EntityType::OrderItem.gen_id();
        tx.execute(
            "INSERT INTO order_items (id, order_id, item_id, kind, title, price_cents, preview_url, download_url, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &item_row_id,
                &order_id,
                &item.item_id,
                item.kind.as_str(),
                &item.title,
                item.price_cents,
                &item.preview_url,
                &item.download_url,
                position as i64,
            ],
        )?;
        order_items.push(OrderItem {
            id: item_row_id,
            item_id: item.item_id.clone(),
            kind: item.kind,
            title: item.title.clone(),
            price_cents: item.price_cents,
            preview_url: item.preview_url.clone(),
            download_url: item.download_url.clone(),
        });
    }

    tx.commit()?;

    Ok(OrderWrite::Created(Order {
        id: order_id,
        payment_id: input.payment_id.clone(),
        customer_email: input.customer_email.clone(),
        customer_name: input.customer_name.clone(),
        total_cents: input.total_cents,
        status,
        created_at: now,
        order_items,
    }))
}

/// Point lookup of an order by its payment identifier, items included.
pub fn get_order_by_payment_id(conn: &Connection, payment_id: &str) -> Result<Option<Order>> {
    let order: Option<Order> = query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE payment_id = ?1", ORDER_COLS),
        &[&payment_id],
    )?;

    match order {
        Some(mut order) => {
            order.order_items = get_order_items(conn, &order.id)?;
            Ok(Some(order))
        }
        None => Ok(None),
    }
}

pub fn get_order_items(conn: &Connection, order_id: &str) -> Result<Vec<OrderItem>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM order_items WHERE order_id = ?1 ORDER BY position",
            ORDER_ITEM_COLS
        ),
        &[&order_id],
    )
}

/// Mark the order for a payment as refunded. Returns false if no order
/// exists for the payment id. Idempotent - marking twice is harmless.
pub fn mark_order_refunded(conn: &Connection, payment_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'refunded' WHERE payment_id = ?1",
        params![payment_id],
    )?;
    Ok(affected > 0)
}

pub fn count_orders(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
    Ok(count)
}
