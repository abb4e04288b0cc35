//! Checkout fulfillment pipeline.
//!
//! Turns a verified "checkout completed" payment event into an order record,
//! per-item sale counters, and (from the webhook handler) notifications.
//! The pipeline per event: idempotency check, snapshot decode, catalog
//! reconciliation, atomic ledger write, then best-effort fan-out. Only the
//! ledger write may fail the invocation; everything after it is tolerated
//! and logged.

use rusqlite::Connection;

use crate::cart::{self, CartEntry, ItemKind};
use crate::db::queries::{self, OrderWrite};
use crate::error::Result;
use crate::models::{CreateOrder, CreateOrderItem, Order};

/// Domain view of a verified checkout-completed payment event.
///
/// Arrives zero or more times for the same logical payment - the delivering
/// system retries until it sees a 2xx.
#[derive(Debug, Clone)]
pub struct CheckoutEvent {
    /// Payment processor identifier for the settled payment. Unique per
    /// logical payment; the idempotency key.
    pub payment_id: String,
    /// Processor-settled amount in cents. Authoritative for the order total
    /// regardless of what the cart claims.
    pub settled_cents: i64,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    /// Opaque client-originated cart snapshot captured at session creation.
    pub cart_json: Option<String>,
}

/// Result of running the fulfillment pipeline for one event delivery.
#[derive(Debug)]
pub enum FulfillmentOutcome {
    /// A new order was committed.
    Fulfilled(Order),
    /// An order already exists for this payment - idempotent no-op, no
    /// downstream step runs again.
    AlreadyProcessed,
}

/// Join decoded snapshot entries with the catalog to build the order's items.
///
/// Only entries that resolve survive: `pack` entries are recognized but not
/// yet fulfillable, and unknown ids are dropped. Title and asset URLs come
/// from the catalog; the claimed price is kept for receipt display only.
pub fn materialize_order_items(
    conn: &Connection,
    entries: &[CartEntry],
) -> Result<Vec<CreateOrderItem>> {
    let mut items = Vec::with_capacity(entries.len());

    for entry in entries {
        match entry.kind {
            ItemKind::Midi => match queries::get_midi_by_id(conn, &entry.id)? {
                Some(midi) => items.push(CreateOrderItem {
                    item_id: midi.id,
                    kind: ItemKind::Midi,
                    title: midi.name,
                    price_cents: entry.claimed_price_cents,
                    preview_url: midi.preview_url,
                    download_url: midi.download_url,
                }),
                None => {
                    tracing::warn!(
                        item_id = %entry.id,
                        "Cart entry not found in catalog, dropping from order"
                    );
                }
            },
            ItemKind::Pack => {
                // Packs are recognized in carts but not yet sold through
                // fulfillment; they never block the rest of the order.
                tracing::debug!(item_id = %entry.id, "Dropping pack cart entry (unsupported)");
            }
        }
    }

    Ok(items)
}

/// Run the fulfillment pipeline for one event delivery, up to and including
/// the ledger write.
///
/// Counter updates and notifications are fan-out steps owned by the caller;
/// they run only on `Fulfilled` and never roll the order back. An `Err` here
/// means nothing was committed and the event is safe to retry.
pub fn fulfill_checkout(conn: &mut Connection, event: &CheckoutEvent) -> Result<FulfillmentOutcome> {
    // Fast-path duplicate check. The unique index on payment_id is what
    // actually closes the race - this just avoids decoding and catalog work
    // for the common retry case.
    if queries::get_order_by_payment_id(conn, &event.payment_id)?.is_some() {
        tracing::info!(payment_id = %event.payment_id, "Order already exists, skipping fulfillment");
        return Ok(FulfillmentOutcome::AlreadyProcessed);
    }

    let entries = match event.cart_json.as_deref() {
        Some(raw) => cart::decode_cart_snapshot(raw),
        None => {
            tracing::warn!(payment_id = %event.payment_id, "Payment event has no cart snapshot");
            Vec::new()
        }
    };

    let items = materialize_order_items(conn, &entries)?;

    if items.is_empty() {
        // Still a valid order: the money settled, and the record must exist
        // even if the snapshot was empty or nothing resolved.
        tracing::warn!(
            payment_id = %event.payment_id,
            decoded_entries = entries.len(),
            "Order will be written with zero items"
        );
    }

    let input = CreateOrder {
        payment_id: event.payment_id.clone(),
        customer_email: event.customer_email.clone(),
        customer_name: event.customer_name.clone(),
        total_cents: event.settled_cents,
        items,
    };

    match queries::create_order(conn, &input)? {
        OrderWrite::Created(order) => {
            tracing::info!(
                order_id = %order.id,
                payment_id = %order.payment_id,
                items = order.order_items.len(),
                total_cents = order.total_cents,
                "Order fulfilled"
            );
            Ok(FulfillmentOutcome::Fulfilled(order))
        }
        OrderWrite::Duplicate => {
            tracing::info!(
                payment_id = %event.payment_id,
                "Concurrent delivery already wrote this order"
            );
            Ok(FulfillmentOutcome::AlreadyProcessed)
        }
    }
}

/// Increment the sale counter for every fulfilled catalog item.
///
/// Runs after the order commit, once per item independently. Each increment
/// is a single atomic UPDATE against the stored value, so concurrent
/// fulfillments of the same item all land. A failed increment is logged and
/// skipped - it under-counts a popularity signal, it does not touch money.
pub fn record_item_sales(conn: &Connection, order: &Order) {
    for item in &order.order_items {
        if item.kind != ItemKind::Midi {
            continue;
        }
        match queries::increment_sale_count(conn, &item.item_id) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    item_id = %item.item_id,
                    order_id = %order.id,
                    "Catalog item missing while recording sale"
                );
            }
            Err(e) => {
                tracing::warn!(
                    item_id = %item.item_id,
                    order_id = %order.id,
                    "Failed to record sale: {}",
                    e
                );
            }
        }
    }
}
