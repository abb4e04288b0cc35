use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Catalog of purchasable MIDI files.
        -- sale_count is mutated only by fulfillment; everything else by
        -- catalog-management flows. Rows are never deleted by fulfillment.
        CREATE TABLE IF NOT EXISTS midi_files (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            key TEXT,
            scale TEXT,
            bpm INTEGER,
            genre TEXT,
            preview_url TEXT NOT NULL,
            download_url TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0,
            sale_count INTEGER NOT NULL DEFAULT 0 CHECK (sale_count >= 0),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_midi_files_listing
            ON midi_files(created_at DESC, id DESC) WHERE hidden = 0;

        -- Order ledger. The unique index on payment_id is the idempotency
        -- guard: concurrent deliveries of the same payment event cannot both
        -- insert, regardless of what any pre-check saw.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            payment_id TEXT NOT NULL,
            customer_email TEXT,
            customer_name TEXT,
            total_cents INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('paid', 'refunded', 'pending', 'failed')),
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_payment ON orders(payment_id);
        CREATE INDEX IF NOT EXISTS idx_orders_created ON orders(created_at DESC);

        -- Denormalized line items, immutable once written with their order.
        -- position preserves cart order for the receipt.
        CREATE TABLE IF NOT EXISTS order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            item_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('midi', 'pack')),
            title TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            preview_url TEXT NOT NULL,
            download_url TEXT NOT NULL,
            position INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id, position);
        CREATE INDEX IF NOT EXISTS idx_order_items_item ON order_items(item_id);
        "#,
    )?;
    Ok(())
}
