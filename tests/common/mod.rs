//! Test utilities and fixtures for midimart integration tests

#![allow(dead_code)]

use std::sync::Mutex;

use futures::future::BoxFuture;
use rusqlite::Connection;

pub use midimart::cart::ItemKind;
pub use midimart::db::{init_db, queries};
pub use midimart::email::Mailer;
pub use midimart::error::{AppError, Result};
pub use midimart::fulfillment::{self, CheckoutEvent, FulfillmentOutcome};
pub use midimart::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test catalog item with default asset URLs
pub fn seed_midi(conn: &Connection, name: &str, price_cents: i64) -> Midi {
    let input = CreateMidi {
        name: name.to_string(),
        price_cents,
        key: Some("Am".to_string()),
        scale: Some("minor".to_string()),
        bpm: Some(120),
        genre: Some("lofi".to_string()),
        preview_url: format!("https://assets.test/previews/{}.mp3", name),
        download_url: format!("https://assets.test/files/{}.mid", name),
        hidden: false,
    };
    queries::create_midi(conn, &input).expect("Failed to seed catalog item")
}

/// Create a hidden test catalog item
pub fn seed_hidden_midi(conn: &Connection, name: &str) -> Midi {
    let input = CreateMidi {
        name: name.to_string(),
        price_cents: 100,
        key: None,
        scale: None,
        bpm: None,
        genre: None,
        preview_url: format!("https://assets.test/previews/{}.mp3", name),
        download_url: format!("https://assets.test/files/{}.mid", name),
        hidden: true,
    };
    queries::create_midi(conn, &input).expect("Failed to seed hidden catalog item")
}

/// Build a cart snapshot JSON string from (id, type, title, price) tuples
pub fn cart_json(entries: &[(&str, &str, &str, f64)]) -> String {
    let values: Vec<serde_json::Value> = entries
        .iter()
        .map(|(id, kind, title, price)| {
            serde_json::json!({
                "id": id,
                "type": kind,
                "title": title,
                "price": price,
            })
        })
        .collect();
    serde_json::to_string(&values).expect("Failed to serialize cart")
}

/// Build a checkout event with an email and the given cart snapshot
pub fn checkout_event(payment_id: &str, settled_cents: i64, cart: Option<String>) -> CheckoutEvent {
    CheckoutEvent {
        payment_id: payment_id.to_string(),
        settled_cents,
        customer_email: Some("buyer@example.com".to_string()),
        customer_name: Some("Test Buyer".to_string()),
        cart_json: cart,
    }
}

/// Path for a throwaway file-backed test database (needed when multiple
/// connections must see the same data, e.g. concurrency tests)
pub fn temp_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("midimart-test-{}.db", uuid::Uuid::new_v4().as_simple()))
}

/// Mailer that records every send and can be told to fail for one recipient.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail_for: Option<String>,
}

impl RecordingMailer {
    pub fn failing_for(recipient: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(recipient.to_string()),
        }
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _)| to.clone())
            .collect()
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        _html: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_for.as_deref() == Some(to) {
                return Err(AppError::Internal("simulated transport failure".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        })
    }
}
