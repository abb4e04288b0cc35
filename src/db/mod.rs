mod schema;
pub mod queries;

pub use schema::init_db;

pub mod from_row;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::Mailer;
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and external collaborators
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL of this service (for logging and absolute links)
    pub base_url: String,
    /// Where the hosted checkout sends customers after payment
    pub success_url: String,
    /// Where the hosted checkout sends customers who abandon payment
    pub cancel_url: String,
    /// Stripe API client (checkout sessions, webhook verification)
    pub stripe: StripeClient,
    /// Outbound email transport (receipts and sale alerts)
    pub mailer: Arc<dyn Mailer>,
    /// Destination for internal sale alerts (None = disabled)
    pub admin_email: Option<String>,
    /// Bearer key guarding catalog management (None = endpoints disabled)
    pub admin_api_key: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
    });
    Pool::builder().max_size(10).build(manager)
}
