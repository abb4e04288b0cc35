pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Catalog
        .route("/midi", get(catalog::list_midi).post(catalog::create_midi))
        .route("/midi/{id}", get(catalog::get_midi))
        // Checkout flow
        .route("/checkout/session", post(checkout::create_checkout_session))
        .route("/orders/lookup", get(orders::lookup_order))
        // Payment provider events
        .merge(webhooks::router())
}
