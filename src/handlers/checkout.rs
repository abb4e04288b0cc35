//! Checkout session creation.
//!
//! Builds a hosted Stripe checkout from the client's cart. The cart is
//! advisory: line items are priced from the claimed amounts for display at
//! checkout, and the full snapshot is attached as session metadata so
//! fulfillment can reconcile it against the catalog once payment settles.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::cart::{CartEntry, ItemKind};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::Json;

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutCartItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub title: String,
    /// Claimed price in decimal dollars, as held client-side.
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutCartItem>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let entries: Vec<CartEntry> = request
        .items
        .iter()
        .map(|item| CartEntry {
            id: item.id.clone(),
            kind: item.kind,
            claimed_title: item.title.clone(),
            claimed_price_cents: (item.price * 100.0).round() as i64,
        })
        .collect();

    // The snapshot round-trips through Stripe metadata exactly as received;
    // fulfillment treats it as untrusted and re-resolves against the catalog.
    let cart_json = serde_json::to_string(&request.items)?;

    let (session_id, checkout_url) = state
        .stripe
        .create_checkout_session(
            &entries,
            request.email.as_deref(),
            &cart_json,
            &state.success_url,
            &state.cancel_url,
        )
        .await?;

    Ok(Json(CheckoutResponse {
        checkout_url,
        session_id,
    }))
}
