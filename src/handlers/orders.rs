//! Order lookup for the post-payment success page.
//!
//! The success page is keyed by the checkout session the customer returned
//! from. Fulfillment runs on the webhook, which may lag the redirect - so a
//! verified session with no order yet reads as "pending", never as an error.

use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::AppError;
use crate::extractors::{Json, Query};
use crate::models::Order;

const NOT_FOUND_MESSAGE: &str =
    "We couldn't find your order. Please contact support if you have any questions.";
const PENDING_MESSAGE: &str =
    "Your payment is still being processed. Check back in a moment.";

#[derive(Debug, Deserialize)]
pub struct OrderLookupQuery {
    /// Checkout session id the customer was redirected back with.
    pub session: String,
}

#[derive(Debug, Serialize)]
pub struct OrderLookupResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub async fn lookup_order(
    State(state): State<AppState>,
    Query(query): Query<OrderLookupQuery>,
) -> (StatusCode, Json<OrderLookupResponse>) {
    // Resolve the session with Stripe; an unverifiable session gets the
    // neutral message, not an error page.
    let session = match state.stripe.get_checkout_session(&query.session).await {
        Ok(s) => s,
        Err(AppError::NotFound(_)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(OrderLookupResponse {
                    status: "not_found",
                    order: None,
                    message: Some(NOT_FOUND_MESSAGE),
                }),
            );
        }
        Err(e) => {
            tracing::error!(session = %query.session, "Failed to resolve checkout session: {}", e);
            return (
                StatusCode::NOT_FOUND,
                Json(OrderLookupResponse {
                    status: "not_found",
                    order: None,
                    message: Some(NOT_FOUND_MESSAGE),
                }),
            );
        }
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (
                StatusCode::NOT_FOUND,
                Json(OrderLookupResponse {
                    status: "not_found",
                    order: None,
                    message: Some(NOT_FOUND_MESSAGE),
                }),
            );
        }
    };

    match queries::get_order_by_payment_id(&conn, session.payment_id()) {
        Ok(Some(order)) => (
            StatusCode::OK,
            Json(OrderLookupResponse {
                status: "complete",
                order: Some(order),
                message: None,
            }),
        ),
        Ok(None) => {
            // Payment verified but the webhook hasn't landed yet.
            (
                StatusCode::OK,
                Json(OrderLookupResponse {
                    status: "pending",
                    order: None,
                    message: Some(PENDING_MESSAGE),
                }),
            )
        }
        Err(e) => {
            tracing::error!("DB error looking up order: {}", e);
            (
                StatusCode::NOT_FOUND,
                Json(OrderLookupResponse {
                    status: "not_found",
                    order: None,
                    message: Some(NOT_FOUND_MESSAGE),
                }),
            )
        }
    }
}
