//! Stripe webhook endpoint.
//!
//! The single inbound event boundary. Signature verification happens before
//! the payload is parsed into domain data and before any database access -
//! an unverifiable payload is rejected with nothing read or written.
//!
//! Response contract for the delivering system: 2xx means consumed
//! (including duplicates and tolerated anomalies), 4xx means rejected, and
//! 5xx means retry later - only a failed ledger write returns 5xx, and in
//! that case nothing was committed so the retry is safe.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};

use crate::db::{queries, AppState};
use crate::email;
use crate::fulfillment::{self, CheckoutEvent, FulfillmentOutcome};
use crate::payments::{StripeCheckoutSession, StripeRefundEvent, StripeWebhookEvent};

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/stripe", post(handle_stripe_webhook))
}

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Extract and verify the signature before touching anything else.
    let signature = match extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match state.stripe.verify_webhook_signature(&body, &signature) {
        Ok(true) => {}
        Ok(false) => return (StatusCode::UNAUTHORIZED, "Invalid signature"),
        Err(e) => {
            tracing::debug!("Malformed Stripe signature header: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature header");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        "refund.created" => handle_refund_created(&state, &event),
        _ => (StatusCode::OK, "Event ignored"),
    }
}

fn extract_signature(headers: &HeaderMap) -> Result<String, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

/// Run the fulfillment pipeline for a completed checkout session.
async fn handle_checkout_completed(state: &AppState, event: &StripeWebhookEvent) -> WebhookResult {
    let session: StripeCheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to parse checkout session: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid checkout session");
        }
    };

    if session.payment_status != "paid" {
        return (StatusCode::OK, "Event ignored");
    }

    let customer_email = session.resolved_email();
    let customer_name = session.resolved_name();
    let cart_json = session.metadata.and_then(|m| m.cart);

    // Use payment_intent as the order's payment id; sessions without one
    // fall back to the session id so the idempotency key is always present.
    let payment_id = session.payment_intent.unwrap_or(session.id);

    let checkout = CheckoutEvent {
        payment_id,
        settled_cents: session.amount_total.unwrap_or(0),
        customer_email,
        customer_name,
        cart_json,
    };

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let order = match fulfillment::fulfill_checkout(&mut conn, &checkout) {
        Ok(FulfillmentOutcome::Fulfilled(order)) => order,
        Ok(FulfillmentOutcome::AlreadyProcessed) => {
            return (StatusCode::OK, "Already processed");
        }
        Err(e) => {
            // Nothing committed - a 5xx tells Stripe to redeliver later.
            tracing::error!(payment_id = %checkout.payment_id, "Fulfillment failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Fulfillment failed");
        }
    };

    // The order is committed; everything from here is best-effort fan-out
    // and must not turn the response into a retry signal.
    fulfillment::record_item_sales(&conn, &order);

    let mailer = state.mailer.clone();
    let admin_email = state.admin_email.clone();
    tokio::spawn(async move {
        email::send_order_notifications(mailer.as_ref(), &order, admin_email.as_deref()).await;
    });

    (StatusCode::OK, "OK")
}

/// Mark the matching order refunded. Reconciliation beyond the status flag
/// is handled outside this service.
fn handle_refund_created(state: &AppState, event: &StripeWebhookEvent) -> WebhookResult {
    let refund: StripeRefundEvent = match serde_json::from_value(event.data.object.clone()) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to parse refund: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid refund");
        }
    };

    // Only process succeeded refunds
    if refund.status != "succeeded" {
        return (StatusCode::OK, "Refund not succeeded");
    }

    // Prefer payment_intent for order linkage, fall back to charge ID
    let payment_id = match refund.payment_intent.or(refund.charge) {
        Some(id) => id,
        None => {
            tracing::error!("Refund {} has no payment_intent or charge", refund.id);
            return (StatusCode::BAD_REQUEST, "Refund missing payment reference");
        }
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match queries::mark_order_refunded(&conn, &payment_id) {
        Ok(true) => {
            tracing::info!(payment_id = %payment_id, refund_id = %refund.id, "Order marked refunded");
            (StatusCode::OK, "OK")
        }
        Ok(false) => {
            // No matching order - return OK so the provider stops retrying.
            tracing::warn!(
                payment_id = %payment_id,
                refund_id = %refund.id,
                "No order found for refund"
            );
            (StatusCode::OK, "Order not found")
        }
        Err(e) => {
            tracing::error!("DB error marking refund: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}
