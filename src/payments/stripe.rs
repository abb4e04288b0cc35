use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::cart::CartEntry;
use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

// Note: line items are built ad-hoc from the cart via price_data, so the
// Stripe dashboard needs no pre-configured products. The serialized cart
// rides along in metadata[cart] and comes back on the completion webhook.

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

/// A checkout session as retrieved from the Stripe API (success-page lookup).
#[derive(Debug, Deserialize)]
pub struct CheckoutSessionInfo {
    pub id: String,
    pub payment_intent: Option<String>,
    pub payment_status: String,
}

impl CheckoutSessionInfo {
    /// The identifier orders are keyed on. Sessions without a payment_intent
    /// fall back to the session id so the key is always present.
    pub fn payment_id(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Create a Stripe checkout session for a cart.
    ///
    /// Line items are priced from the client-claimed cart amounts; the cart
    /// snapshot itself is attached as `metadata[cart]` so fulfillment can
    /// reconcile it against the catalog when the payment completes. Returns
    /// (session_id, hosted checkout URL).
    pub async fn create_checkout_session(
        &self,
        items: &[CartEntry],
        customer_email: Option<&str>,
        cart_json: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<(String, String)> {
        // {CHECKOUT_SESSION_ID} is expanded by Stripe on redirect, which is
        // how the success page finds its order.
        let success_url = format!("{}?session_id={{CHECKOUT_SESSION_ID}}", success_url);

        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), success_url),
            ("cancel_url".into(), cancel_url.to_string()),
            ("metadata[cart]".into(), cart_json.to_string()),
        ];

        if let Some(email) = customer_email {
            form.push(("customer_email".into(), email.to_string()));
        }

        for (i, item) in items.iter().enumerate() {
            form.push((
                format!("line_items[{}][price_data][currency]", i),
                "usd".into(),
            ));
            form.push((
                format!("line_items[{}][price_data][product_data][name]", i),
                item.claimed_title.clone(),
            ));
            form.push((
                format!("line_items[{}][price_data][unit_amount]", i),
                item.claimed_price_cents.to_string(),
            ));
            form.push((format!("line_items[{}][quantity]", i), "1".into()));
        }

        let response = self
            .client
            .post("https://api.stripe.com/v1/checkout/sessions")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok((session.id, session.url))
    }

    /// Retrieve a checkout session by id (used by the success-page lookup).
    pub async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionInfo> {
        let response = self
            .client
            .get(format!(
                "https://api.stripe.com/v1/checkout/sessions/{}",
                session_id
            ))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound("Checkout session not found".into()));
        }
        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let parts: Vec<&str> = signature.split(',').collect();

        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in parts {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;

        // Parse and validate timestamp to prevent replay attacks.
        // Reject webhooks older than WEBHOOK_TIMESTAMP_TOLERANCE_SECS.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid timestamp in signature".into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Also reject timestamps from the future (clock skew tolerance: 60 seconds)
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        // Construct signed payload
        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        // Compute expected signature
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Use constant-time comparison to prevent timing attacks.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        // Length check is not constant-time, but that's fine - signature length
        // is not secret (it's always 64 hex chars for SHA-256)
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    /// Settled amount in cents. Authoritative for the order total.
    pub amount_total: Option<i64>,
    pub payment_intent: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub metadata: Option<StripeSessionMetadata>,
}

impl StripeCheckoutSession {
    /// Email as entered at checkout: the session-level address when the
    /// session was created with one, otherwise what the customer typed in.
    pub fn resolved_email(&self) -> Option<String> {
        self.customer_email
            .clone()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.clone()))
    }

    pub fn resolved_name(&self) -> Option<String> {
        self.customer_details.as_ref().and_then(|d| d.name.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSessionMetadata {
    /// The serialized cart snapshot attached at session creation.
    pub cart: Option<String>,
}

// ============ refund.created ============

#[derive(Debug, Deserialize)]
pub struct StripeRefundEvent {
    pub id: String,
    pub status: String,
    pub payment_intent: Option<String>,
    pub charge: Option<String>,
}
