//! Email notifications for completed orders.
//!
//! Two independent sends per order: a customer receipt with download links
//! (skipped when the payment event carried no email) and a fixed-destination
//! admin sale alert. Email is a best-effort side channel - a failed send is
//! logged and lost, and never affects the committed order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Order;

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Outbound email transport: send(to, subject, htmlBody), fire-and-forget.
///
/// Success or failure is observable only to the caller; there is no delivery
/// guarantee and no retry queue beyond what an implementation does inline.
pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, to: &'a str, subject: &'a str, html: &'a str)
        -> BoxFuture<'a, Result<()>>;
}

/// Format a Unix timestamp as a human-readable date (e.g., "Jan 15, 2024")
fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown date".to_string())
}

/// Format cents as a dollar amount (e.g., "$4.99")
fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{}${}.{:02}", sign, cents / 100, cents % 100)
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Mailer backed by the Resend API.
#[derive(Clone)]
pub struct ResendMailer {
    /// Resend API key (None = email disabled, sends are logged and skipped)
    api_key: Option<String>,
    /// "from" address for all outbound mail
    from_email: String,
    http_client: Client,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::new(),
        }
    }

    /// Send via Resend with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    /// Fails immediately on non-transient errors (4xx except 429).
    async fn send_with_retry(&self, api_key: &str, to: &str, subject: &str, html: &str) -> Result<()> {
        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to],
            subject,
            html,
        };

        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            // Sleep before retry (skip on first attempt)
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying email send after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, &request).await {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::info!(attempt, to = %to, "Email sent successfully after retry");
                    } else {
                        tracing::info!(to = %to, subject = %subject, "Email sent via Resend");
                    }
                    return Ok(());
                }
                Err((error, is_transient)) => {
                    if is_transient {
                        last_error = Some(error);
                        // Continue to next retry
                    } else {
                        // Non-transient error, fail immediately
                        return Err(error);
                    }
                }
            }
        }

        // All retries exhausted
        tracing::error!(
            to = %to,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Send a single request to Resend.
    ///
    /// Returns Ok(()) on success, or Err((AppError, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                // Network errors are transient
                (
                    AppError::Internal(format!("Email service error: {}", e)),
                    true,
                )
            })?;

        let status = response.status();

        if status.is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Internal("Email service response error".into()), false)
            })?;
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();

            // Determine if error is transient (should retry)
            let is_transient = status.as_u16() == 429 // Rate limited
                || status.is_server_error(); // 5xx errors

            if is_transient {
                tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
            } else {
                tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
            }

            Err((
                AppError::Internal(format!("Email service error: {} - {}", status, body)),
                is_transient,
            ))
        }
    }
}

impl Mailer for ResendMailer {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        html: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(api_key) = self.api_key.as_deref() else {
                tracing::debug!(to = %to, "No Resend API key configured, skipping email");
                return Ok(());
            };
            self.send_with_retry(api_key, to, subject, html).await
        })
    }
}

/// Build the customer receipt email from a committed order.
pub fn build_receipt(order: &Order) -> (String, String) {
    let subject = format!("Your midimart order ({})", format_price(order.total_cents));
    let date = format_date(order.created_at);

    let mut item_blocks = String::new();
    for item in &order.order_items {
        item_blocks.push_str(&format!(
            r#"<div style="margin-bottom: 16px; padding: 12px; background: #f5f5f5; border-radius: 8px;">
<p style="margin: 0 0 4px 0;"><strong>{}</strong> <span style="color: #666; font-size: 14px;">{}</span></p>
<p style="margin: 0;"><a href="{}">Download</a> &middot; <a href="{}">Preview</a></p>
</div>"#,
            item.title,
            format_price(item.price_cents),
            item.download_url,
            item.preview_url
        ));
    }
    if order.order_items.is_empty() {
        item_blocks.push_str(
            r#"<p style="color: #666;">We could not match the items in your cart. Reply to this email and we will sort it out.</p>"#,
        );
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Thanks for your order!</h2>
<p>Your payment of <strong>{}</strong> on {} went through. Your downloads:</p>
{}
<p style="color: #666;">Keep this email - the download links do not expire.</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">Questions? Just reply to this email.</p>
</body>
</html>"#,
        format_price(order.total_cents),
        date,
        item_blocks
    );

    (subject, html)
}

/// Build the internal sale alert email from a committed order.
pub fn build_admin_alert(order: &Order) -> (String, String) {
    let subject = format!(
        "New sale: {} item(s), {}",
        order.order_items.len(),
        format_price(order.total_cents)
    );

    let mut rows = String::new();
    for item in &order.order_items {
        rows.push_str(&format!(
            "<li>{} ({}) - {}</li>",
            item.title,
            item.kind,
            format_price(item.price_cents)
        ));
    }

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;">
<h3>New order {}</h3>
<p>Payment: {}<br>Customer: {}<br>Total: {}</p>
<ul>{}</ul>
</body>
</html>"#,
        order.id,
        order.payment_id,
        order.customer_email.as_deref().unwrap_or("(no email)"),
        format_price(order.total_cents),
        rows
    );

    (subject, html)
}

/// Send the customer receipt and the admin alert for a committed order.
///
/// The two sends are independent: each failure is caught and logged, and
/// neither blocks the other. The receipt is skipped entirely when the
/// payment event carried no customer email.
pub async fn send_order_notifications(mailer: &dyn Mailer, order: &Order, admin_email: Option<&str>) {
    match order.customer_email.as_deref() {
        Some(to) => {
            let (subject, html) = build_receipt(order);
            if let Err(e) = mailer.send(to, &subject, &html).await {
                tracing::warn!(order_id = %order.id, "Failed to send receipt email: {}", e);
            }
        }
        None => {
            tracing::warn!(
                order_id = %order.id,
                "No customer email on payment event, skipping receipt"
            );
        }
    }

    if let Some(to) = admin_email {
        let (subject, html) = build_admin_alert(order);
        if let Err(e) = mailer.send(to, &subject, &html).await {
            tracing::warn!(order_id = %order.id, "Failed to send admin sale alert: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0), "$0.00");
        assert_eq!(format_price(499), "$4.99");
        assert_eq!(format_price(12000), "$120.00");
        assert_eq!(format_price(-350), "-$3.50");
    }

    #[test]
    fn test_retry_delays_configuration() {
        // Verify retry configuration is sensible
        assert_eq!(RETRY_DELAYS.len(), 3, "Should have 3 retry attempts");
        assert_eq!(RETRY_DELAYS, &[1, 4, 16], "Exponential backoff: 1s, 4s, 16s");

        // Total max wait time should be reasonable (21 seconds)
        let total_delay: u64 = RETRY_DELAYS.iter().sum();
        assert_eq!(total_delay, 21);
    }
}
