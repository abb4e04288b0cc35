use serde::{Deserialize, Serialize};

use crate::cart::ItemKind;

/// The authoritative ledger entry for a completed payment.
///
/// At most one order exists per `payment_id` - the ledger store enforces this
/// with a unique index, which is what makes webhook redelivery safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Payment processor's identifier for the settled payment. Natural key
    /// for idempotency.
    pub payment_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    /// The processor-settled amount in cents. Never derived from item
    /// prices - line items may not sum to this.
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub order_items: Vec<OrderItem>,
}

/// A denormalized snapshot of a catalog item at fulfillment time.
///
/// Title and asset URLs are copied from the catalog so the customer's
/// download link stays valid even if the catalog entry later changes.
/// Price is the client-claimed amount, kept for receipt display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    /// Catalog id of the purchased item.
    pub item_id: String,
    pub kind: ItemKind,
    pub title: String,
    pub price_cents: i64,
    pub preview_url: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Paid,
    Refunded,
    Pending,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            "pending" => Some(Self::Pending),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data required to write a new order to the ledger.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub payment_id: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub total_cents: i64,
    pub items: Vec<CreateOrderItem>,
}

/// One materialized line item for a new order.
#[derive(Debug, Clone)]
pub struct CreateOrderItem {
    pub item_id: String,
    pub kind: ItemKind,
    pub title: String,
    pub price_cents: i64,
    pub preview_url: String,
    pub download_url: String,
}
