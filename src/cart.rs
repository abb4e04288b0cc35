//! Cart snapshot decoding.
//!
//! The cart a customer checks out with is captured client-side and attached
//! to the payment session as an opaque JSON string. By the time the webhook
//! delivers it back, it is untrusted metadata: decoding is lenient, dropping
//! anything malformed instead of failing the whole fulfillment.

use serde::{Deserialize, Serialize};

/// Kind of purchasable catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Midi,
    Pack,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Midi => "midi",
            Self::Pack => "pack",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "midi" => Some(Self::Midi),
            "pack" => Some(Self::Pack),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One decoded cart snapshot entry. Exists only transiently between decoding
/// and materialization; the claimed title and price are display hints, never
/// settlement data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub id: String,
    pub kind: ItemKind,
    pub claimed_title: String,
    pub claimed_price_cents: i64,
}

/// Raw wire shape of a snapshot entry. Every field optional so one bad
/// entry never poisons its siblings.
#[derive(Debug, Deserialize)]
struct RawEntry {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    price: Option<f64>,
}

/// Convert a claimed decimal price to cents.
fn price_to_cents(price: f64) -> i64 {
    if price.is_finite() {
        (price * 100.0).round() as i64
    } else {
        0
    }
}

/// Decode an untrusted cart snapshot into entries, order preserved.
///
/// Entries missing `id` or `type`, or with an unrecognized `type`, are
/// silently dropped. An unparseable blob yields an empty sequence - an
/// order with zero items is valid (and logged upstream as an anomaly).
pub fn decode_cart_snapshot(raw: &str) -> Vec<CartEntry> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(serde_json::Value::Array(values)) => values,
        Ok(_) => {
            tracing::warn!("Cart snapshot is not a JSON array, treating as empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Cart snapshot is not valid JSON, treating as empty: {}", e);
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| {
            let raw: RawEntry = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!("Dropping undecodable cart entry: {}", e);
                    return None;
                }
            };

            let id = raw.id.filter(|id| !id.is_empty())?;
            let kind = raw.kind.as_deref().and_then(ItemKind::from_str)?;

            Some(CartEntry {
                id,
                kind,
                claimed_title: raw.title.unwrap_or_default(),
                claimed_price_cents: raw.price.map(price_to_cents).unwrap_or(0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_snapshot() {
        let raw = r#"[
            {"id": "mm_midi_1", "type": "midi", "title": "Night Drive", "price": 4.99},
            {"id": "mm_pack_1", "type": "pack", "title": "Lofi Pack", "price": 19.0}
        ]"#;

        let entries = decode_cart_snapshot(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "mm_midi_1");
        assert_eq!(entries[0].kind, ItemKind::Midi);
        assert_eq!(entries[0].claimed_title, "Night Drive");
        assert_eq!(entries[0].claimed_price_cents, 499);
        assert_eq!(entries[1].kind, ItemKind::Pack);
        assert_eq!(entries[1].claimed_price_cents, 1900);
    }

    #[test]
    fn test_malformed_entries_dropped_not_fatal() {
        let raw = r#"[
            {"id": "mm_midi_1", "type": "midi", "title": "Keeper", "price": 1.0},
            {"type": "midi", "title": "No id"},
            {"id": "mm_midi_2", "title": "No type"},
            {"id": "mm_midi_3", "type": "vinyl", "title": "Unknown type"},
            "not even an object",
            {"id": "", "type": "midi", "title": "Empty id"}
        ]"#;

        let entries = decode_cart_snapshot(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].claimed_title, "Keeper");
    }

    #[test]
    fn test_missing_title_and_price_tolerated() {
        let raw = r#"[{"id": "mm_midi_1", "type": "midi"}]"#;

        let entries = decode_cart_snapshot(raw);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].claimed_title, "");
        assert_eq!(entries[0].claimed_price_cents, 0);
    }

    #[test]
    fn test_corrupt_blob_yields_empty() {
        assert!(decode_cart_snapshot("not json at all").is_empty());
        assert!(decode_cart_snapshot("{\"id\": \"x\"}").is_empty());
        assert!(decode_cart_snapshot("").is_empty());
        assert!(decode_cart_snapshot("[]").is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let raw = r#"[
            {"id": "b", "type": "midi", "title": "", "price": 0},
            {"id": "a", "type": "midi", "title": "", "price": 0}
        ]"#;

        let entries = decode_cart_snapshot(raw);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_price_rounding() {
        let raw = r#"[{"id": "a", "type": "midi", "price": 4.999}]"#;
        let entries = decode_cart_snapshot(raw);
        assert_eq!(entries[0].claimed_price_cents, 500);
    }
}
