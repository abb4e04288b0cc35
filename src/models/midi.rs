use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A purchasable MIDI file in the catalog.
///
/// All fields except `sale_count` are managed by catalog flows; fulfillment
/// only ever increments `sale_count`. Rows are never deleted by fulfillment,
/// so committed orders keep valid asset references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Midi {
    pub id: String,
    pub name: String,
    /// Canonical list price in cents. Display only - settlement always comes
    /// from the payment processor.
    pub price_cents: i64,
    pub key: Option<String>,
    pub scale: Option<String>,
    pub bpm: Option<i32>,
    pub genre: Option<String>,
    pub preview_url: String,
    pub download_url: String,
    /// Hidden items are excluded from public listing but still resolvable
    /// by id (a checkout started before hiding must still fulfill).
    pub hidden: bool,
    /// Number of completed sales. Mutated only by fulfillment, one atomic
    /// increment per fulfilled order containing this item.
    pub sale_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMidi {
    pub name: String,
    pub price_cents: i64,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default)]
    pub bpm: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    pub preview_url: String,
    pub download_url: String,
    #[serde(default)]
    pub hidden: bool,
}

impl CreateMidi {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("Name must not be empty".into()));
        }
        if self.price_cents < 0 {
            return Err(AppError::BadRequest("Price must not be negative".into()));
        }
        if self.preview_url.trim().is_empty() || self.download_url.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Preview and download URLs are required".into(),
            ));
        }
        Ok(())
    }
}
