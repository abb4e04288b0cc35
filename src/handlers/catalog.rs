//! Public catalog endpoints plus admin catalog management.

use axum::extract::State;
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::models::{CreateMidi, Midi};
use crate::pagination::{CursorPage, CursorQuery};

/// Lazily list the catalog, newest first.
pub async fn list_midi(
    State(state): State<AppState>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<CursorPage<Midi>>> {
    let conn = state.db.get()?;
    let (items, has_more) = queries::list_midis_page(&conn, query.limit(), query.last_id.as_deref())?;
    Ok(Json(CursorPage::new(items, has_more, |m| m.id.clone())))
}

pub async fn get_midi(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Midi>> {
    let conn = state.db.get()?;
    let midi = queries::get_midi_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound("MIDI file not found".into()))?;
    Ok(Json(midi))
}

/// Create a catalog item. Admin-key guarded; the storefront itself never
/// writes the catalog outside of sale counters.
pub async fn create_midi(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateMidi>,
) -> Result<Json<Midi>> {
    require_admin_key(&state, &headers)?;
    input.validate()?;

    let conn = state.db.get()?;
    let midi = queries::create_midi(&conn, &input)?;

    tracing::info!(midi_id = %midi.id, name = %midi.name, "Catalog item created");
    Ok(Json(midi))
}

/// Check the Authorization bearer token against the configured admin key.
/// With no key configured, management endpoints are disabled entirely.
fn require_admin_key(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        return Err(AppError::Unauthorized);
    };

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    // Constant-time comparison; the length check leaks only the key length.
    if provided.len() != expected.len() {
        return Err(AppError::Unauthorized);
    }
    if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}
