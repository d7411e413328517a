//! Cart record endpoints.
//!
//! Writes are idempotent full-snapshot replacements. The record invariants
//! (quantities in `1..=100`, no duplicate ids) are enforced here with 422;
//! clients clamp before sending, so a violation is a client bug.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::instrument;

use sundry_core::CartRecord;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::ApiState;

/// `GET /api/cart` - the caller's cart record, empty if none stored.
pub async fn get_cart(State(state): State<ApiState>, Identity(identity): Identity) -> Json<CartRecord> {
    Json(state.cart(&identity))
}

/// `PUT /api/cart` - replace the caller's cart record wholesale.
#[instrument(skip(state, record), fields(identity = %identity.0, lines = record.items.len()))]
pub async fn put_cart(
    State(state): State<ApiState>,
    identity: Identity,
    Json(record): Json<CartRecord>,
) -> Result<StatusCode, ApiError> {
    record
        .validate()
        .map_err(|error| ApiError::Validation(error.to_string()))?;
    state.replace_cart(identity.0, record);
    Ok(StatusCode::NO_CONTENT)
}
