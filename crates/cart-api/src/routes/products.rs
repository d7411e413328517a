//! Catalog endpoints.

use axum::Json;
use axum::extract::{Path, State};

use sundry_core::{CatalogRecord, ItemId};

use crate::error::ApiError;
use crate::state::ApiState;

/// `GET /api/products` - all catalog records.
pub async fn list_products(State(state): State<ApiState>) -> Json<Vec<CatalogRecord>> {
    Json(state.catalog_records())
}

/// `GET /api/products/{id}` - one catalog record, 404 for unknown ids.
pub async fn get_product(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<CatalogRecord>, ApiError> {
    let id = ItemId::new(id);
    state
        .catalog_record(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("product {id}")))
}
