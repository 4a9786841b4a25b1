//! Icon-set handlers, including the standalone resolution preview.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use graphapi_core::icon_set::{CreateIconSetRequest, IconSetBundle, UpdateIconSetRequest};
use graphapi_store::icon_sets::{IconSetListResponse, IconSetRecord};
use graphapi_store::{ResolveIconSetsRequest, ResolveIconSetsResponse};

use crate::error::ApiError;
use crate::handlers::BundleQuery;
use crate::state::AppState;

/// Request body for setting one icon entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertIconEntryRequest {
    pub icon: String,
}

/// `GET /icon-sets`
pub async fn list(State(state): State<AppState>) -> Result<Json<IconSetListResponse>, ApiError> {
    Ok(Json(state.stores.icon_sets.list()?))
}

/// `POST /icon-sets`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateIconSetRequest>,
) -> Result<Json<IconSetRecord>, ApiError> {
    Ok(Json(state.stores.icon_sets.create(&request)?))
}

/// `GET /icon-sets/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(icon_set_id): Path<String>,
) -> Result<Json<IconSetRecord>, ApiError> {
    Ok(Json(state.stores.icon_sets.get(&icon_set_id)?))
}

/// `PUT /icon-sets/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(icon_set_id): Path<String>,
    Json(request): Json<UpdateIconSetRequest>,
) -> Result<Json<IconSetRecord>, ApiError> {
    Ok(Json(state.stores.icon_sets.update(&icon_set_id, &request)?))
}

/// `GET /icon-sets/{id}/bundle`
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(icon_set_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<IconSetBundle>, ApiError> {
    Ok(Json(state.stores.icon_sets.get_bundle(
        &icon_set_id,
        query.stage,
        query.version,
    )?))
}

/// `POST /icon-sets/{id}/publish`
pub async fn publish(
    State(state): State<AppState>,
    Path(icon_set_id): Path<String>,
) -> Result<Json<IconSetBundle>, ApiError> {
    Ok(Json(state.stores.icon_sets.publish(&icon_set_id)?))
}

/// `PUT /icon-sets/{id}/entries/{key}`
pub async fn upsert_entry(
    State(state): State<AppState>,
    Path((icon_set_id, type_key)): Path<(String, String)>,
    Json(request): Json<UpsertIconEntryRequest>,
) -> Result<Json<IconSetRecord>, ApiError> {
    Ok(Json(state.stores.icon_sets.upsert_entry(
        &icon_set_id,
        &type_key,
        &request.icon,
    )?))
}

/// `DELETE /icon-sets/{id}/entries/{key}`
pub async fn delete_entry(
    State(state): State<AppState>,
    Path((icon_set_id, type_key)): Path<(String, String)>,
) -> Result<Json<IconSetRecord>, ApiError> {
    Ok(Json(
        state.stores.icon_sets.delete_entry(&icon_set_id, &type_key)?,
    ))
}

/// `POST /icon-sets/resolve`
pub async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveIconSetsRequest>,
) -> Result<Json<ResolveIconSetsResponse>, ApiError> {
    Ok(Json(state.stores.resolve_icon_sets(&request)?))
}
