//! Layout-set handlers.

use axum::extract::{Path, Query, State};
use axum::Json;

use graphapi_core::layout_set::{
    CreateLayoutSetRequest, LayoutSetBundle, UpdateLayoutSetRequest, UpsertLayoutSettingRequest,
};
use graphapi_store::layout_sets::{LayoutSetListResponse, LayoutSetRecord};

use crate::error::ApiError;
use crate::handlers::BundleQuery;
use crate::state::AppState;

/// `GET /layout-sets`
pub async fn list(State(state): State<AppState>) -> Result<Json<LayoutSetListResponse>, ApiError> {
    Ok(Json(state.stores.layout_sets.list()?))
}

/// `POST /layout-sets`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateLayoutSetRequest>,
) -> Result<Json<LayoutSetRecord>, ApiError> {
    Ok(Json(state.stores.layout_sets.create(&request)?))
}

/// `GET /layout-sets/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(layout_set_id): Path<String>,
) -> Result<Json<LayoutSetRecord>, ApiError> {
    Ok(Json(state.stores.layout_sets.get(&layout_set_id)?))
}

/// `PUT /layout-sets/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(layout_set_id): Path<String>,
    Json(request): Json<UpdateLayoutSetRequest>,
) -> Result<Json<LayoutSetRecord>, ApiError> {
    Ok(Json(
        state.stores.layout_sets.update(&layout_set_id, &request)?,
    ))
}

/// `DELETE /layout-sets/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(layout_set_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.stores.layout_sets.delete(&layout_set_id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `GET /layout-sets/{id}/bundle`
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(layout_set_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<LayoutSetBundle>, ApiError> {
    Ok(Json(state.stores.layout_sets.get_bundle(
        &layout_set_id,
        query.stage,
        query.version,
    )?))
}

/// `POST /layout-sets/{id}/publish`
pub async fn publish(
    State(state): State<AppState>,
    Path(layout_set_id): Path<String>,
) -> Result<Json<LayoutSetBundle>, ApiError> {
    Ok(Json(state.stores.layout_sets.publish(&layout_set_id)?))
}

/// `PUT /layout-sets/{id}/entries/{key}`
pub async fn upsert_entry(
    State(state): State<AppState>,
    Path((layout_set_id, setting_key)): Path<(String, String)>,
    Json(request): Json<UpsertLayoutSettingRequest>,
) -> Result<Json<LayoutSetRecord>, ApiError> {
    Ok(Json(state.stores.layout_sets.upsert_setting(
        &layout_set_id,
        &setting_key,
        &request.value,
    )?))
}

/// `DELETE /layout-sets/{id}/entries/{key}`
pub async fn delete_entry(
    State(state): State<AppState>,
    Path((layout_set_id, setting_key)): Path<(String, String)>,
) -> Result<Json<LayoutSetRecord>, ApiError> {
    Ok(Json(
        state
            .stores
            .layout_sets
            .delete_setting(&layout_set_id, &setting_key)?,
    ))
}
