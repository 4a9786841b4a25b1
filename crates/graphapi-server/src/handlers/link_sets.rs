//! Link-set handlers.

use axum::extract::{Path, Query, State};
use axum::Json;

use graphapi_core::link_set::{
    CreateLinkSetRequest, LinkSetBundle, LinkTypeDefinition, UpdateLinkSetRequest,
};
use graphapi_store::link_sets::{LinkSetListResponse, LinkSetRecord};

use crate::error::ApiError;
use crate::handlers::BundleQuery;
use crate::state::AppState;

/// `GET /link-sets`
pub async fn list(State(state): State<AppState>) -> Result<Json<LinkSetListResponse>, ApiError> {
    Ok(Json(state.stores.link_sets.list()?))
}

/// `POST /link-sets`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateLinkSetRequest>,
) -> Result<Json<LinkSetRecord>, ApiError> {
    Ok(Json(state.stores.link_sets.create(&request)?))
}

/// `GET /link-sets/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(link_set_id): Path<String>,
) -> Result<Json<LinkSetRecord>, ApiError> {
    Ok(Json(state.stores.link_sets.get(&link_set_id)?))
}

/// `PUT /link-sets/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(link_set_id): Path<String>,
    Json(request): Json<UpdateLinkSetRequest>,
) -> Result<Json<LinkSetRecord>, ApiError> {
    Ok(Json(state.stores.link_sets.update(&link_set_id, &request)?))
}

/// `DELETE /link-sets/{id}`
pub async fn delete(
    State(state): State<AppState>,
    Path(link_set_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.stores.link_sets.delete(&link_set_id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// `GET /link-sets/{id}/bundle`
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(link_set_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<LinkSetBundle>, ApiError> {
    Ok(Json(state.stores.link_sets.get_bundle(
        &link_set_id,
        query.stage,
        query.version,
    )?))
}

/// `POST /link-sets/{id}/publish`
pub async fn publish(
    State(state): State<AppState>,
    Path(link_set_id): Path<String>,
) -> Result<Json<LinkSetBundle>, ApiError> {
    Ok(Json(state.stores.link_sets.publish(&link_set_id)?))
}

/// `PUT /link-sets/{id}/entries/{key}`
pub async fn upsert_entry(
    State(state): State<AppState>,
    Path((link_set_id, link_type_key)): Path<(String, String)>,
    Json(definition): Json<LinkTypeDefinition>,
) -> Result<Json<LinkSetRecord>, ApiError> {
    Ok(Json(state.stores.link_sets.upsert_entry(
        &link_set_id,
        &link_type_key,
        &definition,
    )?))
}

/// `DELETE /link-sets/{id}/entries/{key}`
pub async fn delete_entry(
    State(state): State<AppState>,
    Path((link_set_id, link_type_key)): Path<(String, String)>,
) -> Result<Json<LinkSetRecord>, ApiError> {
    Ok(Json(
        state
            .stores
            .link_sets
            .delete_entry(&link_set_id, &link_type_key)?,
    ))
}
