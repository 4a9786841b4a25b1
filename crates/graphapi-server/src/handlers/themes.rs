//! Theme handlers.

use axum::extract::{Path, Query, State};
use axum::Json;

use graphapi_core::theme::{CreateThemeRequest, ThemeBundle, UpdateThemeRequest};
use graphapi_store::themes::{ThemeListResponse, ThemeRecord};

use crate::error::ApiError;
use crate::handlers::BundleQuery;
use crate::state::AppState;

/// `GET /themes`
pub async fn list(State(state): State<AppState>) -> Result<Json<ThemeListResponse>, ApiError> {
    Ok(Json(state.stores.themes.list()?))
}

/// `POST /themes`
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateThemeRequest>,
) -> Result<Json<ThemeRecord>, ApiError> {
    Ok(Json(state.stores.themes.create(&request)?))
}

/// `GET /themes/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(theme_id): Path<String>,
) -> Result<Json<ThemeRecord>, ApiError> {
    Ok(Json(state.stores.themes.get(&theme_id)?))
}

/// `PUT /themes/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(theme_id): Path<String>,
    Json(request): Json<UpdateThemeRequest>,
) -> Result<Json<ThemeRecord>, ApiError> {
    Ok(Json(state.stores.themes.update(&theme_id, &request)?))
}

/// `GET /themes/{id}/bundle`
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(theme_id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<ThemeBundle>, ApiError> {
    Ok(Json(state.stores.themes.get_bundle(
        &theme_id,
        query.stage,
        query.version,
    )?))
}

/// `POST /themes/{id}/publish`
pub async fn publish(
    State(state): State<AppState>,
    Path(theme_id): Path<String>,
) -> Result<Json<ThemeBundle>, ApiError> {
    Ok(Json(state.stores.themes.publish(&theme_id)?))
}
