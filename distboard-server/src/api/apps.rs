//! Catalog API handlers

use std::sync::Arc;

use axum::{Json, extract::State};
use distboard::prelude::AppEntry;

use crate::AppState;

/// GET /api/v1/apps - List the dashboards that can be opened
pub async fn list_apps(State(state): State<Arc<AppState>>) -> Json<Vec<AppEntry>> {
    Json(state.catalog.entries())
}
