//! Portal page handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};
use uuid::Uuid;

use crate::AppState;
use crate::api::sessions::open_session;
use crate::error::Result;
use crate::storage::SessionStore;

/// GET / - Portal index page
pub async fn index() -> impl IntoResponse {
    Html(include_str!("../../static/portal.html"))
}

/// GET /a/:app - Open a fresh session and send the browser to it
pub async fn launch(State(state): State<Arc<AppState>>, Path(app): Path<String>) -> Result<Redirect> {
    let session = open_session(&state, &app).await?;
    Ok(Redirect::to(&format!("/s/{}", session.meta.id)))
}

/// GET /s/:id - Dashboard viewer page
pub async fn session_view(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    let exists = match Uuid::parse_str(&id) {
        Ok(id) => matches!(state.store.get(id).await, Ok(Some(_))),
        Err(_) => false,
    };
    if exists {
        (StatusCode::OK, Html(include_str!("../../static/dashboard.html")))
    } else {
        (
            StatusCode::NOT_FOUND,
            Html("<h1>Session not found</h1><p><a href=\"/\">Back to the portal</a></p>"),
        )
    }
}
