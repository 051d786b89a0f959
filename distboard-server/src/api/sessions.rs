//! Session REST API handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use distboard::dash::{DashboardView, DistDashboard, UiAction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::models::{
    CreateSessionRequest, Session, SessionMeta, SessionRecord, SessionSummary, UpdateCommand,
};
use crate::storage::SessionStore;

/// Build the session API router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/touch", post(touch_session))
        .route("/sessions/{id}/actions", post(apply_action))
}

/// Instantiate catalog entry `app` as a new session.
pub async fn open_session(state: &AppState, app: &str) -> Result<Session> {
    let base = state
        .catalog
        .get(app)
        .ok_or_else(|| ServerError::NotFound(format!("app '{app}'")))?;
    let config = state.config.instance_config(base);

    let dashboard = tokio::task::spawn_blocking(move || DistDashboard::new(&config))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    let meta = SessionMeta::new(app, state.config.session_ttl);
    let session = state.store.create(Session::new(meta, dashboard.shared())).await?;
    info!("Opened session {} for app {}", session.meta.id, app);
    Ok(session)
}

pub async fn require_session(state: &AppState, id: Uuid) -> Result<Session> {
    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("session {id}")))
}

/// Broadcast the session's current view. The sequence number is taken
/// under the dashboard lock, so snapshot order matches state order.
pub fn broadcast_snapshot(state: &AppState, session: &Session) {
    let dashboard = session.dashboard.lock();
    state
        .broadcast_hub
        .broadcast(session.meta.id, UpdateCommand::Snapshot(dashboard.view()));
}

/// Apply `action` to a session's dashboard and broadcast the outcome.
/// Every client gets the new snapshot even when the action fails, since
/// the control that triggered it keeps its new value.
pub async fn run_action(
    state: &Arc<AppState>,
    session: &Session,
    action: UiAction,
) -> Result<DashboardView> {
    let id = session.meta.id;
    let dashboard = Arc::clone(&session.dashboard);
    let hub_state = Arc::clone(state);

    let result = tokio::task::spawn_blocking(move || {
        let mut dashboard = dashboard.lock();
        let result = dashboard.apply(action);
        let view = dashboard.view();
        let hub = &hub_state.broadcast_hub;
        hub.broadcast(id, UpdateCommand::Snapshot(view.clone()));
        if let Err(report) = &result {
            let error = report.current_context();
            hub.broadcast(
                id,
                UpdateCommand::Error {
                    kind: error.kind().to_string(),
                    message: error.message().to_string(),
                },
            );
        }
        result.map(|_| view)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))?;

    let _ = state.store.touch(id).await;

    result.map_err(|report| {
        let error = report.current_context().clone();
        warn!("Action rejected for session {}: {}", id, error);
        ServerError::Dashboard(error)
    })
}

/// POST /api/v1/sessions - Open a session for a catalog app
async fn create_session(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let session = open_session(&state, &req.app).await?;
    Ok((StatusCode::CREATED, Json(session.record())))
}

/// GET /api/v1/sessions - List live sessions
async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<SessionSummary>>> {
    Ok(Json(state.store.list().await?))
}

/// GET /api/v1/sessions/:id - Session metadata and current dashboard view
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionRecord>> {
    let session = require_session(&state, id).await?;
    state.store.touch(id).await?;
    Ok(Json(session.record()))
}

/// DELETE /api/v1/sessions/:id - Close a session
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.store.delete(id).await? {
        state.broadcast_hub.remove_session(id);
        info!("Closed session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(format!("session {id}")))
    }
}

/// POST /api/v1/sessions/:id/touch - Extend TTL
async fn touch_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    require_session(&state, id).await?;
    state.store.touch(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/actions - Apply a user interaction
async fn apply_action(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: std::result::Result<Json<UiAction>, JsonRejection>,
) -> Result<Json<DashboardView>> {
    let Json(action) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let session = require_session(&state, id).await?;
    Ok(Json(run_action(&state, &session, action).await?))
}
