//! Session lifecycle management - TTL cleanup

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::AppState;
use crate::storage::SessionStore;

/// Background task that closes idle sessions
pub async fn cleanup_task(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.cleanup_interval.max(1));
    info!("Starting cleanup task with interval: {:?}", interval);

    loop {
        tokio::time::sleep(interval).await;
        debug!("Running session cleanup...");
        run_cleanup(&state).await;
    }
}

/// One cleanup pass; sessions with an open WebSocket are never closed.
pub async fn run_cleanup(state: &AppState) -> usize {
    let active_ids = state.broadcast_hub.active_session_ids();

    match state.store.cleanup_expired(&active_ids).await {
        Ok(removed) => {
            for id in &removed {
                state.broadcast_hub.remove_session(*id);
            }
            if !removed.is_empty() {
                info!(
                    "Closed {} expired sessions, {} remain",
                    removed.len(),
                    state.store.len()
                );
            }
            removed.len()
        }
        Err(e) => {
            error!("Cleanup task error: {}", e);
            0
        }
    }
}
