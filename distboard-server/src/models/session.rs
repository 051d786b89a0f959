//! Session metadata and record models

use chrono::{DateTime, Utc};
use distboard::dash::{DashboardView, SharedDashboard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Unique identifier
    pub id: Uuid,

    /// Catalog name of the dashboard this session runs
    pub app: String,

    /// Idle time-to-live in seconds
    pub ttl: u64,

    pub created_at: DateTime<Utc>,

    /// Last access timestamp (for TTL calculation)
    pub last_accessed_at: DateTime<Utc>,
}

impl SessionMeta {
    pub fn new(app: impl Into<String>, ttl: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            app: app.into(),
            ttl,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Saturates at the latest representable time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.ttl)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| self.last_accessed_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }
}

/// A live session: metadata plus the dashboard instance it owns.
#[derive(Clone)]
pub struct Session {
    pub meta: SessionMeta,
    pub dashboard: SharedDashboard,
}

impl Session {
    pub fn new(meta: SessionMeta, dashboard: SharedDashboard) -> Self {
        Self { meta, dashboard }
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            meta: self.meta.clone(),
            dashboard: self.dashboard.lock().view(),
        }
    }
}

/// Full session snapshot returned by the API
#[derive(Clone, Debug, Serialize)]
pub struct SessionRecord {
    pub meta: SessionMeta,
    pub dashboard: DashboardView,
}

/// Lightweight session listing entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub app: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&SessionMeta> for SessionSummary {
    fn from(meta: &SessionMeta) -> Self {
        Self {
            id: meta.id,
            app: meta.app.clone(),
            created_at: meta.created_at,
            expires_at: meta.expires_at(),
        }
    }
}

/// Request body for creating a session
#[derive(Clone, Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Catalog name
    pub app: String,
}
