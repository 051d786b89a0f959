//! Session storage backends

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Session, SessionSummary};

/// Trait for session storage backends
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new session
    async fn create(&self, session: Session) -> Result<Session>;

    /// Get a session by ID
    async fn get(&self, id: Uuid) -> Result<Option<Session>>;

    /// List sessions, newest first
    async fn list(&self) -> Result<Vec<SessionSummary>>;

    /// Delete a session
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Touch a session (update last_accessed_at, extend TTL)
    async fn touch(&self, id: Uuid) -> Result<()>;

    /// Drop expired sessions, skipping those with active connections.
    /// Returns the removed IDs.
    async fn cleanup_expired(&self, active_ids: &[Uuid]) -> Result<Vec<Uuid>>;
}
