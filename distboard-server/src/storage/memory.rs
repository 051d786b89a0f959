//! In-memory storage backend

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Session, SessionSummary};
use crate::storage::SessionStore;

/// In-memory session store
pub struct MemoryStore {
    sessions: DashMap<Uuid, Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: Session) -> Result<Session> {
        self.sessions.insert(session.meta.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut results: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary::from(&entry.value().meta))
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.sessions.remove(&id).is_some())
    }

    async fn touch(&self, id: Uuid) -> Result<()> {
        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.value_mut().meta.last_accessed_at = Utc::now();
        }
        Ok(())
    }

    async fn cleanup_expired(&self, active_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let expired_ids: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| {
                let meta = &entry.value().meta;
                !active_ids.contains(&meta.id) && meta.is_expired()
            })
            .map(|entry| *entry.key())
            .collect();

        Ok(expired_ids
            .into_iter()
            .filter(|id| self.sessions.remove(id).is_some())
            .collect())
    }
}
