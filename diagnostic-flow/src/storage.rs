use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

/// Default cap on remembered symptoms per session
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Default cap on sessions held by [`InMemorySessionStorage`]
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Symptom history of one consultation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomSession {
    pub id: String,
    pub symptoms: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SymptomSession {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            symptoms: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append symptoms, evicting the oldest entries beyond `limit`.
    pub fn record(&mut self, symptoms: &[String], limit: usize) {
        self.symptoms.extend_from_slice(symptoms);
        if self.symptoms.len() > limit {
            let overflow = self.symptoms.len() - limit;
            self.symptoms.drain(..overflow);
        }
        self.updated_at = Utc::now();
    }
}

/// Trait for storing and retrieving symptom sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: SymptomSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<SymptomSession>>;
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Record symptoms against `id`, creating the session if needed, and return
    /// the updated session. Must be atomic per session.
    async fn append(&self, id: &str, symptoms: &[String], limit: usize)
    -> Result<SymptomSession>;
}

/// In-memory implementation of SessionStorage.
///
/// Holds at most `max_sessions` sessions; writes past that evict the least
/// recently updated ones.
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, SymptomSession>>,
    max_sessions: usize,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop the least recently updated sessions until the cap holds. `keep` is never evicted.
    fn evict_overflow(&self, keep: &str) {
        while self.sessions.len() > self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.updated_at)
                .map(|entry| entry.key().clone());
            let Some(id) = oldest else {
                break;
            };
            debug!(session_id = %id, "Evicting least recently updated session");
            self.sessions.remove(&id);
        }
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: SymptomSession) -> Result<()> {
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.evict_overflow(&id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SymptomSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn append(
        &self,
        id: &str,
        symptoms: &[String],
        limit: usize,
    ) -> Result<SymptomSession> {
        let session = {
            let mut entry = self
                .sessions
                .entry(id.to_string())
                .or_insert_with(|| SymptomSession::new(id));
            entry.record(symptoms, limit);
            entry.clone()
        };
        self.evict_overflow(id);
        Ok(session)
    }
}
