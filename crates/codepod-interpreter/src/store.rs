use crate::context::TurnId;
use crate::session::{SandboxSession, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codepod_docker::NetworkMode;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    NotFound(SessionId),

    #[error("session storage failure: {0}")]
    Backend(String),
}

pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Insert payload; the store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSandboxSession {
    pub owner_turn_id: TurnId,
    pub label: String,
    pub container_id: String,
    pub image: String,
    pub shell_prefix: String,
    pub ip: Option<String>,
    pub network_mode: NetworkMode,
    pub memory_bytes: Option<u64>,
    pub cpu_cores: Option<f64>,
    pub max_processes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Persistence seam for sandbox sessions. All session mutations go through
/// here; the orchestrator never keeps authoritative state in memory.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: NewSandboxSession) -> SessionStoreResult<SandboxSession>;

    /// Records activity: advances `last_active_at` and `expires_at`.
    async fn touch(
        &self,
        id: SessionId,
        last_active_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> SessionStoreResult<()>;

    async fn terminate(&self, id: SessionId, at: DateTime<Utc>) -> SessionStoreResult<()>;

    /// Sessions owned by the given turns, ordered by the position of their
    /// owning turn in `turn_ids` and then by insertion. Callers rely on this
    /// ordering for last-wins label resolution.
    async fn sessions_for_turns(
        &self,
        turn_ids: &[TurnId],
    ) -> SessionStoreResult<Vec<SandboxSession>>;
}

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: SessionId,
    sessions: Vec<SandboxSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SessionStoreResult<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| SessionStoreError::Backend("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: NewSandboxSession) -> SessionStoreResult<SandboxSession> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let stored = SandboxSession {
            id: inner.next_id,
            owner_turn_id: session.owner_turn_id,
            label: session.label,
            container_id: session.container_id,
            image: session.image,
            shell_prefix: session.shell_prefix,
            ip: session.ip,
            network_mode: session.network_mode,
            memory_bytes: session.memory_bytes,
            cpu_cores: session.cpu_cores,
            max_processes: session.max_processes,
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            expires_at: session.expires_at,
            terminated_at: None,
        };
        inner.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn touch(
        &self,
        id: SessionId,
        last_active_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> SessionStoreResult<()> {
        let mut inner = self.lock()?;
        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SessionStoreError::NotFound(id))?;
        session.last_active_at = last_active_at;
        session.expires_at = expires_at;
        Ok(())
    }

    async fn terminate(&self, id: SessionId, at: DateTime<Utc>) -> SessionStoreResult<()> {
        let mut inner = self.lock()?;
        let session = inner
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SessionStoreError::NotFound(id))?;
        session.terminated_at = Some(at);
        Ok(())
    }

    async fn sessions_for_turns(
        &self,
        turn_ids: &[TurnId],
    ) -> SessionStoreResult<Vec<SandboxSession>> {
        let inner = self.lock()?;
        let mut result = Vec::new();
        for turn_id in turn_ids {
            result.extend(
                inner
                    .sessions
                    .iter()
                    .filter(|s| s.owner_turn_id == *turn_id)
                    .cloned(),
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_session(owner_turn_id: TurnId, label: &str) -> NewSandboxSession {
        let now = Utc::now();
        NewSandboxSession {
            owner_turn_id,
            label: label.to_string(),
            container_id: format!("c-{label}"),
            image: "img".to_string(),
            shell_prefix: "/bin/sh,-lc".to_string(),
            ip: None,
            network_mode: NetworkMode::None,
            memory_bytes: None,
            cpu_cores: None,
            max_processes: None,
            created_at: now,
            last_active_at: now,
            expires_at: now + Duration::minutes(30),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insert_assigns_monotonic_ids() {
        let store = MemorySessionStore::new();
        let a = store.insert(new_session(1, "a")).await.unwrap();
        let b = store.insert(new_session(1, "b")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sessions_for_turns_orders_by_turn_position() {
        let store = MemorySessionStore::new();
        store.insert(new_session(2, "late")).await.unwrap();
        store.insert(new_session(1, "early")).await.unwrap();

        let sessions = store.sessions_for_turns(&[1, 2]).await.unwrap();
        let labels: Vec<&str> = sessions.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["early", "late"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn touch_advances_expiry() {
        let store = MemorySessionStore::new();
        let session = store.insert(new_session(1, "a")).await.unwrap();

        let later = Utc::now() + Duration::hours(1);
        store.touch(session.id, later, later).await.unwrap();

        let stored = store.sessions_for_turns(&[1]).await.unwrap();
        assert_eq!(stored[0].expires_at, later);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn terminate_marks_the_session() {
        let store = MemorySessionStore::new();
        let session = store.insert(new_session(1, "a")).await.unwrap();
        store.terminate(session.id, Utc::now()).await.unwrap();

        let stored = store.sessions_for_turns(&[1]).await.unwrap();
        assert!(stored[0].terminated_at.is_some());
        assert!(!stored[0].is_active(Utc::now()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn touch_missing_session_reports_not_found() {
        let store = MemorySessionStore::new();
        let err = store.touch(42, Utc::now(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound(42)));
    }
}
