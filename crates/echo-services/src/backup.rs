//! Best-effort backup of session state to an external key-value store.
//!
//! In-memory state is always authoritative. Writes are fire-and-forget on
//! spawned tasks; a failed write is logged and forgotten. Reads happen only
//! when a reconnect finds nothing in memory (e.g. after a cold start).
//!
//! Keys:
//!   session:{id}      session snapshot          (1 h)
//!   messages:{id}     message list              (1 h)
//!   user:{id}         pending disconnect        (30 s)
//!   waiting:{conn}    waiting-pool entry        (5 min)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use echo_core::config::BackupConfig;
use echo_core::{ConnectionId, Message};

use crate::reconnect::PendingSnapshot;
use crate::session::Session;
use crate::waiting_pool::WaitingEntry;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup store unavailable: {0}")]
    Unavailable(String),
    #[error("backup serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backup backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

/// Key-value store with per-key expiry.
#[async_trait]
pub trait BackupStore: Send + Sync {
    async fn save(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackupError>;
    async fn get(&self, key: &str) -> Result<Option<String>, BackupError>;
    async fn delete(&self, key: &str) -> Result<(), BackupError>;
}

// ── In-memory store ───────────────────────────────────────────────────────────

/// Process-local store with the same expiry semantics as Redis. Backs the
/// tests; the daemon runs with [`SessionBackup::disabled`] when Redis is off.
#[derive(Clone, Default)]
pub struct MemoryBackup {
    entries: Arc<DashMap<String, (String, Instant)>>,
}

impl MemoryBackup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.1 > Instant::now())
    }

    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().1 > now)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BackupStore for MemoryBackup {
    async fn save(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackupError> {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackupError> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .and_then(|e| (e.1 > now).then(|| e.0.clone()));
        if hit.is_none() {
            self.entries.remove_if(key, |_, e| e.1 <= now);
        }
        Ok(hit)
    }

    async fn delete(&self, key: &str) -> Result<(), BackupError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ── Redis store ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisBackup {
    conn: ConnectionManager,
}

impl RedisBackup {
    pub async fn connect(url: &str) -> Result<Self, BackupError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl BackupStore for RedisBackup {
    async fn save(&self, key: &str, value: String, ttl: Duration) -> Result<(), BackupError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackupError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), BackupError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

// ── Typed facade ──────────────────────────────────────────────────────────────

/// Typed, best-effort view over an optional [`BackupStore`].
#[derive(Clone)]
pub struct SessionBackup {
    store: Option<Arc<dyn BackupStore>>,
    session_ttl: Duration,
    messages_ttl: Duration,
    disconnect_ttl: Duration,
    waiting_ttl: Duration,
}

impl SessionBackup {
    pub fn new(store: Arc<dyn BackupStore>, config: &BackupConfig) -> Self {
        Self::with_store(Some(store), config)
    }

    /// No store: every write is dropped, every read misses.
    pub fn disabled() -> Self {
        Self::with_store(None, &BackupConfig::default())
    }

    fn with_store(store: Option<Arc<dyn BackupStore>>, config: &BackupConfig) -> Self {
        Self {
            store,
            session_ttl: Duration::from_secs(config.session_ttl_secs),
            messages_ttl: Duration::from_secs(config.messages_ttl_secs),
            disconnect_ttl: Duration::from_secs(config.disconnect_ttl_secs),
            waiting_ttl: Duration::from_secs(config.waiting_ttl_secs),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn save_session(&self, session: &Session) {
        let mut snapshot = session.clone();
        snapshot.messages.clear();
        self.spawn_save(format!("session:{}", session.session_id), &snapshot, self.session_ttl);
    }

    pub fn save_messages(&self, session_id: &str, messages: &[Message]) {
        self.spawn_save(format!("messages:{session_id}"), &messages, self.messages_ttl);
    }

    pub fn save_pending(&self, pending: &PendingSnapshot) {
        self.spawn_save(format!("user:{}", pending.user_id), pending, self.disconnect_ttl);
    }

    pub fn save_waiting(&self, entry: &WaitingEntry) {
        self.spawn_save(format!("waiting:{}", entry.connection_id), entry, self.waiting_ttl);
    }

    /// Drop the session and its message list.
    pub fn delete_session(&self, session_id: &str) {
        self.spawn_delete(format!("session:{session_id}"));
        self.spawn_delete(format!("messages:{session_id}"));
    }

    pub fn delete_pending(&self, user_id: &str) {
        self.spawn_delete(format!("user:{user_id}"));
    }

    pub fn delete_waiting(&self, connection_id: &ConnectionId) {
        self.spawn_delete(format!("waiting:{connection_id}"));
    }

    pub async fn load_pending(&self, user_id: &str) -> Option<PendingSnapshot> {
        self.load(&format!("user:{user_id}")).await
    }

    /// Session snapshot with its message list merged back in.
    pub async fn load_session(&self, session_id: &str) -> Option<Session> {
        let mut session: Session = self.load(&format!("session:{session_id}")).await?;
        let messages: Vec<Message> = self
            .load(&format!("messages:{session_id}"))
            .await
            .unwrap_or_default();
        session.message_count = messages.len();
        session.messages = messages;
        Some(session)
    }

    /// The pending-disconnect record for `user_id` and the session it
    /// points at, if both are still stored.
    pub async fn load_held_session(&self, user_id: &str) -> Option<(PendingSnapshot, Session)> {
        let pending = self.load_pending(user_id).await?;
        let session = self.load_session(&pending.session_id).await?;
        Some((pending, session))
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.store.as_ref()?;
        let raw = match store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "backup read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "backup entry unreadable");
                None
            }
        }
    }

    fn spawn_save<T: Serialize + ?Sized>(&self, key: String, value: &T, ttl: Duration) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let value = match serde_json::to_string(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "backup serialization failed");
                return;
            }
        };
        tokio::spawn(async move {
            match store.save(&key, value, ttl).await {
                Ok(()) => debug!(key = %key, "backup saved"),
                Err(e) => warn!(key = %key, error = %e, "backup save failed"),
            }
        });
    }

    fn spawn_delete(&self, key: String) {
        let Some(store) = self.store.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = store.delete(&key).await {
                warn!(key = %key, error = %e, "backup delete failed");
            }
        });
    }
}
