//! Conversation store: session CRUD with write-through persistence.
//!
//! The whole `ConversationSnapshot` (sessions plus active pointer) is the unit
//! of durable state. Every mutating call writes it before returning; if the
//! write fails the in-memory change is rolled back so memory and storage never
//! disagree. Mutations take `&mut self` across the write, so writes from one
//! store instance are strictly ordered.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::chat::{
    ChatMessage, ChatSession, ConversationSnapshot, PersonaRef, SNAPSHOT_VERSION, SessionSummary,
};
use parley_types::error::ConversationError;

use crate::persona::{HOST, HOST_GREETING};
use crate::storage::kv_store::KvStore;

/// Key under which the snapshot is persisted.
pub const CONVERSATIONS_KEY: &str = "conversations";

/// Introductory message seeded into every new session.
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub persona: PersonaRef,
    pub greeting: String,
}

impl Default for SessionSeed {
    fn default() -> Self {
        Self {
            persona: HOST.to_ref(),
            greeting: HOST_GREETING.to_string(),
        }
    }
}

/// Result of deleting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Uuid,
    /// Active session after the delete.
    pub active_session_id: Uuid,
    /// Whether a fresh session had to be created because none remained.
    pub created_replacement: bool,
}

/// Multi-session conversation history backed by a key-value store.
///
/// Invariant (after `load`): at least one session exists and
/// `active_session_id` names one of them.
pub struct ConversationStore<K: KvStore> {
    kv: K,
    key: String,
    seed: SessionSeed,
    state: ConversationSnapshot,
    /// Set when the persisted snapshot has a newer layout; it is never overwritten.
    read_only: bool,
}

impl<K: KvStore> ConversationStore<K> {
    /// Load persisted conversations under the default key.
    pub async fn load(kv: K, seed: SessionSeed) -> Self {
        Self::load_with_key(kv, CONVERSATIONS_KEY, seed).await
    }

    /// Load persisted conversations under `key`.
    ///
    /// Missing, unreadable, or corrupt state is treated as a first run: a
    /// fresh session is created and persisted on a best-effort basis. State
    /// from a newer layout is kept as is and this store never writes.
    pub async fn load_with_key(kv: K, key: &str, seed: SessionSeed) -> Self {
        let mut read_only = false;
        let restored = match kv.get(key).await {
            Ok(Some(value)) if snapshot_version(&value) > u64::from(SNAPSHOT_VERSION) => {
                warn!(
                    version = snapshot_version(&value),
                    "Persisted conversations use a newer layout, keeping them untouched"
                );
                read_only = true;
                None
            }
            Ok(Some(value)) => match serde_json::from_value::<ConversationSnapshot>(value) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(error = %e, "Persisted conversations are corrupt, starting fresh");
                    None
                }
            },
            Ok(None) => {
                debug!("No persisted conversations found");
                None
            }
            Err(e) => {
                warn!(error = %e, "Conversation storage unavailable, starting fresh");
                None
            }
        };

        let mut store = Self {
            kv,
            key: key.to_string(),
            seed,
            state: restored.unwrap_or_default(),
            read_only,
        };

        store.repair();

        if store.state.sessions.is_empty() {
            let session = store.new_seeded_session();
            store.state.active_session_id = Some(session.id);
            store.state.sessions.push(session);
            if let Err(e) = store.persist().await {
                warn!(error = %e, "Could not persist initial session");
            }
        }

        info!(
            sessions = store.state.sessions.len(),
            active = ?store.state.active_session_id,
            "Conversation store loaded"
        );
        store
    }

    /// Sessions ordered most recently updated first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<&ChatSession> = self.state.sessions.iter().collect();
        sessions.sort_by(|a, b| recency_key(b).cmp(&recency_key(a)));
        sessions.into_iter().map(ChatSession::summary).collect()
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.state.active_session_id
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.state.active_session_id.and_then(|id| self.session(&id))
    }

    pub fn session(&self, id: &Uuid) -> Option<&ChatSession> {
        self.state.sessions.iter().find(|s| s.id == *id)
    }

    pub fn len(&self) -> usize {
        self.state.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.sessions.is_empty()
    }

    /// Copy of the current persisted view.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state.clone()
    }

    /// Create a session with one seeded greeting and make it active.
    pub async fn create_session(&mut self) -> Result<ChatSession, ConversationError> {
        let before = self.state.clone();

        let session = self.new_seeded_session();
        self.state.active_session_id = Some(session.id);
        self.state.sessions.push(session.clone());

        self.commit(before).await?;
        info!(session_id = %session.id, name = %session.name, "Session created");
        Ok(session)
    }

    /// Make `id` the active session and return it for display.
    pub async fn switch_active(&mut self, id: Uuid) -> Result<ChatSession, ConversationError> {
        let session = self
            .session(&id)
            .cloned()
            .ok_or(ConversationError::SessionNotFound(id))?;

        if self.state.active_session_id == Some(id) {
            return Ok(session);
        }

        let before = self.state.clone();
        self.state.active_session_id = Some(id);
        self.commit(before).await?;

        debug!(session_id = %id, "Active session switched");
        Ok(session)
    }

    /// Remove a session, re-pointing or re-creating the active session as needed.
    pub async fn delete_session(&mut self, id: Uuid) -> Result<DeleteOutcome, ConversationError> {
        let index = self
            .state
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or(ConversationError::SessionNotFound(id))?;

        let before = self.state.clone();
        self.state.sessions.remove(index);

        let mut created_replacement = false;
        if self.state.sessions.is_empty() {
            let session = self.new_seeded_session();
            self.state.active_session_id = Some(session.id);
            self.state.sessions.push(session);
            created_replacement = true;
        } else if self.state.active_session_id == Some(id) {
            self.state.active_session_id = self.most_recent_id();
        }

        self.commit(before).await?;

        let active_session_id = self
            .state
            .active_session_id
            .ok_or_else(|| ConversationError::PersistenceUnavailable("no active session".into()))?;

        info!(session_id = %id, active = %active_session_id, created_replacement, "Session deleted");
        Ok(DeleteOutcome {
            deleted: id,
            active_session_id,
            created_replacement,
        })
    }

    /// Append `message` to `session_id` and bump its `updated_at`.
    pub async fn append_message(
        &mut self,
        session_id: Uuid,
        message: ChatMessage,
    ) -> Result<ChatMessage, ConversationError> {
        let before_len;
        let before_updated;
        {
            let session = self
                .state
                .sessions
                .iter_mut()
                .find(|s| s.id == session_id)
                .ok_or(ConversationError::SessionNotFound(session_id))?;
            before_len = session.messages.len();
            before_updated = session.updated_at;
            session.messages.push(message.clone());
            session.updated_at = Utc::now().max(message.timestamp);
        }

        if let Err(e) = self.persist().await {
            // Undo only the append.
            if let Some(session) = self.state.sessions.iter_mut().find(|s| s.id == session_id) {
                session.messages.truncate(before_len);
                session.updated_at = before_updated;
            }
            warn!(session_id = %session_id, error = %e, "Append rolled back");
            return Err(e);
        }

        debug!(session_id = %session_id, message_id = %message.id, is_user = message.is_user, "Message appended");
        Ok(message)
    }

    /// Write the snapshot, restoring `before` if the write fails.
    async fn commit(&mut self, before: ConversationSnapshot) -> Result<(), ConversationError> {
        if let Err(e) = self.persist().await {
            self.state = before;
            warn!(error = %e, "Conversation change rolled back");
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<(), ConversationError> {
        if self.read_only {
            return Err(ConversationError::PersistenceUnavailable(
                "history was written by a newer version of parley".to_string(),
            ));
        }
        let value = serde_json::to_value(&self.state)
            .map_err(|e| ConversationError::PersistenceUnavailable(e.to_string()))?;
        self.kv.set(&self.key, &value).await?;
        Ok(())
    }

    fn new_seeded_session(&mut self) -> ChatSession {
        let ordinal = self.state.next_ordinal;
        self.state.next_ordinal = ordinal.saturating_add(1);

        let mut session = ChatSession::new(format!("Chat {ordinal}"));
        session.messages.push(ChatMessage::persona(
            self.seed.persona.clone(),
            self.seed.greeting.clone(),
        ));
        session
    }

    fn most_recent_id(&self) -> Option<Uuid> {
        self.state
            .sessions
            .iter()
            .max_by_key(|s| recency_key(s))
            .map(|s| s.id)
    }

    /// Bring a restored snapshot back in line with the store invariants.
    fn repair(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.state.sessions.retain(|s| seen.insert(s.id));

        let active_ok = self
            .state
            .active_session_id
            .is_some_and(|id| self.session(&id).is_some());
        if !active_ok {
            self.state.active_session_id = self.most_recent_id();
        }

        let floor = u32::try_from(self.state.sessions.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        self.state.next_ordinal = self.state.next_ordinal.max(floor);
        self.state.version = SNAPSHOT_VERSION;
    }
}

fn recency_key(s: &ChatSession) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>, Uuid) {
    (s.updated_at, s.created_at, s.id)
}

fn snapshot_version(value: &serde_json::Value) -> u64 {
    value.get("version").and_then(serde_json::Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKvStore;
    use parley_types::error::RepositoryError;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// KV store whose writes can be made to fail on demand.
    #[derive(Default)]
    struct FlakyKv {
        inner: MemoryKvStore,
        fail_writes: AtomicBool,
    }

    impl KvStore for FlakyKv {
        async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), RepositoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RepositoryError::Io("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }
    }

    /// KV store that cannot be reached at all.
    struct DeadKv;

    impl KvStore for DeadKv {
        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, RepositoryError> {
            Err(RepositoryError::Connection("offline".to_string()))
        }

        async fn set(&self, _key: &str, _value: &serde_json::Value) -> Result<(), RepositoryError> {
            Err(RepositoryError::Connection("offline".to_string()))
        }
    }

    async fn fresh() -> (Arc<MemoryKvStore>, ConversationStore<Arc<MemoryKvStore>>) {
        let kv = Arc::new(MemoryKvStore::new());
        let store = ConversationStore::load(Arc::clone(&kv), SessionSeed::default()).await;
        (kv, store)
    }

    #[tokio::test]
    async fn first_load_creates_one_seeded_active_session() {
        let (kv, store) = fresh().await;
        assert_eq!(store.len(), 1);
        let active = store.active_session().unwrap();
        assert_eq!(active.messages.len(), 1);
        assert!(!active.messages[0].is_user);
        assert_eq!(active.messages[0].persona.as_ref().unwrap().id, "host");
        assert_eq!(active.name, "Chat 1");
        assert!(kv.get(CONVERSATIONS_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_session_seeds_and_activates() {
        let (kv, mut store) = fresh().await;
        let writes = kv.write_count();

        let created = store.create_session().await.unwrap();
        assert_eq!(created.messages.len(), 1);
        assert_eq!(created.name, "Chat 2");
        assert_eq!(store.active_session_id(), Some(created.id));
        assert_eq!(store.len(), 2);
        assert_eq!(kv.write_count(), writes + 1);
    }

    #[tokio::test]
    async fn list_orders_most_recent_first() {
        let (_, mut store) = fresh().await;
        let first = store.active_session_id().unwrap();
        let second = store.create_session().await.unwrap().id;
        store
            .append_message(first, ChatMessage::user("bump"))
            .await
            .unwrap();

        let ids: Vec<Uuid> = store.list_sessions().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn switch_to_unknown_session_fails_without_change() {
        let (kv, mut store) = fresh().await;
        let before = store.snapshot();
        let writes = kv.write_count();

        let missing = Uuid::now_v7();
        let err = store.switch_active(missing).await.unwrap_err();
        assert!(matches!(err, ConversationError::SessionNotFound(id) if id == missing));
        assert_eq!(store.snapshot(), before);
        assert_eq!(kv.write_count(), writes);
    }

    #[tokio::test]
    async fn switch_changes_active_and_persists() {
        let (kv, mut store) = fresh().await;
        let first = store.active_session_id().unwrap();
        store.create_session().await.unwrap();

        let shown = store.switch_active(first).await.unwrap();
        assert_eq!(shown.id, first);
        assert_eq!(store.active_session_id(), Some(first));

        let persisted: ConversationSnapshot =
            serde_json::from_value(kv.get(CONVERSATIONS_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.active_session_id, Some(first));
    }

    #[tokio::test]
    async fn deleting_only_session_leaves_exactly_one() {
        let (_, mut store) = fresh().await;
        let only = store.active_session_id().unwrap();

        let outcome = store.delete_session(only).await.unwrap();
        assert!(outcome.created_replacement);
        assert_eq!(store.len(), 1);
        assert_ne!(outcome.active_session_id, only);
        assert_eq!(store.active_session_id(), Some(outcome.active_session_id));
        assert_eq!(store.active_session().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn deleting_active_promotes_most_recent() {
        let (_, mut store) = fresh().await;
        let a = store.active_session_id().unwrap();
        let b = store.create_session().await.unwrap().id;
        let c = store.create_session().await.unwrap().id;
        store.append_message(a, ChatMessage::user("newest")).await.unwrap();
        store.switch_active(c).await.unwrap();

        let outcome = store.delete_session(c).await.unwrap();
        assert!(!outcome.created_replacement);
        assert_eq!(outcome.active_session_id, a);
        assert!(store.session(&b).is_some());
    }

    #[tokio::test]
    async fn deleting_inactive_keeps_active() {
        let (_, mut store) = fresh().await;
        let a = store.active_session_id().unwrap();
        let b = store.create_session().await.unwrap().id;
        store.switch_active(a).await.unwrap();

        let outcome = store.delete_session(b).await.unwrap();
        assert_eq!(outcome.active_session_id, a);
    }

    #[tokio::test]
    async fn delete_unknown_session_is_not_found() {
        let (_, mut store) = fresh().await;
        let err = store.delete_session(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, ConversationError::SessionNotFound(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_not_found() {
        let (_, mut store) = fresh().await;
        let err = store
            .append_message(Uuid::now_v7(), ChatMessage::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn reload_round_trip_restores_everything() {
        let (kv, mut store) = fresh().await;
        let a = store.active_session_id().unwrap();
        store.append_message(a, ChatMessage::user("one")).await.unwrap();
        store.append_message(a, ChatMessage::user("two")).await.unwrap();
        let b = store.create_session().await.unwrap().id;
        store.append_message(b, ChatMessage::user("three")).await.unwrap();
        store.switch_active(a).await.unwrap();

        let before = store.snapshot();
        drop(store);

        let reloaded = ConversationStore::load(Arc::clone(&kv), SessionSeed::default()).await;
        assert_eq!(reloaded.snapshot(), before);
        assert_eq!(reloaded.active_session_id(), Some(a));
        let texts: Vec<&str> = reloaded
            .session(&a)
            .unwrap()
            .messages
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts[1..], ["one", "two"]);
    }

    #[tokio::test]
    async fn corrupt_state_starts_fresh() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.insert_raw(CONVERSATIONS_KEY, json!({"sessions": "not a list"}));

        let store = ConversationStore::load(Arc::clone(&kv), SessionSeed::default()).await;
        assert_eq!(store.len(), 1);
        assert!(store.active_session().is_some());
    }

    #[tokio::test]
    async fn newer_snapshot_is_never_overwritten() {
        let kv = Arc::new(MemoryKvStore::new());
        let newer = json!({"version": SNAPSHOT_VERSION + 1, "threads": {"layout": "unknown"}});
        kv.insert_raw(CONVERSATIONS_KEY, newer.clone());

        let mut store = ConversationStore::load(Arc::clone(&kv), SessionSeed::default()).await;
        assert_eq!(store.len(), 1);
        let active = store.active_session_id().unwrap();

        let err = store
            .append_message(active, ChatMessage::user("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::PersistenceUnavailable(_)));
        assert!(store.create_session().await.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(kv.get(CONVERSATIONS_KEY).await.unwrap(), Some(newer));
        assert_eq!(kv.write_count(), 0);
    }

    #[tokio::test]
    async fn unavailable_storage_still_yields_a_session() {
        let store = ConversationStore::load(DeadKv, SessionSeed::default()).await;
        assert_eq!(store.len(), 1);
        assert!(store.active_session().is_some());
    }

    #[tokio::test]
    async fn dangling_active_pointer_is_repaired() {
        let (kv, mut store) = fresh().await;
        store.create_session().await.unwrap();
        let mut snapshot = store.snapshot();
        snapshot.active_session_id = Some(Uuid::now_v7());
        kv.insert_raw(CONVERSATIONS_KEY, serde_json::to_value(&snapshot).unwrap());

        let reloaded = ConversationStore::load(Arc::clone(&kv), SessionSeed::default()).await;
        let expected = reloaded.list_sessions()[0].id;
        assert_eq!(reloaded.active_session_id(), Some(expected));
    }

    #[tokio::test]
    async fn failed_write_rolls_back_mutations() {
        let kv = Arc::new(FlakyKv::default());
        let mut store = ConversationStore::load(Arc::clone(&kv), SessionSeed::default()).await;
        let active = store.active_session_id().unwrap();
        let before = store.snapshot();

        kv.fail_writes.store(true, Ordering::SeqCst);

        let err = store
            .append_message(active, ChatMessage::user("lost"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::PersistenceUnavailable(_)));
        assert!(store.create_session().await.is_err());
        assert!(store.delete_session(active).await.is_err());
        assert_eq!(store.snapshot(), before);
    }
}
