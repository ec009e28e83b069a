//! Turn engine: one user turn end to end.
//!
//! A turn is: consult the quota gate, append the user message to the active
//! session, then after a typing delay append a persona reply to the session
//! that was active when the turn was accepted. Failures before the user
//! message lands give the quota unit back. Replies run as spawned tasks so a
//! caller can keep typing, switch sessions, or delete sessions while a reply
//! is pending.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::chat::{
    Attachment, AttachmentKind, ChatMessage, ChatSession, ConversationSnapshot, SessionSummary,
};
use parley_types::error::{ConversationError, TurnError, UploadError};
use parley_types::quota::UsageSnapshot;

use super::phase::TurnPhase;
use super::reply::{ReplyKind, ReplyPicker};
use crate::conversation::store::{ConversationStore, DeleteOutcome};
use crate::persona::{PERSONAS, Persona};
use crate::quota::gate::QuotaGate;
use crate::storage::kv_store::KvStore;
use crate::storage::object_store::{MAX_ATTACHMENT_BYTES, ObjectStore};

/// Default pause between the user message and the reply.
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(1200);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct TurnEngineConfig {
    /// Identity presented to the quota gate.
    pub client_id: String,
    pub typing_delay: Duration,
    /// Fixed seed for reproducible replies.
    pub reply_seed: Option<u64>,
    pub personas: &'static [Persona],
}

impl Default for TurnEngineConfig {
    fn default() -> Self {
        Self {
            client_id: "local".to_string(),
            typing_delay: DEFAULT_TYPING_DELAY,
            reply_seed: None,
            personas: PERSONAS,
        }
    }
}

/// A reply that has been scheduled but not yet written.
#[derive(Debug, Clone)]
struct PendingTurn {
    session_id: Uuid,
    cancel: CancellationToken,
}

struct EngineInner<K: KvStore, O: ObjectStore, Q: QuotaGate> {
    store: Mutex<ConversationStore<K>>,
    objects: O,
    quota: Q,
    picker: StdMutex<ReplyPicker>,
    client_id: String,
    typing_delay: Duration,
    pending: DashMap<Uuid, PendingTurn>,
    phase: watch::Sender<TurnPhase>,
    shutdown: CancellationToken,
}

/// Accepted turn. The user message is already persisted; the reply is pending.
#[derive(Debug)]
pub struct TurnHandle {
    pub turn_id: Uuid,
    /// Session the reply will be appended to.
    pub session_id: Uuid,
    pub user_message: ChatMessage,
    /// Quota balance after this turn.
    pub usage: UsageSnapshot,
    reply: JoinHandle<Result<Option<ChatMessage>, TurnError>>,
}

impl TurnHandle {
    /// Wait for the reply.
    ///
    /// `Ok(None)` when the reply was cancelled or its session was deleted
    /// before it could be written.
    pub async fn wait(self) -> Result<Option<ChatMessage>, TurnError> {
        match self.reply.await {
            Ok(outcome) => outcome,
            Err(e) => Err(TurnError::ReplyTask(e.to_string())),
        }
    }
}

/// Drives turns against a conversation store, an object store and a quota gate.
///
/// Cloning is cheap; clones share state.
pub struct TurnEngine<K, O, Q>
where
    K: KvStore + 'static,
    O: ObjectStore + 'static,
    Q: QuotaGate + 'static,
{
    inner: Arc<EngineInner<K, O, Q>>,
}

impl<K, O, Q> Clone for TurnEngine<K, O, Q>
where
    K: KvStore + 'static,
    O: ObjectStore + 'static,
    Q: QuotaGate + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, O, Q> TurnEngine<K, O, Q>
where
    K: KvStore + 'static,
    O: ObjectStore + 'static,
    Q: QuotaGate + 'static,
{
    pub fn new(store: ConversationStore<K>, objects: O, quota: Q, config: TurnEngineConfig) -> Self {
        let (phase, _) = watch::channel(TurnPhase::Idle);
        Self {
            inner: Arc::new(EngineInner {
                store: Mutex::new(store),
                objects,
                quota,
                picker: StdMutex::new(ReplyPicker::new(config.personas, config.reply_seed)),
                client_id: config.client_id,
                typing_delay: config.typing_delay,
                pending: DashMap::new(),
                phase,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Receiver for phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<TurnPhase> {
        self.inner.phase.subscribe()
    }

    pub fn phase(&self) -> TurnPhase {
        *self.inner.phase.borrow()
    }

    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Number of replies not yet written.
    pub fn pending_turns(&self) -> usize {
        self.inner.pending.len()
    }

    /// Send a text message to the active session.
    ///
    /// Blank input is rejected before the quota is touched.
    pub async fn send_text(&self, text: &str) -> Result<TurnHandle, TurnError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let usage = self.consume_quota().await?;
        self.commit_user_turn(ChatMessage::user(text), usage, ReplyKind::Text)
            .await
    }

    /// Upload an attachment and send it, with an optional caption, to the
    /// active session.
    ///
    /// A failed upload leaves the quota untouched. A refused turn may leave an
    /// unreferenced object behind.
    pub async fn send_attachment(
        &self,
        name: &str,
        data: &[u8],
        caption: &str,
    ) -> Result<TurnHandle, TurnError> {
        if data.is_empty() {
            return Err(UploadError::EmptyPayload(name.to_string()).into());
        }
        let size_bytes = data.len() as u64;
        if size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(UploadError::TooLarge {
                name: name.to_string(),
                max_bytes: MAX_ATTACHMENT_BYTES,
            }
            .into());
        }

        // Upload before consuming: a remote gate cannot refund.
        let storage_key = match self.inner.objects.upload(name, data).await {
            Ok(key) => key,
            Err(e) => {
                warn!(name, error = %e, "Attachment upload failed");
                return Err(e.into());
            }
        };
        let usage = self.consume_quota().await?;

        let attachment = Attachment {
            kind: AttachmentKind::from_filename(name),
            url: self.inner.objects.public_url(&storage_key),
            name: name.to_string(),
            storage_key,
            size_bytes,
        };
        debug!(name, kind = %attachment.kind, size_bytes, "Attachment uploaded");

        let message = ChatMessage::user_with_attachments(caption.trim(), vec![attachment]);
        self.commit_user_turn(message, usage, ReplyKind::Attachment)
            .await
    }

    /// Create a session and make it active. Pending replies are unaffected.
    pub async fn create_session(&self) -> Result<ChatSession, TurnError> {
        let mut store = self.inner.store.lock().await;
        Ok(store.create_session().await?)
    }

    /// Make `id` the active session. Pending replies still land in their
    /// originating sessions.
    pub async fn switch_session(&self, id: Uuid) -> Result<ChatSession, TurnError> {
        let mut store = self.inner.store.lock().await;
        Ok(store.switch_active(id).await?)
    }

    /// Delete a session and cancel any reply still pending for it.
    pub async fn delete_session(&self, id: Uuid) -> Result<DeleteOutcome, TurnError> {
        let mut store = self.inner.store.lock().await;
        let outcome = store.delete_session(id).await?;
        drop(store);

        let cancelled = self.cancel_where(|turn| turn.session_id == id);
        if cancelled > 0 {
            info!(session_id = %id, cancelled, "Pending replies cancelled for deleted session");
        }
        Ok(outcome)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.inner.store.lock().await.list_sessions()
    }

    pub async fn active_session(&self) -> Option<ChatSession> {
        self.inner.store.lock().await.active_session().cloned()
    }

    pub async fn session(&self, id: Uuid) -> Option<ChatSession> {
        self.inner.store.lock().await.session(&id).cloned()
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.inner.store.lock().await.snapshot()
    }

    /// Balance for this engine's client without consuming.
    pub async fn usage(&self) -> Result<UsageSnapshot, TurnError> {
        Ok(self.inner.quota.peek(&self.inner.client_id).await?)
    }

    /// Cancel one pending reply. Returns `false` if it already completed.
    pub fn cancel_turn(&self, turn_id: Uuid) -> bool {
        match self.inner.pending.get(&turn_id) {
            Some(turn) => {
                turn.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending reply, including any scheduled after this call.
    pub fn cancel_all(&self) {
        self.inner.shutdown.cancel();
        debug!(pending = self.inner.pending.len(), "All pending replies cancelled");
    }

    async fn consume_quota(&self) -> Result<UsageSnapshot, TurnError> {
        self.inner.set_phase(TurnPhase::AwaitingQuota);
        match self.inner.quota.try_consume(&self.inner.client_id).await {
            Ok(usage) => Ok(usage),
            Err(e) => {
                info!(client = %self.inner.client_id, error = %e, "Turn refused by quota gate");
                self.inner.settle_phase();
                Err(e.into())
            }
        }
    }

    /// Append the user message and schedule its reply.
    ///
    /// The session id is read and the message appended under one lock so a
    /// concurrent switch cannot split them.
    async fn commit_user_turn(
        &self,
        message: ChatMessage,
        usage: UsageSnapshot,
        kind: ReplyKind,
    ) -> Result<TurnHandle, TurnError> {
        let mut store = self.inner.store.lock().await;
        let Some(session_id) = store.active_session_id() else {
            drop(store);
            self.inner.refund().await;
            self.inner.settle_phase();
            return Err(TurnError::Persistence("no active session".to_string()));
        };

        self.inner
            .set_phase(TurnPhase::ComposingUser { session_id });
        let appended = store.append_message(session_id, message).await;
        drop(store);

        let user_message = match appended {
            Ok(message) => message,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "User message not saved");
                self.inner.refund().await;
                self.inner.settle_phase();
                return Err(e.into());
            }
        };

        let turn_id = Uuid::now_v7();
        let reply = self.schedule_reply(turn_id, session_id, kind);
        Ok(TurnHandle {
            turn_id,
            session_id,
            user_message,
            usage,
            reply,
        })
    }

    fn schedule_reply(
        &self,
        turn_id: Uuid,
        session_id: Uuid,
        kind: ReplyKind,
    ) -> JoinHandle<Result<Option<ChatMessage>, TurnError>> {
        let cancel = self.inner.shutdown.child_token();
        self.inner.pending.insert(
            turn_id,
            PendingTurn {
                session_id,
                cancel: cancel.clone(),
            },
        );
        self.inner
            .set_phase(TurnPhase::BotTyping { session_id, turn_id });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(turn_id = %turn_id, session_id = %session_id, "Reply cancelled");
                    Ok(None)
                }
                _ = tokio::time::sleep(inner.typing_delay) => {
                    inner.deliver_reply(turn_id, session_id, kind).await
                }
            };
            inner.pending.remove(&turn_id);
            inner.settle_phase();
            outcome
        })
    }

    fn cancel_where(&self, predicate: impl Fn(&PendingTurn) -> bool) -> usize {
        let mut cancelled = 0;
        for entry in self.inner.pending.iter() {
            if predicate(entry.value()) {
                entry.cancel.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}

impl<K, O, Q> EngineInner<K, O, Q>
where
    K: KvStore,
    O: ObjectStore,
    Q: QuotaGate,
{
    fn set_phase(&self, phase: TurnPhase) {
        self.phase.send_replace(phase);
    }

    /// Publish the newest pending reply as typing, or `Idle` when none is left.
    fn settle_phase(&self) {
        let newest = self
            .pending
            .iter()
            .max_by_key(|entry| *entry.key())
            .map(|entry| (*entry.key(), entry.value().session_id));
        let phase = match newest {
            Some((turn_id, session_id)) => TurnPhase::BotTyping { session_id, turn_id },
            None => TurnPhase::Idle,
        };
        self.phase.send_replace(phase);
    }

    async fn refund(&self) {
        if let Err(e) = self.quota.refund(&self.client_id).await {
            warn!(client = %self.client_id, error = %e, "Quota refund failed");
        }
    }

    /// Write the reply to the session captured when the turn was accepted.
    async fn deliver_reply(
        &self,
        turn_id: Uuid,
        session_id: Uuid,
        kind: ReplyKind,
    ) -> Result<Option<ChatMessage>, TurnError> {
        let choice = self
            .picker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pick(kind);
        let Some(choice) = choice else {
            warn!(turn_id = %turn_id, "No reply candidates available");
            return Ok(None);
        };

        self.set_phase(TurnPhase::ComposingBot {
            session_id,
            turn_id,
        });
        let reply = ChatMessage::persona(choice.persona.to_ref(), choice.text);

        let mut store = self.store.lock().await;
        match store.append_message(session_id, reply).await {
            Ok(message) => {
                debug!(turn_id = %turn_id, session_id = %session_id, persona = choice.persona.id, "Reply delivered");
                Ok(Some(message))
            }
            Err(ConversationError::SessionNotFound(_)) => {
                info!(turn_id = %turn_id, session_id = %session_id, "Session gone, reply dropped");
                Ok(None)
            }
            Err(e) => {
                warn!(turn_id = %turn_id, session_id = %session_id, error = %e, "Reply not saved");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::store::SessionSeed;
    use crate::quota::clock::ManualClock;
    use crate::quota::service::QuotaService;
    use crate::storage::memory::{MemoryKvStore, MemoryObjectStore};
    use chrono::{FixedOffset, TimeZone};
    use parley_types::error::{QuotaError, RepositoryError};
    use std::sync::atomic::{AtomicBool, Ordering};

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

    struct BrokenObjects;

    impl ObjectStore for BrokenObjects {
        async fn upload(&self, _name: &str, _data: &[u8]) -> Result<String, UploadError> {
            Err(UploadError::Storage("bucket unreachable".to_string()))
        }

        fn public_url(&self, storage_key: &str) -> String {
            format!("broken://{storage_key}")
        }
    }

    type Quota = Arc<QuotaService<Arc<ManualClock>>>;

    fn quota(limit: u32) -> Quota {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        Arc::new(QuotaService::new(limit, Arc::new(ManualClock::new(now))))
    }

    fn config() -> TurnEngineConfig {
        TurnEngineConfig {
            client_id: "tester".to_string(),
            typing_delay: Duration::from_millis(50),
            reply_seed: Some(7),
            personas: PERSONAS,
        }
    }

    async fn engine_with<O: ObjectStore + 'static>(
        kv: Arc<FlakyKv>,
        objects: O,
        quota: Quota,
    ) -> TurnEngine<Arc<FlakyKv>, O, Quota> {
        let store = ConversationStore::load(kv, SessionSeed::default()).await;
        TurnEngine::new(store, objects, quota, config())
    }

    async fn engine(limit: u32) -> TurnEngine<Arc<FlakyKv>, Arc<MemoryObjectStore>, Quota> {
        engine_with(
            Arc::new(FlakyKv::default()),
            Arc::new(MemoryObjectStore::new()),
            quota(limit),
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn text_turn_appends_user_then_persona_reply() {
        let engine = engine(10).await;
        let session_id = engine.active_session().await.unwrap().id;

        let handle = engine.send_text("  What do you build?  ").await.unwrap();
        assert_eq!(handle.session_id, session_id);
        assert_eq!(handle.user_message.text, "What do you build?");
        assert_eq!(handle.usage.remaining_count, 9);

        let reply = handle.wait().await.unwrap().unwrap();
        assert!(!reply.is_user);
        let persona = reply.persona.as_ref().unwrap();
        let source = PERSONAS.iter().find(|p| p.id == persona.id).unwrap();
        assert!(source.replies.contains(&reply.text.as_str()));

        let session = engine.session(session_id).await.unwrap();
        assert_eq!(session.messages.len(), 3);
        assert!(session.messages[1].is_user);
        assert!(!session.messages[2].is_user);
        assert!(engine.phase().is_idle());
        assert_eq!(engine.pending_turns(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_consumes_nothing() {
        let engine = engine(10).await;
        let before = engine.snapshot().await;

        let err = engine.send_text("   \n\t").await.unwrap_err();
        assert!(matches!(err, TurnError::EmptyMessage));
        assert_eq!(engine.usage().await.unwrap().remaining_count, 10);
        assert_eq!(engine.snapshot().await, before);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_appends_nothing() {
        let engine = engine(1).await;
        engine.send_text("first").await.unwrap().wait().await.unwrap();
        let before = engine.snapshot().await;

        let err = engine.send_text("second").await.unwrap_err();
        assert!(matches!(err, TurnError::QuotaExceeded { retry_after_hours } if retry_after_hours >= 1));
        assert_eq!(engine.snapshot().await, before);
        assert!(engine.phase().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn reply_lands_in_originating_session_after_switch() {
        let engine = engine(10).await;
        let origin = engine.active_session().await.unwrap().id;

        let handle = engine.send_text("hello").await.unwrap();
        let other = engine.create_session().await.unwrap().id;
        assert_eq!(engine.active_session().await.unwrap().id, other);

        let reply = handle.wait().await.unwrap();
        assert!(reply.is_some());
        assert_eq!(engine.session(origin).await.unwrap().messages.len(), 3);
        assert_eq!(engine.session(other).await.unwrap().messages.len(), 1);
        assert_eq!(engine.active_session().await.unwrap().id, other);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_a_session_cancels_its_reply() {
        let engine = engine(10).await;
        let origin = engine.active_session().await.unwrap().id;
        engine.create_session().await.unwrap();
        engine.switch_session(origin).await.unwrap();

        let handle = engine.send_text("hello").await.unwrap();
        let outcome = engine.delete_session(origin).await.unwrap();
        assert_ne!(outcome.active_session_id, origin);

        assert!(handle.wait().await.unwrap().is_none());
        assert!(engine.session(origin).await.is_none());
        assert_eq!(engine.list_sessions().await.len(), 1);
        assert!(engine.phase().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_turn_drops_only_that_reply() {
        let engine = engine(10).await;
        let first = engine.send_text("one").await.unwrap();
        let second = engine.send_text("two").await.unwrap();
        assert_eq!(engine.pending_turns(), 2);

        assert!(engine.cancel_turn(first.turn_id));
        assert!(first.wait().await.unwrap().is_none());
        assert!(second.wait().await.unwrap().is_some());
        assert!(!engine.cancel_turn(Uuid::now_v7()));
    }

    #[tokio::test(start_paused = true)]
    async fn attachment_turn_carries_uploaded_object() {
        let objects = Arc::new(MemoryObjectStore::new());
        let engine = engine_with(
            Arc::new(FlakyKv::default()),
            Arc::clone(&objects),
            quota(10),
        )
        .await;

        let handle = engine
            .send_attachment("brief.pdf", b"%PDF-1.7", " our brief ")
            .await
            .unwrap();
        let attachment = &handle.user_message.attachments[0];
        assert_eq!(handle.user_message.text, "our brief");
        assert_eq!(attachment.kind, AttachmentKind::File);
        assert_eq!(attachment.size_bytes, 8);
        assert_eq!(attachment.url, format!("memory://{}", attachment.storage_key));
        assert_eq!(objects.object(&attachment.storage_key).unwrap(), b"%PDF-1.7");

        let reply = handle.wait().await.unwrap().unwrap();
        let persona = reply.persona.as_ref().unwrap();
        let source = PERSONAS.iter().find(|p| p.id == persona.id).unwrap();
        assert!(source.attachment_replies.contains(&reply.text.as_str()));
    }

    /// Quota gate that, like the HTTP gate, cannot give units back.
    struct NoRefund(Quota);

    impl QuotaGate for NoRefund {
        async fn try_consume(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
            QuotaGate::try_consume(&self.0, client_id).await
        }

        async fn peek(&self, client_id: &str) -> Result<UsageSnapshot, QuotaError> {
            QuotaGate::peek(&self.0, client_id).await
        }

        async fn refund(&self, _client_id: &str) -> Result<(), QuotaError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_never_consumes_without_refund() {
        let quota = quota(10);
        let store = ConversationStore::load(MemoryKvStore::new(), SessionSeed::default()).await;
        let engine = TurnEngine::new(store, BrokenObjects, NoRefund(Arc::clone(&quota)), config());
        let before = engine.snapshot().await;

        let err = engine
            .send_attachment("logo.png", b"png", "")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::UploadFailed(UploadError::Storage(_))));
        assert_eq!(engine.snapshot().await, before);
        assert_eq!(QuotaService::peek(&quota, "tester").remaining_count, 10);
        assert!(engine.phase().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_turn_keeps_pending_reply_typing() {
        let engine = engine(1).await;
        let first = engine.send_text("one").await.unwrap();
        let typing = TurnPhase::BotTyping {
            session_id: first.session_id,
            turn_id: first.turn_id,
        };

        let err = engine.send_text("two").await.unwrap_err();
        assert!(matches!(err, TurnError::QuotaExceeded { .. }));
        assert_eq!(engine.phase(), typing);

        let err = engine.send_attachment("a.png", b"png", "").await.unwrap_err();
        assert!(matches!(err, TurnError::QuotaExceeded { .. }));
        assert_eq!(engine.phase(), typing);

        first.wait().await.unwrap();
        assert!(engine.phase().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_upload_appends_nothing() {
        let quota = quota(10);
        let engine = engine_with(Arc::new(FlakyKv::default()), BrokenObjects, Arc::clone(&quota)).await;
        let before = engine.snapshot().await;

        let err = engine
            .send_attachment("logo.png", b"png", "")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::UploadFailed(UploadError::Storage(_))));
        assert_eq!(engine.snapshot().await, before);
        assert_eq!(QuotaService::peek(&quota, "tester").remaining_count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_or_empty_attachment_is_rejected_before_quota() {
        let engine = engine(10).await;

        let err = engine.send_attachment("empty.txt", b"", "").await.unwrap_err();
        assert!(matches!(err, TurnError::UploadFailed(UploadError::EmptyPayload(_))));

        let big = vec![0u8; MAX_ATTACHMENT_BYTES as usize + 1];
        let err = engine.send_attachment("big.bin", &big, "").await.unwrap_err();
        assert!(matches!(err, TurnError::UploadFailed(UploadError::TooLarge { .. })));

        assert_eq!(engine.usage().await.unwrap().remaining_count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_user_write_refunds_quota() {
        let kv = Arc::new(FlakyKv::default());
        let quota = quota(10);
        let engine = engine_with(
            Arc::clone(&kv),
            Arc::new(MemoryObjectStore::new()),
            Arc::clone(&quota),
        )
        .await;
        let before = engine.snapshot().await;

        kv.fail_writes.store(true, Ordering::SeqCst);
        let err = engine.send_text("hello").await.unwrap_err();
        assert!(matches!(err, TurnError::Persistence(_)));
        assert_eq!(engine.snapshot().await, before);
        assert_eq!(QuotaService::peek(&quota, "tester").remaining_count, 10);
        assert!(engine.phase().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reply_write_is_reported() {
        let kv = Arc::new(FlakyKv::default());
        let engine = engine_with(
            Arc::clone(&kv),
            Arc::new(MemoryObjectStore::new()),
            quota(10),
        )
        .await;

        let handle = engine.send_text("hello").await.unwrap();
        kv.fail_writes.store(true, Ordering::SeqCst);
        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, TurnError::Persistence(_)));
        let session = engine.active_session().await.unwrap();
        assert_eq!(session.messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn phase_reports_typing_until_reply() {
        let engine = engine(10).await;
        let rx = engine.subscribe();

        let handle = engine.send_text("hello").await.unwrap();
        assert_eq!(
            *rx.borrow(),
            TurnPhase::BotTyping {
                session_id: handle.session_id,
                turn_id: handle.turn_id,
            }
        );

        handle.wait().await.unwrap();
        assert!(rx.borrow().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_replies() {
        let engine = engine(10).await;
        let handle = engine.send_text("hello").await.unwrap();
        engine.cancel_all();
        assert!(handle.wait().await.unwrap().is_none());
        assert_eq!(engine.active_session().await.unwrap().messages.len(), 2);
    }
}
