use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dialogue::conversation::{ActionHandler, Conversation, DialogueError, Turn};
use crate::dialogue::states::{ConversationState, Script, Vocabulary};
use crate::errors::SessionConflictError;
use crate::reply::ReplyPayload;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Conversations are scoped to one user in one channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub user_id: String,
    pub channel_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), channel_id: channel_id.into() }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user_id, self.channel_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartOutcome {
    pub replies: Vec<ReplyPayload>,
    pub replaced: Option<SessionConflictError>,
}

type SessionSlot = Arc<AsyncMutex<Conversation>>;

/// Owns every active conversation.
///
/// The index is a plain mutex that is only held to look up, insert, or remove a slot.
/// Each conversation sits behind its own async mutex, which is held for the whole turn
/// (including any invoked action), so two messages for one key are handled one after the
/// other while different keys never wait on each other.
pub struct DialogueEngine {
    sessions: Mutex<HashMap<SessionKey, SessionSlot>>,
    vocabulary: Vocabulary,
    idle_timeout: Duration,
}

impl Default for DialogueEngine {
    fn default() -> Self {
        Self::new(Vocabulary::default(), DEFAULT_IDLE_TIMEOUT)
    }
}

impl DialogueEngine {
    pub fn new(vocabulary: Vocabulary, idle_timeout: Duration) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), vocabulary, idle_timeout }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Starts `script` for `key`, aborting whatever conversation the key already had.
    pub async fn start(&self, key: SessionKey, script: Arc<Script>) -> StartOutcome {
        let script_name = script.name().to_owned();
        let (conversation, replies) = Conversation::start(script);
        let slot = Arc::new(AsyncMutex::new(conversation));
        let previous = self.lock_sessions().insert(key.clone(), slot);

        let mut replaced = None;
        if let Some(previous) = previous {
            let mut previous = previous.lock().await;
            let was_live = previous.state().is_active()
                && !previous.is_idle(Instant::now(), self.idle_timeout);
            previous.abort();
            if was_live {
                warn!(
                    event_name = "dialogue.session.replaced",
                    session = %key,
                    previous_script = previous.script().name(),
                    script = %script_name,
                    "aborted active conversation to start a new one"
                );
                replaced = Some(SessionConflictError { key: key.clone() });
            }
        }

        info!(
            event_name = "dialogue.session.started",
            session = %key,
            script = %script_name,
            "conversation started"
        );
        StartOutcome { replies, replaced }
    }

    /// Feeds `answer` to the key's conversation.
    ///
    /// Returns `Ok(None)` when the key has no live conversation, so the caller can fall
    /// back to intent matching. Finished and failed conversations are released here.
    pub async fn submit<H>(
        &self,
        key: &SessionKey,
        answer: &str,
        handler: &H,
    ) -> Result<Option<Turn>, DialogueError>
    where
        H: ActionHandler + ?Sized,
    {
        let Some(slot) = self.slot(key) else {
            return Ok(None);
        };

        let mut conversation = slot.lock().await;
        if !conversation.state().is_active() {
            drop(conversation);
            self.release(key, &slot);
            return Ok(None);
        }
        if conversation.is_idle(Instant::now(), self.idle_timeout) {
            conversation.abort();
            drop(conversation);
            self.release(key, &slot);
            info!(
                event_name = "dialogue.session.expired",
                session = %key,
                "conversation timed out"
            );
            return Ok(None);
        }

        let result = conversation.submit(answer, &self.vocabulary, handler).await;
        let state = conversation.state();
        let script_name = conversation.script().name().to_owned();
        drop(conversation);

        if !state.is_active() {
            self.release(key, &slot);
            match state {
                ConversationState::Completed => info!(
                    event_name = "dialogue.session.completed",
                    session = %key,
                    script = %script_name,
                    "conversation completed"
                ),
                _ => warn!(
                    event_name = "dialogue.session.aborted",
                    session = %key,
                    script = %script_name,
                    "conversation aborted"
                ),
            }
        } else {
            debug!(
                event_name = "dialogue.session.advanced",
                session = %key,
                state = ?state,
                "turn handled"
            );
        }

        result.map(Some)
    }

    /// Destroys the key's conversation in whatever state it is in.
    pub async fn abort(&self, key: &SessionKey) -> bool {
        let Some(slot) = self.lock_sessions().remove(key) else {
            return false;
        };
        slot.lock().await.abort();
        info!(
            event_name = "dialogue.session.aborted",
            session = %key,
            "conversation aborted on request"
        );
        true
    }

    /// Whether a message for `key` should be routed to its conversation.
    pub fn has_session(&self, key: &SessionKey) -> bool {
        let Some(slot) = self.slot(key) else {
            return false;
        };
        let live = match slot.try_lock() {
            Ok(conversation) => {
                conversation.state().is_active()
                    && !conversation.is_idle(Instant::now(), self.idle_timeout)
            }
            // A turn is in flight, so the conversation is live.
            Err(_) => true,
        };
        live
    }

    pub fn session_state(&self, key: &SessionKey) -> Option<ConversationState> {
        let slot = self.slot(key)?;
        let conversation = slot.try_lock().ok()?;
        Some(conversation.state())
    }

    pub fn active_sessions(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Aborts and releases idle conversations. Conversations with a turn in flight are
    /// skipped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock_sessions();
        let before = sessions.len();
        sessions.retain(|key, slot| match slot.try_lock() {
            Ok(mut conversation) => {
                let keep = conversation.state().is_active()
                    && !conversation.is_idle(now, self.idle_timeout);
                if !keep {
                    conversation.abort();
                    debug!(
                        event_name = "dialogue.session.expired",
                        session = %key,
                        "released idle conversation"
                    );
                }
                keep
            }
            Err(_) => true,
        });
        before - sessions.len()
    }

    fn slot(&self, key: &SessionKey) -> Option<SessionSlot> {
        self.lock_sessions().get(key).cloned()
    }

    fn release(&self, key: &SessionKey, slot: &SessionSlot) {
        let mut sessions = self.lock_sessions();
        if sessions.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            sessions.remove(key);
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, SessionSlot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
