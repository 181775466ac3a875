use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::{Conversation, Message};
use crate::prompts;
use crate::services::abuse::{self, AbuseReason, ContentClassifier, DuplicateTracker};
use crate::services::backend::{ChatBackend, ImageBackend};
use crate::services::conversation::ConversationStore;

/// Client-side pacing and limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub cooldown: Duration,
    pub typing_delay: Duration,
    pub message_cap: usize,
    pub duplicate_window: Duration,
    pub duplicate_limit: usize,
    pub duplicate_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            typing_delay: Duration::from_secs(2),
            message_cap: 15,
            duplicate_window: Duration::from_secs(60),
            duplicate_limit: 2,
            duplicate_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Thinking,
    Typing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Cooldown,
    Abuse(AbuseReason),
    MessageLimit,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Cooldown => "COOLDOWN",
            Rejection::Abuse(_) => "CONTENT_VIOLATION",
            Rejection::MessageLimit => "MESSAGE_LIMIT_EXCEEDED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text, or a request already in flight.
    Ignored,
    /// Refused by a guard; a canned notice was appended instead.
    Rejected(Rejection),
    Delivered,
    /// The backend failed; an error message was appended.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendKind {
    Chat,
    Image,
}

impl SendKind {
    fn notice(&self, rejection: Rejection) -> &'static str {
        match (rejection, self) {
            (Rejection::Cooldown, _) => prompts::COOLDOWN_NOTICE,
            (Rejection::Abuse(_), SendKind::Chat) => prompts::CHAT_ABUSE_NOTICE,
            (Rejection::Abuse(_), SendKind::Image) => prompts::IMAGE_ABUSE_NOTICE,
            (Rejection::MessageLimit, SendKind::Chat) => prompts::CHAT_LIMIT_NOTICE,
            (Rejection::MessageLimit, SendKind::Image) => prompts::IMAGE_LIMIT_NOTICE,
        }
    }
}

/// A send that passed every guard. The user message is already stored.
pub(crate) struct Admitted {
    pub conversation_id: String,
    /// Conversation messages as they were before this send.
    pub history: Vec<Message>,
    /// Flow generation at admission; a conversation switch supersedes it.
    pub generation: u64,
}

struct Guards {
    last_send: Option<Instant>,
    duplicates: DuplicateTracker,
    /// Set from admission until the backend call and typing phase finish.
    in_flight: bool,
}

/// Drives one user's conversation: guards, store updates, backend calls and
/// the `idle -> thinking -> typing -> idle` cycle.
pub struct ChatSession {
    pub(crate) store: Mutex<ConversationStore>,
    pub(crate) chat_backend: Arc<dyn ChatBackend>,
    pub(crate) image_backend: Arc<dyn ImageBackend>,
    classifier: Arc<dyn ContentClassifier>,
    pub(crate) config: SessionConfig,
    state: watch::Sender<ChatState>,
    guards: Mutex<Guards>,
    generation: AtomicU64,
    pub(crate) typing: StdMutex<Option<CancellationToken>>,
}

impl ChatSession {
    pub fn new(
        store: ConversationStore,
        chat_backend: Arc<dyn ChatBackend>,
        image_backend: Arc<dyn ImageBackend>,
        classifier: Arc<dyn ContentClassifier>,
        config: SessionConfig,
    ) -> Self {
        let duplicates = DuplicateTracker::new(
            config.duplicate_window,
            config.duplicate_limit,
            config.duplicate_capacity,
        );
        Self {
            store: Mutex::new(store),
            chat_backend,
            image_backend,
            classifier,
            config,
            state: watch::Sender::new(ChatState::Idle),
            guards: Mutex::new(Guards {
                last_send: None,
                duplicates,
                in_flight: false,
            }),
            generation: AtomicU64::new(0),
            typing: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> ChatState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ChatState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(?previous, ?state, "Chat state changed");
        }
    }

    /// Move to `state` on behalf of the send admitted at `generation`.
    /// Returns false, leaving the state untouched, once that send has been
    /// superseded by a conversation switch.
    pub(crate) fn set_state_for(&self, generation: u64, state: ChatState) -> bool {
        let mut current = false;
        self.state.send_if_modified(|value| {
            current = self.generation.load(Ordering::SeqCst) == generation;
            if !current || *value == state {
                return false;
            }
            tracing::debug!(previous = ?*value, ?state, "Chat state changed");
            *value = state;
            true
        });
        current
    }

    /// Release the send slot held by `admitted`.
    pub(crate) async fn finish(&self, admitted: &Admitted) {
        if !self.set_state_for(admitted.generation, ChatState::Idle) {
            tracing::debug!("Send finished after a conversation switch");
        }
        self.guards.lock().await.in_flight = false;
    }

    pub async fn active_conversation(&self) -> Option<Conversation> {
        self.store.lock().await.active().cloned()
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.store
            .lock()
            .await
            .list()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn new_conversation(&self) -> String {
        self.reset_flow();
        let mut store = self.store.lock().await;
        let id = store.start_new();
        persist(&store).await;
        id
    }

    pub async fn select_conversation(&self, id: &str) -> bool {
        let mut store = self.store.lock().await;
        if !store.select(id) {
            return false;
        }
        self.reset_flow();
        persist(&store).await;
        true
    }

    /// Delete a conversation. Only deleting the active one resets the flow.
    pub async fn delete_conversation(&self, id: &str) -> bool {
        let mut store = self.store.lock().await;
        let was_active = store.active_id() == Some(id);
        if !store.delete(id) {
            return false;
        }
        if was_active {
            self.reset_flow();
        }
        persist(&store).await;
        true
    }

    pub async fn clear_all(&self) -> String {
        self.reset_flow();
        let mut store = self.store.lock().await;
        let id = store.clear_all();
        persist(&store).await;
        id
    }

    /// Return the visible state to idle. A request still in flight keeps the
    /// send slot but no longer drives the state.
    fn reset_flow(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_typing();
        self.set_state(ChatState::Idle);
    }

    pub(crate) fn cancel_typing(&self) {
        let token = self
            .typing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Run the guard sequence for `text`. On success the user message has been
    /// appended and the state is `Thinking`.
    pub(crate) async fn admit(&self, text: &str, kind: SendKind) -> Result<Admitted, SendOutcome> {
        if text.trim().is_empty() {
            return Err(SendOutcome::Ignored);
        }

        let mut guards = self.guards.lock().await;
        if guards.in_flight || self.state() != ChatState::Idle {
            return Err(SendOutcome::Ignored);
        }

        let mut store = self.store.lock().await;
        let conversation_id = store.ensure_active();
        let now = Instant::now();

        if let Some(rejection) = self.check(&mut guards, &store, &conversation_id, text, now) {
            tracing::info!(code = rejection.code(), ?rejection, "Send rejected");
            if let Err(e) =
                store.append_message(&conversation_id, Message::assistant(kind.notice(rejection)))
            {
                tracing::error!("Failed to append notice: {}", e);
            }
            persist(&store).await;
            return Err(SendOutcome::Rejected(rejection));
        }

        guards.last_send = Some(now);
        guards.in_flight = true;
        let generation = self.generation.load(Ordering::SeqCst);
        let history = store
            .get(&conversation_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default();

        if let Err(e) = store.append_message(&conversation_id, Message::user(text)) {
            tracing::error!("Failed to append user message: {}", e);
        }
        self.set_state_for(generation, ChatState::Thinking);
        persist(&store).await;

        Ok(Admitted {
            conversation_id,
            history,
            generation,
        })
    }

    fn check(
        &self,
        guards: &mut Guards,
        store: &ConversationStore,
        conversation_id: &str,
        text: &str,
        now: Instant,
    ) -> Option<Rejection> {
        if guards
            .last_send
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.cooldown)
        {
            return Some(Rejection::Cooldown);
        }

        if abuse::is_too_short(text) {
            return Some(Rejection::Abuse(AbuseReason::TooShort));
        }
        if let Err(reason) = guards.duplicates.check(text, now) {
            return Some(Rejection::Abuse(reason));
        }
        let verdict = self.classifier.classify(text);
        if !verdict.allowed {
            return Some(Rejection::Abuse(
                verdict.reason.unwrap_or(AbuseReason::Other),
            ));
        }

        let user_messages = store
            .get(conversation_id)
            .map(Conversation::user_message_count)
            .unwrap_or(0);
        if user_messages >= self.config.message_cap {
            return Some(Rejection::MessageLimit);
        }

        None
    }

    /// Append to a conversation and persist; failures are logged.
    pub(crate) async fn append(&self, conversation_id: &str, message: Message) {
        let mut store = self.store.lock().await;
        if let Err(e) = store.append_message(conversation_id, message) {
            tracing::warn!("Dropping message for missing conversation: {}", e);
            return;
        }
        persist(&store).await;
    }
}

pub(crate) async fn persist(store: &ConversationStore) {
    if let Err(e) = store.save().await {
        tracing::error!("Failed to save conversations: {}", e);
    }
}
