use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;

use crate::models::{Conversation, Message, Role, NEW_CHAT_TITLE};
use crate::services::store::KeyValueStore;

pub const CONVERSATIONS_KEY: &str = "flirtina_conversations";
pub const ACTIVE_CONVERSATION_KEY: &str = "flirtina_current_conversation_id";

const TITLE_LENGTH: usize = 30;

/// In-memory view of every conversation plus the active selection, written
/// through to a [`KeyValueStore`] on [`save`](Self::save).
pub struct ConversationStore {
    backend: Arc<dyn KeyValueStore>,
    conversations: HashMap<String, Conversation>,
    active_id: Option<String>,
}

impl ConversationStore {
    /// Restore persisted state. Unreadable conversation data is discarded and
    /// the store starts over with a fresh conversation.
    pub async fn load(backend: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut conversations = match backend.get(CONVERSATIONS_KEY).await? {
            Some(raw) => match serde_json::from_str::<HashMap<String, Conversation>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("Discarding unreadable conversation data: {}", e);
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };
        collapse_empty(&mut conversations);

        let saved_active = backend.get(ACTIVE_CONVERSATION_KEY).await?;

        let mut store = Self {
            backend,
            conversations,
            active_id: None,
        };

        store.active_id = match saved_active {
            Some(id) if store.conversations.contains_key(&id) => Some(id),
            _ => store.most_recent_id(),
        };
        store.ensure_active();

        tracing::debug!(
            conversations = store.conversations.len(),
            active = ?store.active_id,
            "Loaded conversation store"
        );
        Ok(store)
    }

    /// Write the conversation map and the active id to the backend.
    pub async fn save(&self) -> Result<()> {
        let mut cleaned = self.conversations.clone();
        collapse_empty(&mut cleaned);

        let json = serde_json::to_string(&cleaned)?;
        self.backend.put(CONVERSATIONS_KEY, &json).await?;

        match self.active_id.as_deref() {
            Some(id) if cleaned.contains_key(id) => {
                self.backend.put(ACTIVE_CONVERSATION_KEY, id).await?
            }
            _ => self.backend.delete(ACTIVE_CONVERSATION_KEY).await?,
        }
        Ok(())
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id
            .as_deref()
            .and_then(|id| self.conversations.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Conversations ordered by most recent activity first.
    pub fn list(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.values().collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list
    }

    /// Return the active conversation id, creating a conversation if needed.
    pub fn ensure_active(&mut self) -> String {
        if let Some(id) = self
            .active_id
            .as_ref()
            .filter(|id| self.conversations.contains_key(*id))
        {
            return id.clone();
        }
        self.insert_new()
    }

    /// Begin a fresh conversation. Existing empty conversations are dropped so
    /// at most one empty one exists.
    pub fn start_new(&mut self) -> String {
        self.conversations.retain(|_, c| !c.is_empty_untitled());
        self.insert_new()
    }

    pub fn select(&mut self, id: &str) -> bool {
        if self.conversations.contains_key(id) {
            self.active_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Remove a conversation. When it was active, the most recent remaining
    /// conversation becomes active, or a new one is created.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.conversations.remove(id).is_none() {
            return false;
        }
        if self.active_id.as_deref() == Some(id) {
            self.active_id = self.most_recent_id();
            self.ensure_active();
        }
        true
    }

    pub fn clear_all(&mut self) -> String {
        self.conversations.clear();
        self.active_id = None;
        self.insert_new()
    }

    /// Append a message. The first user message names the conversation.
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        let conversation = self
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| anyhow!("Conversation not found: {}", conversation_id))?;

        if message.role == Role::User
            && conversation.title == NEW_CHAT_TITLE
            && !conversation.has_user_message()
        {
            conversation.title = truncate_title(&message.content);
        }

        conversation.messages.push(message);
        conversation.updated_at = Utc::now();
        Ok(())
    }

    pub fn remove_message(&mut self, conversation_id: &str, message_id: &str) -> Option<Message> {
        let conversation = self.conversations.get_mut(conversation_id)?;
        let idx = conversation
            .messages
            .iter()
            .position(|m| m.id == message_id)?;
        conversation.updated_at = Utc::now();
        Some(conversation.messages.remove(idx))
    }

    fn insert_new(&mut self) -> String {
        let conversation = Conversation::new();
        let id = conversation.id.clone();
        self.conversations.insert(id.clone(), conversation);
        self.active_id = Some(id.clone());
        id
    }

    fn most_recent_id(&self) -> Option<String> {
        self.conversations
            .values()
            .max_by_key(|c| c.updated_at)
            .map(|c| c.id.clone())
    }
}

/// Keep only the most recently updated empty untitled conversation.
fn collapse_empty(conversations: &mut HashMap<String, Conversation>) {
    let keep = conversations
        .values()
        .filter(|c| c.is_empty_untitled())
        .max_by_key(|c| c.updated_at)
        .map(|c| c.id.clone());

    conversations.retain(|id, c| !c.is_empty_untitled() || Some(id) == keep.as_ref());
}

/// Shorten text to a conversation title.
pub fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_LENGTH {
        let cut: String = text.chars().take(TITLE_LENGTH).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    async fn empty_store() -> (ConversationStore, Arc<MemoryStore>) {
        let backend = Arc::new(MemoryStore::new());
        let store = ConversationStore::load(backend.clone()).await.unwrap();
        (store, backend)
    }

    fn conversation_at(minutes: i64, with_message: bool) -> Conversation {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        let mut conversation = Conversation::new();
        conversation.created_at = at;
        conversation.updated_at = at;
        if with_message {
            conversation.title = "hello".to_string();
            conversation.messages.push(Message::user("hello"));
        }
        conversation
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("hi"), "hi");
        assert_eq!(truncate_title(&"a".repeat(30)), "a".repeat(30));
        assert_eq!(truncate_title(&"a".repeat(31)), format!("{}...", "a".repeat(30)));
        assert_eq!(truncate_title(&"é".repeat(40)), format!("{}...", "é".repeat(30)));
    }

    #[tokio::test]
    async fn test_load_without_saved_state_creates_conversation() {
        let (store, _) = empty_store().await;

        let active = store.active().unwrap();
        assert_eq!(active.title, NEW_CHAT_TITLE);
        assert!(active.messages.is_empty());
        assert_eq!(store.list().len(), 1);
    }

    #[tokio::test]
    async fn test_first_user_message_sets_title_once() {
        let (mut store, _) = empty_store().await;
        let id = store.ensure_active();

        store.append_message(&id, Message::user("hi")).unwrap();
        store.append_message(&id, Message::assistant("hey you")).unwrap();
        store.append_message(&id, Message::user("second message")).unwrap();

        let conversation = store.get(&id).unwrap();
        assert_eq!(conversation.title, "hi");
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.user_message_count(), 2);
        assert_eq!(conversation.messages[0].content, "hi");
        assert_eq!(conversation.messages[2].content, "second message");
    }

    #[tokio::test]
    async fn test_append_to_unknown_conversation_fails() {
        let (mut store, _) = empty_store().await;
        assert!(store.append_message("nope", Message::user("hi")).is_err());
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let (mut store, backend) = empty_store().await;
        let first = store.ensure_active();
        store.append_message(&first, Message::user("first chat")).unwrap();
        let second = store.start_new();
        store.append_message(&second, Message::user("second chat")).unwrap();
        store.select(&first);
        store.save().await.unwrap();

        let reloaded = ConversationStore::load(backend).await.unwrap();
        assert_eq!(reloaded.active_id(), Some(first.as_str()));
        assert_eq!(reloaded.get(&first), store.get(&first));
        assert_eq!(reloaded.get(&second), store.get(&second));
        assert_eq!(reloaded.list().len(), 2);
    }

    #[tokio::test]
    async fn test_load_collapses_empty_conversations() {
        let backend = Arc::new(MemoryStore::new());
        let older_empty = conversation_at(0, false);
        let newer_empty = conversation_at(5, false);
        let used = conversation_at(1, true);
        let map: HashMap<_, _> = [&older_empty, &newer_empty, &used]
            .into_iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();
        backend
            .put(CONVERSATIONS_KEY, &serde_json::to_string(&map).unwrap())
            .await
            .unwrap();
        backend.put(ACTIVE_CONVERSATION_KEY, &used.id).await.unwrap();

        let store = ConversationStore::load(backend).await.unwrap();
        assert_eq!(store.list().len(), 2);
        assert!(store.get(&newer_empty.id).is_some());
        assert!(store.get(&older_empty.id).is_none());
        assert_eq!(store.active_id(), Some(used.id.as_str()));
    }

    #[tokio::test]
    async fn test_load_with_stale_active_id_uses_most_recent() {
        let backend = Arc::new(MemoryStore::new());
        let older = conversation_at(0, true);
        let newer = conversation_at(10, true);
        let map: HashMap<_, _> = [&older, &newer]
            .into_iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();
        backend
            .put(CONVERSATIONS_KEY, &serde_json::to_string(&map).unwrap())
            .await
            .unwrap();
        backend.put(ACTIVE_CONVERSATION_KEY, "deleted-elsewhere").await.unwrap();

        let store = ConversationStore::load(backend).await.unwrap();
        assert_eq!(store.active_id(), Some(newer.id.as_str()));
    }

    #[tokio::test]
    async fn test_load_with_corrupt_data_starts_fresh() {
        let backend = Arc::new(MemoryStore::new());
        backend.put(CONVERSATIONS_KEY, "{not json").await.unwrap();

        let store = ConversationStore::load(backend).await.unwrap();
        assert_eq!(store.list().len(), 1);
        assert!(store.active().unwrap().is_empty_untitled());
    }

    #[tokio::test]
    async fn test_start_new_keeps_single_empty_conversation() {
        let (mut store, _) = empty_store().await;
        let first = store.ensure_active();

        let second = store.start_new();
        assert_ne!(first, second);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.active_id(), Some(second.as_str()));
    }

    #[tokio::test]
    async fn test_list_sorted_by_recent_activity() {
        let (mut store, _) = empty_store().await;
        let a = store.ensure_active();
        store.append_message(&a, Message::user("a")).unwrap();
        let b = store.start_new();
        store.append_message(&b, Message::user("b")).unwrap();

        store.conversations.get_mut(&a).unwrap().updated_at = Utc::now() + Duration::hours(1);

        let ids: Vec<&str> = store.list().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), b.as_str()]);
    }

    #[tokio::test]
    async fn test_delete_active_switches_to_most_recent() {
        let (mut store, _) = empty_store().await;
        let a = store.ensure_active();
        store.append_message(&a, Message::user("a")).unwrap();
        let b = store.start_new();
        store.append_message(&b, Message::user("b")).unwrap();

        assert!(store.delete(&b));
        assert_eq!(store.active_id(), Some(a.as_str()));

        assert!(store.delete(&a));
        let fresh = store.active().unwrap();
        assert!(fresh.is_empty_untitled());
        assert!(!store.delete("missing"));
    }

    #[tokio::test]
    async fn test_clear_all_and_save_removes_everything_else() {
        let (mut store, backend) = empty_store().await;
        let a = store.ensure_active();
        store.append_message(&a, Message::user("a")).unwrap();

        let fresh = store.clear_all();
        store.save().await.unwrap();

        let reloaded = ConversationStore::load(backend).await.unwrap();
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.active_id(), Some(fresh.as_str()));
    }

    #[tokio::test]
    async fn test_remove_message_by_id() {
        let (mut store, _) = empty_store().await;
        let id = store.ensure_active();
        let placeholder = Message::image_placeholder("a sunset");
        let placeholder_id = placeholder.id.clone();
        store.append_message(&id, Message::user("draw a sunset")).unwrap();
        store.append_message(&id, placeholder).unwrap();

        let removed = store.remove_message(&id, &placeholder_id).unwrap();
        assert!(removed.is_generating);
        assert_eq!(store.get(&id).unwrap().messages.len(), 1);
        assert!(store.remove_message(&id, &placeholder_id).is_none());
    }
}
