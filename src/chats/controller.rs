use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppResult,
    db::{
        Store,
        models::{Message, MessageDraft, TypingIndicator},
    },
    feed::{Dispatcher, Entity, Op, Registration, Topic},
};

/// Page size of a chat's message history.
pub const HISTORY_LIMIT: u32 = 200;

/// Something that happened in one chat, as a subscriber sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    Message { op: Op, message: Message },
    Typing { indicator: TypingIndicator },
}

/// A chat subscription; the feed registration goes away with it.
pub struct ChatSubscription {
    chat_id: Uuid,
    registration: Registration,
}

impl ChatSubscription {
    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    /// Next event in feed order, `None` once the session's dispatcher is gone.
    pub async fn next(&mut self) -> Option<ChatEvent> {
        loop {
            let change = self.registration.recv().await?;
            match change.entity {
                Entity::Message(message) => return Some(ChatEvent::Message { op: change.op, message }),
                Entity::Typing(indicator) => return Some(ChatEvent::Typing { indicator }),
                _ => continue,
            }
        }
    }
}

#[derive(Clone)]
pub struct ChatController {
    store: Arc<dyn Store>,
}

impl ChatController {
    pub fn new(store: Arc<dyn Store>) -> ChatController {
        ChatController { store }
    }

    pub async fn list_messages(&self, chat_id: Uuid, viewer_id: &str) -> AppResult<Vec<Message>> {
        self.store.list_messages(chat_id, viewer_id, HISTORY_LIMIT).await
    }

    /// Stores the message and bumps the chat. A failed bump does not fail the post.
    pub async fn post_message(&self, chat_id: Uuid, sender_id: &str, draft: MessageDraft) -> AppResult<Message> {
        let message = self.store.insert_message(chat_id, sender_id, draft).await?;
        if let Err(err) = self.store.touch_chat(chat_id).await {
            tracing::warn!(%chat_id, error = %err, "could not bump chat timestamp");
        }
        Ok(message)
    }

    /// `false` when nothing changed: not the sender, no such message, or already deleted.
    pub async fn edit_message(&self, chat_id: Uuid, message_id: Uuid, editor_id: &str, content: String) -> AppResult<bool> {
        self.store.authorize_chat(chat_id, editor_id).await?;
        let edited = self.store.edit_message(chat_id, message_id, editor_id, Some(content)).await?;
        Ok(edited.is_some())
    }

    /// Same ownership rule as [`ChatController::edit_message`].
    pub async fn soft_delete_message(&self, chat_id: Uuid, message_id: Uuid, requester_id: &str) -> AppResult<bool> {
        self.store.authorize_chat(chat_id, requester_id).await?;
        let deleted = self.store.soft_delete_message(chat_id, message_id, requester_id).await?;
        Ok(deleted.is_some())
    }

    pub async fn set_typing(&self, chat_id: Uuid, user_id: &str, is_typing: bool) -> AppResult<TypingIndicator> {
        self.store.upsert_typing(chat_id, user_id, is_typing).await
    }

    pub async fn subscribe_to_chat(
        &self,
        dispatcher: &Dispatcher,
        chat_id: Uuid,
        viewer_id: &str,
    ) -> AppResult<ChatSubscription> {
        self.store.authorize_chat(chat_id, viewer_id).await?;
        Ok(ChatSubscription {
            chat_id,
            registration: dispatcher.register(Topic::Chat(chat_id)),
        })
    }
}
