//! The relationship store: profiles, friend requests, friendships, chats,
//! messages and typing indicators.
//!
//! Components only see [`Store`]; uniqueness of canonical pairs and of pending
//! requests is the store's job and shows up as [`crate::AppError::Conflict`] on insert.
//! Chat-scoped calls take the acting user and refuse non-members, the way a
//! row-level policy would.

pub mod models;
mod sqlite;

pub use sqlite::SqliteStore;

#[cfg(test)]
pub(crate) use sqlite::tests as testing;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppResult, pairing::CanonicalPair};

use models::{
    Chat, FriendRequest, Friendship, Message, MessageDraft, PresenceStatus, Profile, ProfileDraft, RequestStatus,
    TypingIndicator,
};

/// Where presence writes land. Split out so the reporter can run against anything.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    async fn set_presence(&self, user_id: &str, status: PresenceStatus) -> AppResult<()>;
}

#[async_trait]
pub trait Store: PresenceSink {
    async fn upsert_profile(&self, user_id: &str, draft: ProfileDraft) -> AppResult<Profile>;
    async fn get_profile(&self, user_id: &str) -> AppResult<Option<Profile>>;
    /// Case-insensitive substring search on usernames, excluding `viewer`.
    async fn search_profiles(&self, query: &str, viewer: &str, limit: u32) -> AppResult<Vec<Profile>>;
    /// Marks every non-offline profile last seen before `cutoff` as offline.
    async fn mark_stale_offline(&self, cutoff: OffsetDateTime) -> AppResult<Vec<String>>;

    async fn find_pending_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<Option<FriendRequest>>;
    async fn insert_friend_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<FriendRequest>;
    async fn get_friend_request(&self, id: Uuid) -> AppResult<Option<FriendRequest>>;
    /// Moves a pending request to `status`. `None` when it was no longer pending.
    async fn transition_request(&self, id: Uuid, status: RequestStatus) -> AppResult<Option<FriendRequest>>;
    async fn pending_requests_for(&self, receiver_id: &str) -> AppResult<Vec<FriendRequest>>;

    async fn find_friendship(&self, pair: &CanonicalPair) -> AppResult<Option<Friendship>>;
    async fn insert_friendship(&self, pair: &CanonicalPair) -> AppResult<Friendship>;
    /// Profiles of everyone `user_id` is friends with, by username.
    async fn friends_of(&self, user_id: &str) -> AppResult<Vec<Profile>>;

    async fn find_chat(&self, pair: &CanonicalPair) -> AppResult<Option<Chat>>;
    async fn get_chat(&self, id: Uuid) -> AppResult<Option<Chat>>;
    async fn insert_chat(&self, pair: &CanonicalPair) -> AppResult<Chat>;
    async fn touch_chat(&self, id: Uuid) -> AppResult<()>;
    /// The chat, if `user_id` may act in it.
    async fn authorize_chat(&self, chat_id: Uuid, user_id: &str) -> AppResult<Chat>;

    async fn insert_message(&self, chat_id: Uuid, sender_id: &str, draft: MessageDraft) -> AppResult<Message>;
    /// Most recent `limit` messages, oldest first.
    async fn list_messages(&self, chat_id: Uuid, viewer: &str, limit: u32) -> AppResult<Vec<Message>>;
    /// `None` when no row matched, including when `sender_id` is not the sender.
    async fn edit_message(&self, chat_id: Uuid, id: Uuid, sender_id: &str, content: Option<String>)
    -> AppResult<Option<Message>>;
    async fn soft_delete_message(&self, chat_id: Uuid, id: Uuid, sender_id: &str) -> AppResult<Option<Message>>;

    async fn upsert_typing(&self, chat_id: Uuid, user_id: &str, is_typing: bool) -> AppResult<TypingIndicator>;
}
