use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    FromRow, Row, SqlitePool,
    sqlite::{SqlitePoolOptions, SqliteRow},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    AppError, AppResult,
    feed::{Change, ChangeFeed, Entity},
    pairing::CanonicalPair,
};

use super::{
    PresenceSink, Store,
    models::{
        Chat, FriendRequest, Friendship, Message, MessageDraft, PresenceStatus, Profile, ProfileDraft, RequestStatus,
        TypingIndicator,
    },
};

/// [`Store`] over a sqlx sqlite pool. Every committed mutation is published on the feed.
pub struct SqliteStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Connects and runs the embedded migrations.
    pub async fn open(url: &str, max_connections: u32, feed: ChangeFeed) -> AppResult<SqliteStore> {
        let mut options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if url.contains(":memory:") {
            // each pooled connection would open its own empty database
            options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(url).await?;
        sqlx::migrate!().run(&pool).await?;
        Ok(SqliteStore { pool, feed })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn publish(&self, change: Change) {
        self.feed.publish(change);
    }
}

fn decode_err(col: &str, err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: col.to_owned(),
        source: Box::new(err),
    }
}

fn uuid_col(row: &SqliteRow, col: &str) -> sqlx::Result<Uuid> {
    let raw: String = row.try_get(col)?;
    Uuid::parse_str(&raw).map_err(|err| decode_err(col, err))
}

fn enum_col<T>(row: &SqliteRow, col: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(col)?;
    raw.parse().map_err(|err| decode_err(col, err))
}

/// Unique violations become [`AppError::Conflict`], anything else passes through.
fn conflict(err: sqlx::Error, what: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!("{what} already exists")),
        _ => err.into(),
    }
}

fn like_pattern(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

impl FromRow<'_, SqliteRow> for Profile {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Profile {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            full_name: row.try_get("full_name")?,
            avatar_url: row.try_get("avatar_url")?,
            bio: row.try_get("bio")?,
            status: enum_col(row, "status")?,
            last_seen: row.try_get("last_seen")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for FriendRequest {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(FriendRequest {
            id: uuid_col(row, "id")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            status: enum_col(row, "status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Friendship {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Friendship {
            id: uuid_col(row, "id")?,
            user_id_1: row.try_get("user_id_1")?,
            user_id_2: row.try_get("user_id_2")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Chat {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Chat {
            id: uuid_col(row, "id")?,
            user_id_1: row.try_get("user_id_1")?,
            user_id_2: row.try_get("user_id_2")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for Message {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Message {
            id: uuid_col(row, "id")?,
            chat_id: uuid_col(row, "chat_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            message_type: enum_col(row, "message_type")?,
            file_url: row.try_get("file_url")?,
            file_name: row.try_get("file_name")?,
            file_size: row.try_get("file_size")?,
            created_at: row.try_get("created_at")?,
            is_edited: row.try_get("is_edited")?,
            is_deleted: row.try_get("is_deleted")?,
        })
    }
}

impl FromRow<'_, SqliteRow> for TypingIndicator {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(TypingIndicator {
            chat_id: uuid_col(row, "chat_id")?,
            user_id: row.try_get("user_id")?,
            is_typing: row.try_get("is_typing")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl PresenceSink for SqliteStore {
    async fn set_presence(&self, user_id: &str, status: PresenceStatus) -> AppResult<()> {
        let profile: Option<Profile> =
            sqlx::query_as("UPDATE profiles SET status = ?1, last_seen = ?2 WHERE id = ?3 RETURNING *")
                .bind(status.as_ref())
                .bind(OffsetDateTime::now_utc())
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(profile) = profile {
            self.publish(Change::update(Entity::Profile(profile)));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_profile(&self, user_id: &str, draft: ProfileDraft) -> AppResult<Profile> {
        let now = OffsetDateTime::now_utc();
        let profile: Profile = sqlx::query_as(
            "INSERT INTO profiles (id, username, full_name, avatar_url, bio, status, last_seen, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'online', ?6, ?6)
             ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                full_name = excluded.full_name,
                avatar_url = excluded.avatar_url,
                bio = excluded.bio,
                status = excluded.status,
                last_seen = excluded.last_seen
             RETURNING *",
        )
        .bind(user_id)
        .bind(&draft.username)
        .bind(&draft.full_name)
        .bind(&draft.avatar_url)
        .bind(&draft.bio)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict(err, "username"))?;

        self.publish(Change::update(Entity::Profile(profile.clone())));
        Ok(profile)
    }

    async fn get_profile(&self, user_id: &str) -> AppResult<Option<Profile>> {
        Ok(sqlx::query_as("SELECT * FROM profiles WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn search_profiles(&self, query: &str, viewer: &str, limit: u32) -> AppResult<Vec<Profile>> {
        Ok(sqlx::query_as(
            "SELECT * FROM profiles WHERE username LIKE ?1 ESCAPE '\\' AND id <> ?2 ORDER BY username LIMIT ?3",
        )
        .bind(like_pattern(query))
        .bind(viewer)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn mark_stale_offline(&self, cutoff: OffsetDateTime) -> AppResult<Vec<String>> {
        let candidates: Vec<Profile> = sqlx::query_as("SELECT * FROM profiles WHERE status <> 'offline'")
            .fetch_all(&self.pool)
            .await?;

        let mut swept = Vec::new();
        for candidate in candidates {
            if candidate.last_seen.is_some_and(|seen| seen >= cutoff) {
                continue;
            }
            let profile: Option<Profile> =
                sqlx::query_as("UPDATE profiles SET status = 'offline' WHERE id = ?1 AND status <> 'offline' RETURNING *")
                    .bind(&candidate.id)
                    .fetch_optional(&self.pool)
                    .await?;
            if let Some(profile) = profile {
                swept.push(profile.id.clone());
                self.publish(Change::update(Entity::Profile(profile)));
            }
        }
        Ok(swept)
    }

    async fn find_pending_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<Option<FriendRequest>> {
        Ok(sqlx::query_as(
            "SELECT * FROM friend_requests WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'pending'",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_friend_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<FriendRequest> {
        let request: FriendRequest = sqlx::query_as(
            "INSERT INTO friend_requests (id, sender_id, receiver_id, status, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)
             RETURNING *",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(sender_id)
        .bind(receiver_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict(err, "pending friend request"))?;

        self.publish(Change::insert(Entity::FriendRequest(request.clone())));
        Ok(request)
    }

    async fn get_friend_request(&self, id: Uuid) -> AppResult<Option<FriendRequest>> {
        Ok(sqlx::query_as("SELECT * FROM friend_requests WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn transition_request(&self, id: Uuid, status: RequestStatus) -> AppResult<Option<FriendRequest>> {
        let request: Option<FriendRequest> =
            sqlx::query_as("UPDATE friend_requests SET status = ?1 WHERE id = ?2 AND status = 'pending' RETURNING *")
                .bind(status.as_ref())
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        if let Some(request) = &request {
            self.publish(Change::update(Entity::FriendRequest(request.clone())));
        }
        Ok(request)
    }

    async fn pending_requests_for(&self, receiver_id: &str) -> AppResult<Vec<FriendRequest>> {
        Ok(sqlx::query_as(
            "SELECT * FROM friend_requests WHERE receiver_id = ?1 AND status = 'pending' ORDER BY rowid DESC",
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_friendship(&self, pair: &CanonicalPair) -> AppResult<Option<Friendship>> {
        Ok(sqlx::query_as("SELECT * FROM friendships WHERE user_id_1 = ?1 AND user_id_2 = ?2")
            .bind(pair.lo())
            .bind(pair.hi())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_friendship(&self, pair: &CanonicalPair) -> AppResult<Friendship> {
        let friendship: Friendship = sqlx::query_as(
            "INSERT INTO friendships (id, user_id_1, user_id_2, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING *",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(pair.lo())
        .bind(pair.hi())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict(err, "friendship"))?;

        self.publish(Change::insert(Entity::Friendship(friendship.clone())));
        Ok(friendship)
    }

    async fn friends_of(&self, user_id: &str) -> AppResult<Vec<Profile>> {
        Ok(sqlx::query_as(
            "SELECT p.* FROM friendships f
             JOIN profiles p ON p.id = CASE WHEN f.user_id_1 = ?1 THEN f.user_id_2 ELSE f.user_id_1 END
             WHERE f.user_id_1 = ?1 OR f.user_id_2 = ?1
             ORDER BY p.username",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_chat(&self, pair: &CanonicalPair) -> AppResult<Option<Chat>> {
        Ok(sqlx::query_as("SELECT * FROM chats WHERE user_id_1 = ?1 AND user_id_2 = ?2")
            .bind(pair.lo())
            .bind(pair.hi())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_chat(&self, id: Uuid) -> AppResult<Option<Chat>> {
        Ok(sqlx::query_as("SELECT * FROM chats WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_chat(&self, pair: &CanonicalPair) -> AppResult<Chat> {
        let now = OffsetDateTime::now_utc();
        let chat: Chat = sqlx::query_as(
            "INSERT INTO chats (id, user_id_1, user_id_2, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4) RETURNING *",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(pair.lo())
        .bind(pair.hi())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| conflict(err, "chat"))?;

        self.publish(Change::insert(Entity::Chat(chat.clone())));
        Ok(chat)
    }

    async fn touch_chat(&self, id: Uuid) -> AppResult<()> {
        let chat: Option<Chat> = sqlx::query_as("UPDATE chats SET updated_at = ?1 WHERE id = ?2 RETURNING *")
            .bind(OffsetDateTime::now_utc())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if let Some(chat) = chat {
            self.publish(Change::update(Entity::Chat(chat)));
        }
        Ok(())
    }

    async fn authorize_chat(&self, chat_id: Uuid, user_id: &str) -> AppResult<Chat> {
        let Some(chat) = self.get_chat(chat_id).await? else {
            return Err(AppError::NotFound("Chat not found".to_owned()));
        };
        if !chat.has_participant(user_id) {
            return Err(AppError::Forbidden("Not a participant in this chat".to_owned()));
        }
        Ok(chat)
    }

    async fn insert_message(&self, chat_id: Uuid, sender_id: &str, draft: MessageDraft) -> AppResult<Message> {
        self.authorize_chat(chat_id, sender_id).await?;

        let (file_url, file_name, file_size) = match draft.file {
            Some(file) => (Some(file.url), file.name, file.size),
            None => (None, None, None),
        };
        let message: Message = sqlx::query_as(
            "INSERT INTO messages (id, chat_id, sender_id, content, message_type, file_url, file_name, file_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             RETURNING *",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(chat_id.to_string())
        .bind(sender_id)
        .bind(draft.content)
        .bind(draft.message_type.as_ref())
        .bind(file_url)
        .bind(file_name)
        .bind(file_size)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;

        self.publish(Change::insert(Entity::Message(message.clone())));
        Ok(message)
    }

    async fn list_messages(&self, chat_id: Uuid, viewer: &str, limit: u32) -> AppResult<Vec<Message>> {
        self.authorize_chat(chat_id, viewer).await?;

        Ok(sqlx::query_as(
            "SELECT * FROM (
                SELECT m.*, m.rowid AS seq FROM messages m WHERE m.chat_id = ?1 ORDER BY m.rowid DESC LIMIT ?2
             ) ORDER BY seq ASC",
        )
        .bind(chat_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn edit_message(
        &self,
        chat_id: Uuid,
        id: Uuid,
        sender_id: &str,
        content: Option<String>,
    ) -> AppResult<Option<Message>> {
        let message: Option<Message> = sqlx::query_as(
            "UPDATE messages SET content = ?1, is_edited = 1
             WHERE id = ?2 AND chat_id = ?3 AND sender_id = ?4 AND is_deleted = 0
             RETURNING *",
        )
        .bind(content)
        .bind(id.to_string())
        .bind(chat_id.to_string())
        .bind(sender_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(message) = &message {
            self.publish(Change::update(Entity::Message(message.clone())));
        }
        Ok(message)
    }

    async fn soft_delete_message(&self, chat_id: Uuid, id: Uuid, sender_id: &str) -> AppResult<Option<Message>> {
        let message: Option<Message> = sqlx::query_as(
            "UPDATE messages SET is_deleted = 1, content = NULL, file_url = NULL, file_name = NULL, file_size = NULL
             WHERE id = ?1 AND chat_id = ?2 AND sender_id = ?3 AND is_deleted = 0
             RETURNING *",
        )
        .bind(id.to_string())
        .bind(chat_id.to_string())
        .bind(sender_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(message) = &message {
            self.publish(Change::update(Entity::Message(message.clone())));
        }
        Ok(message)
    }

    async fn upsert_typing(&self, chat_id: Uuid, user_id: &str, is_typing: bool) -> AppResult<TypingIndicator> {
        self.authorize_chat(chat_id, user_id).await?;

        let typing: TypingIndicator = sqlx::query_as(
            "INSERT INTO typing_indicators (chat_id, user_id, is_typing, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (chat_id, user_id) DO UPDATE SET is_typing = excluded.is_typing, updated_at = excluded.updated_at
             RETURNING *",
        )
        .bind(chat_id.to_string())
        .bind(user_id)
        .bind(is_typing)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;

        self.publish(Change::update(Entity::Typing(typing.clone())));
        Ok(typing)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use time::Duration;

    use super::*;
    use crate::{db::models::MessageType, feed::Op};

    pub(crate) async fn memory_store() -> SqliteStore {
        SqliteStore::open("sqlite::memory:", 1, ChangeFeed::new(64)).await.unwrap()
    }

    pub(crate) async fn onboard(store: &SqliteStore, user_id: &str) -> Profile {
        store
            .upsert_profile(
                user_id,
                ProfileDraft {
                    username: format!("{user_id}_name"),
                    full_name: None,
                    avatar_url: None,
                    bio: None,
                },
            )
            .await
            .unwrap()
    }

    fn text(content: &str) -> MessageDraft {
        MessageDraft {
            content: Some(content.to_owned()),
            message_type: MessageType::Text,
            file: None,
        }
    }

    #[tokio::test]
    async fn duplicate_chat_insert_is_a_conflict() {
        let store = memory_store().await;
        let pair = CanonicalPair::new("u1", "u2").unwrap();
        store.insert_chat(&pair).await.unwrap();
        assert!(matches!(store.insert_chat(&pair).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn only_one_pending_request_per_direction() {
        let store = memory_store().await;
        let first = store.insert_friend_request("u1", "u2").await.unwrap();
        assert!(matches!(store.insert_friend_request("u1", "u2").await, Err(AppError::Conflict(_))));
        // the other direction is a different key
        store.insert_friend_request("u2", "u1").await.unwrap();

        store.transition_request(first.id, RequestStatus::Rejected).await.unwrap();
        store.insert_friend_request("u1", "u2").await.unwrap();
    }

    #[tokio::test]
    async fn transitions_only_leave_pending() {
        let store = memory_store().await;
        let request = store.insert_friend_request("u1", "u2").await.unwrap();
        let accepted = store.transition_request(request.id, RequestStatus::Accepted).await.unwrap();
        assert_eq!(accepted.unwrap().status, RequestStatus::Accepted);
        assert!(store.transition_request(request.id, RequestStatus::Rejected).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn outsiders_cannot_post_or_read() {
        let store = memory_store().await;
        let chat = store.insert_chat(&CanonicalPair::new("u1", "u2").unwrap()).await.unwrap();
        assert!(matches!(store.insert_message(chat.id, "u3", text("hi")).await, Err(AppError::Forbidden(_))));
        assert!(matches!(store.list_messages(chat.id, "u3", 200).await, Err(AppError::Forbidden(_))));
        assert!(matches!(
            store.list_messages(Uuid::now_v7(), "u1", 200).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_keeps_the_latest_in_order() {
        let store = memory_store().await;
        let chat = store.insert_chat(&CanonicalPair::new("u1", "u2").unwrap()).await.unwrap();
        for i in 0..5 {
            store.insert_message(chat.id, "u1", text(&format!("msg {i}"))).await.unwrap();
        }
        let messages = store.list_messages(chat.id, "u2", 3).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_deref().unwrap()).collect();
        assert_eq!(contents, ["msg 2", "msg 3", "msg 4"]);
    }

    #[tokio::test]
    async fn edit_and_delete_filter_on_sender() {
        let store = memory_store().await;
        let chat = store.insert_chat(&CanonicalPair::new("u1", "u2").unwrap()).await.unwrap();
        let message = store.insert_message(chat.id, "u1", text("hi")).await.unwrap();

        assert!(store.edit_message(chat.id, message.id, "u2", Some("hacked".into())).await.unwrap().is_none());
        assert!(store.soft_delete_message(chat.id, message.id, "u2").await.unwrap().is_none());

        let edited = store.edit_message(chat.id, message.id, "u1", Some("hello".into())).await.unwrap().unwrap();
        assert!(edited.is_edited);
        let deleted = store.soft_delete_message(chat.id, message.id, "u1").await.unwrap().unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.content.is_none());
        // deleted messages stay deleted
        assert!(store.edit_message(chat.id, message.id, "u1", Some("back".into())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn typing_is_last_writer_wins() {
        let store = memory_store().await;
        let chat = store.insert_chat(&CanonicalPair::new("u1", "u2").unwrap()).await.unwrap();
        store.upsert_typing(chat.id, "u1", true).await.unwrap();
        let latest = store.upsert_typing(chat.id, "u1", false).await.unwrap();
        assert!(!latest.is_typing);
        let (rows,): (i64,) = sqlx::query_as("SELECT count(*) FROM typing_indicators")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn mutations_are_published() {
        let store = memory_store().await;
        let mut rx = store.feed.receiver();
        let chat = store.insert_chat(&CanonicalPair::new("u1", "u2").unwrap()).await.unwrap();
        store.insert_message(chat.id, "u1", text("hi")).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!((first.op, first.entity.table()), (Op::Insert, "chats"));
        let second = rx.recv().await.unwrap();
        assert_eq!((second.op, second.entity.table()), (Op::Insert, "messages"));
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = memory_store().await;
        onboard(&store, "u1").await;
        let taken = store
            .upsert_profile(
                "u2",
                ProfileDraft {
                    username: "u1_name".to_owned(),
                    full_name: None,
                    avatar_url: None,
                    bio: None,
                },
            )
            .await;
        assert!(matches!(taken, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_literal() {
        let store = memory_store().await;
        onboard(&store, "alice").await;
        onboard(&store, "bob").await;
        let hits = store.search_profiles("ALICE", "bob", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.search_profiles("%", "bob", 10).await.unwrap().is_empty());
        assert!(store.search_profiles("alice", "alice", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_profiles_are_swept_offline() {
        let store = memory_store().await;
        onboard(&store, "u1").await;
        onboard(&store, "u2").await;
        store.set_presence("u2", PresenceStatus::Offline).await.unwrap();

        assert!(store.mark_stale_offline(OffsetDateTime::now_utc() - Duration::minutes(5)).await.unwrap().is_empty());
        let swept = store.mark_stale_offline(OffsetDateTime::now_utc() + Duration::seconds(1)).await.unwrap();
        assert_eq!(swept, vec!["u1".to_owned()]);
        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.status, PresenceStatus::Offline);
    }
}
