//! Row-level change notifications.
//!
//! The store publishes one [`Change`] per committed mutation. Consumers never
//! subscribe to the feed directly; each client session owns a [`Dispatcher`]
//! that holds the only receiver and fans changes out by [`Topic`].

mod dispatch;

pub use dispatch::{Dispatcher, Registration};

use serde::{Serialize, ser::SerializeStruct};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::models::{Chat, FriendRequest, Friendship, Message, Profile, TypingIndicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Profile(Profile),
    FriendRequest(FriendRequest),
    Friendship(Friendship),
    Chat(Chat),
    Message(Message),
    Typing(TypingIndicator),
}

impl Entity {
    pub fn table(&self) -> &'static str {
        match self {
            Entity::Profile(_) => "profiles",
            Entity::FriendRequest(_) => "friend_requests",
            Entity::Friendship(_) => "friendships",
            Entity::Chat(_) => "chats",
            Entity::Message(_) => "messages",
            Entity::Typing(_) => "typing_indicators",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub op: Op,
    pub entity: Entity,
}

impl Change {
    pub fn insert(entity: Entity) -> Change {
        Change { op: Op::Insert, entity }
    }

    pub fn update(entity: Entity) -> Change {
        Change { op: Op::Update, entity }
    }
}

impl Serialize for Change {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Change", 3)?;
        state.serialize_field("op", &self.op)?;
        state.serialize_field("table", self.entity.table())?;
        match &self.entity {
            Entity::Profile(row) => state.serialize_field("row", row)?,
            Entity::FriendRequest(row) => state.serialize_field("row", row)?,
            Entity::Friendship(row) => state.serialize_field("row", row)?,
            Entity::Chat(row) => state.serialize_field("row", row)?,
            Entity::Message(row) => state.serialize_field("row", row)?,
            Entity::Typing(row) => state.serialize_field("row", row)?,
        }
        state.end()
    }
}

/// Predicate a session registers interest with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Messages and typing indicators of one chat.
    Chat(Uuid),
    /// Friend requests sent to or by the user, and friendships involving them.
    Inbox(String),
}

impl Topic {
    pub fn matches(&self, change: &Change) -> bool {
        match (self, &change.entity) {
            (Topic::Chat(chat_id), Entity::Message(message)) => message.chat_id == *chat_id,
            (Topic::Chat(chat_id), Entity::Typing(typing)) => typing.chat_id == *chat_id,
            (Topic::Inbox(user_id), Entity::FriendRequest(request)) => {
                request.receiver_id == *user_id || request.sender_id == *user_id
            }
            (Topic::Inbox(user_id), Entity::Friendship(friendship)) => friendship.involves(user_id),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
    capacity: usize,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> ChangeFeed {
        let capacity = capacity.max(1);
        ChangeFeed {
            tx: broadcast::channel(capacity).0,
            capacity,
        }
    }

    /// How many changes a slow receiver may fall behind before it loses some.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn publish(&self, change: Change) {
        // nobody listening is fine
        let _ = self.tx.send(change);
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::db::models::MessageType;

    pub(crate) fn message_in(chat_id: Uuid, content: &str) -> Message {
        Message {
            id: Uuid::now_v7(),
            chat_id,
            sender_id: "u1".to_owned(),
            content: Some(content.to_owned()),
            message_type: MessageType::Text,
            file_url: None,
            file_name: None,
            file_size: None,
            created_at: OffsetDateTime::now_utc(),
            is_edited: false,
            is_deleted: false,
        }
    }

    #[test]
    fn chat_topic_only_sees_its_chat() {
        let chat = Uuid::now_v7();
        let other = Uuid::now_v7();
        let topic = Topic::Chat(chat);
        assert!(topic.matches(&Change::insert(Entity::Message(message_in(chat, "hi")))));
        assert!(!topic.matches(&Change::insert(Entity::Message(message_in(other, "hi")))));
    }

    #[test]
    fn inbox_sees_both_directions() {
        let request = FriendRequest {
            id: Uuid::now_v7(),
            sender_id: "u1".to_owned(),
            receiver_id: "u2".to_owned(),
            status: crate::db::models::RequestStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        let change = Change::insert(Entity::FriendRequest(request));
        assert!(Topic::Inbox("u1".to_owned()).matches(&change));
        assert!(Topic::Inbox("u2".to_owned()).matches(&change));
        assert!(!Topic::Inbox("u3".to_owned()).matches(&change));
    }

    #[test]
    fn wire_shape_names_the_table() {
        let chat = Uuid::now_v7();
        let json = serde_json::to_value(Change::update(Entity::Message(message_in(chat, "edited")))).unwrap();
        assert_eq!(json["op"], "update");
        assert_eq!(json["table"], "messages");
        assert_eq!(json["row"]["content"], "edited");
    }
}
