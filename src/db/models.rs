use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageType {
    /// Tag for an uploaded object, judged by its mime type.
    pub fn from_mime(mime: &str) -> MessageType {
        if mime.starts_with("image/") {
            MessageType::Image
        } else if mime.starts_with("video/") {
            MessageType::Video
        } else {
            MessageType::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub status: PresenceStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
}

/// Fields a user sets when completing onboarding.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileDraft {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: Uuid,
    pub user_id_1: String,
    pub user_id_2: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Friendship {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user_id_1 == user_id || self.user_id_2 == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id_1: String,
    pub user_id_2: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Chat {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.user_id_1 == user_id || self.user_id_2 == user_id
    }
}

/// Reference to an object already placed in the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub name: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: String,
    pub content: Option<String>,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_edited: bool,
    pub is_deleted: bool,
}

/// What a sender submits; the store fills in ids, timestamps and flags.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub content: Option<String>,
    pub message_type: MessageType,
    pub file: Option<FileRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingIndicator {
    pub chat_id: Uuid,
    pub user_id: String,
    pub is_typing: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guess() {
        assert_eq!(MessageType::from_mime("image/png"), MessageType::Image);
        assert_eq!(MessageType::from_mime("video/mp4"), MessageType::Video);
        assert_eq!(MessageType::from_mime("application/pdf"), MessageType::File);
    }

    #[test]
    fn enums_use_snake_case_on_both_surfaces() {
        assert_eq!(PresenceStatus::Away.as_ref(), "away");
        assert_eq!("accepted".parse::<RequestStatus>().unwrap(), RequestStatus::Accepted);
        assert_eq!(serde_json::to_string(&MessageType::Video).unwrap(), "\"video\"");
    }
}
