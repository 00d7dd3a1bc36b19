use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppError, AppResult, AppState,
    db::models::{FileRef, Message, MessageDraft, MessageType},
    extract::{AppJson, AppPath},
    session::AuthUser,
};

use super::ChatController;

#[derive(Serialize)]
pub(crate) struct MessagesResponse {
    messages: Vec<Message>,
}

#[derive(Serialize)]
pub(crate) struct MessageResponse {
    message: Message,
}

#[derive(Serialize)]
pub(crate) struct UpdatedResponse {
    ok: bool,
    updated: bool,
}

#[derive(Deserialize)]
pub(crate) struct PostMessageBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    message_type: MessageType,
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    file_size: Option<i64>,
}

/// File metadata only travels with the file it describes.
impl TryFrom<PostMessageBody> for MessageDraft {
    type Error = AppError;

    fn try_from(body: PostMessageBody) -> Result<Self, Self::Error> {
        let PostMessageBody { content, message_type, file_url, file_name, file_size } = body;
        let file = match file_url {
            Some(url) => Some(FileRef { url, name: file_name, size: file_size }),
            None if file_name.is_some() || file_size.is_some() => {
                return Err(AppError::Invalid("file_name and file_size need a file_url".into()));
            }
            None => None,
        };
        Ok(MessageDraft { content, message_type, file })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EditMessageBody {
    message_id: Uuid,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteMessageBody {
    message_id: Uuid,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_messages(
    AuthUser(user_id): AuthUser,
    AppPath(chat_id): AppPath<Uuid>,
    State(chats): State<ChatController>,
) -> AppResult<Json<MessagesResponse>> {
    let messages = chats.list_messages(chat_id, &user_id).await?;
    Ok(Json(MessagesResponse { messages }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    AuthUser(user_id): AuthUser,
    AppPath(chat_id): AppPath<Uuid>,
    State(chats): State<ChatController>,
    AppJson(body): AppJson<PostMessageBody>,
) -> AppResult<Json<MessageResponse>> {
    let message = chats.post_message(chat_id, &user_id, body.try_into()?).await?;
    Ok(Json(MessageResponse { message }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_message(
    AuthUser(user_id): AuthUser,
    AppPath(chat_id): AppPath<Uuid>,
    State(chats): State<ChatController>,
    AppJson(EditMessageBody { message_id, content }): AppJson<EditMessageBody>,
) -> AppResult<Json<UpdatedResponse>> {
    let updated = chats.edit_message(chat_id, message_id, &user_id, content).await?;
    Ok(Json(UpdatedResponse { ok: true, updated }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_message(
    AuthUser(user_id): AuthUser,
    AppPath(chat_id): AppPath<Uuid>,
    State(chats): State<ChatController>,
    AppJson(DeleteMessageBody { message_id }): AppJson<DeleteMessageBody>,
) -> AppResult<Json<UpdatedResponse>> {
    let updated = chats.soft_delete_message(chat_id, message_id, &user_id).await?;
    Ok(Json(UpdatedResponse { ok: true, updated }))
}
