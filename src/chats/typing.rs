use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    Ack, AppResult, AppState,
    extract::{AppJson, AppPath},
    session::AuthUser,
};

use super::ChatController;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TypingBody {
    #[serde(default)]
    is_typing: bool,
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_typing(
    AuthUser(user_id): AuthUser,
    AppPath(chat_id): AppPath<Uuid>,
    State(chats): State<ChatController>,
    AppJson(TypingBody { is_typing }): AppJson<TypingBody>,
) -> AppResult<Json<Ack>> {
    chats.set_typing(chat_id, &user_id, is_typing).await?;
    Ok(Json(Ack::OK))
}
