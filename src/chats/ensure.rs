use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppResult, AppState, extract::AppJson, pairing::PairingEngine, session::AuthUser};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnsureChatBody {
    peer_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnsureChatResponse {
    chat_id: Uuid,
}

#[debug_handler(state = AppState)]
pub(crate) async fn ensure_chat(
    AuthUser(user_id): AuthUser,
    State(pairing): State<PairingEngine>,
    AppJson(EnsureChatBody { peer_id }): AppJson<EnsureChatBody>,
) -> AppResult<Json<EnsureChatResponse>> {
    let chat = pairing.ensure_chat(&user_id, &peer_id).await?;
    Ok(Json(EnsureChatResponse { chat_id: chat.id }))
}
