use std::sync::Arc;

use axum::{
    Json, debug_handler,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    db::{Store, models::MessageType},
    extract::{AppPath, AppQuery},
    objects::{ObjectStore, StoredObject},
    session::AuthUser,
};

#[derive(Deserialize)]
pub(crate) struct UploadQuery {
    name: String,
}

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    #[serde(flatten)]
    object: StoredObject,
    message_type: MessageType,
    size: usize,
}

/// First half of sending an attachment; the client then posts a message with the returned url.
#[debug_handler(state = AppState)]
pub(crate) async fn upload(
    AuthUser(user_id): AuthUser,
    AppPath(chat_id): AppPath<Uuid>,
    AppQuery(UploadQuery { name }): AppQuery<UploadQuery>,
    State(store): State<Arc<dyn Store>>,
    State(objects): State<ObjectStore>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<UploadResponse>> {
    store.authorize_chat(chat_id, &user_id).await?;

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream");
    let object = objects.put(chat_id, &name, &body).await?;

    Ok(Json(UploadResponse {
        object,
        message_type: MessageType::from_mime(mime),
        size: body.len(),
    }))
}
