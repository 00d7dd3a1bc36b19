//! The chat session controller and its HTTP surface under `/chats`.

mod controller;
mod ensure;
mod msg;
mod timeline;
mod typing;
mod uploads;

pub use controller::{ChatController, ChatEvent, ChatSubscription, HISTORY_LIMIT};
pub use timeline::Timeline;

use axum::{Router, extract::DefaultBodyLimit, routing::post};

use crate::AppState;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/ensure", post(ensure::ensure_chat))
        .route(
            "/{chat_id}/messages",
            post(msg::post_message)
                .get(msg::list_messages)
                .patch(msg::edit_message)
                .delete(msg::delete_message),
        )
        .route("/{chat_id}/typing", post(typing::set_typing))
        .route(
            "/{chat_id}/uploads",
            post(uploads::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}
