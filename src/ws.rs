//! `GET /ws`: the live session of one signed-in client.
//!
//! A session owns one [`Dispatcher`] and one [`PresenceReporter`]. The user's
//! inbox topic is registered up front; chats are added and dropped by client
//! frames. Closing the socket drops every registration and reports offline.

use std::{collections::HashMap, sync::Arc};

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as Frame, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};
use uuid::Uuid;

use crate::{
    AppState,
    chats::{ChatEvent, ChatSubscription},
    db::Store,
    feed::{Change, Dispatcher, Registration, Topic},
    presence::PresenceReporter,
    session::AuthUser,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe { chat_id: Uuid },
    Unsubscribe { chat_id: Uuid },
    Visibility { visible: bool },
    Unmount,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Subscribed { chat_id: Uuid },
    Chat { chat_id: Uuid, event: ChatEvent },
    Feed { change: Change },
    Error { error: String },
}

/// Frames waiting for the socket. Forwarders wait on a full outbox, which
/// backs up into their registrations, where the dispatcher drops and logs.
type Outbox = mpsc::Sender<ServerFrame>;

#[debug_handler(state = AppState)]
pub(crate) async fn live(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run(state, user_id, socket))
}

struct LiveSession {
    state: AppState,
    user_id: String,
    dispatcher: Dispatcher,
    presence: Option<PresenceReporter>,
    chats: HashMap<Uuid, JoinHandle<()>>,
    out: Outbox,
}

impl LiveSession {
    async fn handle(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::Subscribe { chat_id } => {
                if self.chats.contains_key(&chat_id) {
                    return;
                }
                let subscribed = self
                    .state
                    .chats
                    .subscribe_to_chat(&self.dispatcher, chat_id, &self.user_id)
                    .await;
                match subscribed {
                    Ok(subscription) => {
                        let task = tokio::spawn(forward_chat(subscription, self.out.clone()));
                        self.chats.insert(chat_id, task);
                        let _ = self.out.send(ServerFrame::Subscribed { chat_id }).await;
                    }
                    Err(err) => {
                        let _ = self.out.send(ServerFrame::Error { error: err.to_string() }).await;
                    }
                }
            }
            ClientFrame::Unsubscribe { chat_id } => {
                if let Some(task) = self.chats.remove(&chat_id) {
                    task.abort();
                }
            }
            ClientFrame::Visibility { visible } => {
                if let Some(presence) = &self.presence {
                    presence.set_visible(visible);
                }
            }
            ClientFrame::Unmount => {
                if let Some(presence) = self.presence.take() {
                    presence.unmount();
                }
            }
        }
    }

    fn close(mut self) {
        for (_, task) in self.chats.drain() {
            task.abort();
        }
        if let Some(presence) = self.presence.take() {
            presence.end_session();
        }
    }
}

async fn forward_chat(mut subscription: ChatSubscription, out: Outbox) {
    let chat_id = subscription.chat_id();
    while let Some(event) = subscription.next().await {
        if out.send(ServerFrame::Chat { chat_id, event }).await.is_err() {
            break;
        }
    }
}

async fn forward_inbox(mut inbox: Registration, out: Outbox) {
    while let Some(change) = inbox.recv().await {
        if out.send(ServerFrame::Feed { change }).await.is_err() {
            break;
        }
    }
}

async fn run(state: AppState, user_id: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (out, mut outbox) = mpsc::channel::<ServerFrame>(state.feed.capacity());

    let dispatcher = Dispatcher::spawn(&state.feed);
    let inbox_task = tokio::spawn(forward_inbox(
        dispatcher.register(Topic::Inbox(user_id.clone())),
        out.clone(),
    ));
    let store: Arc<dyn Store> = state.store.clone();
    let presence = PresenceReporter::start(store, user_id.clone(), state.config.heartbeat);

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(error = %err, "unserializable frame dropped");
                    continue;
                }
            };
            if sender.send(Frame::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    tracing::info!(user_id, "live session opened");
    let mut session = LiveSession {
        state,
        user_id: user_id.clone(),
        dispatcher,
        presence: Some(presence),
        chats: HashMap::new(),
        out,
    };

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Frame::Text(text))) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(frame) => session.handle(frame).await,
                    Err(err) => {
                        let _ = session.out.send(ServerFrame::Error { error: err.to_string() }).await;
                    }
                },
                Some(Ok(Frame::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = &mut send_task => break,
        }
    }

    inbox_task.abort();
    session.close();
    send_task.abort();
    tracing::info!(user_id, "live session closed");
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_frames_are_tagged_by_type() {
        let chat_id = Uuid::now_v7();
        let frame: ClientFrame = serde_json::from_value(json!({ "type": "subscribe", "chat_id": chat_id })).unwrap();
        assert_eq!(frame, ClientFrame::Subscribe { chat_id });
        let frame: ClientFrame = serde_json::from_value(json!({ "type": "visibility", "visible": false })).unwrap();
        assert_eq!(frame, ClientFrame::Visibility { visible: false });
        assert!(serde_json::from_value::<ClientFrame>(json!({ "type": "shout" })).is_err());
    }

    #[test]
    fn server_errors_carry_the_message() {
        let json = serde_json::to_value(ServerFrame::Error { error: "Chat not found".into() }).unwrap();
        assert_eq!(json, json!({ "type": "error", "error": "Chat not found" }));
    }
}
