pub mod appresult;
pub mod auth;
pub mod chats;
pub mod config;
pub mod db;
pub mod extract;
pub mod feed;
pub mod friends;
pub mod objects;
pub mod pairing;
pub mod presence;
pub mod profiles;
pub mod session;
pub mod ws;

pub use appresult::{AppError, AppResult};

use std::sync::Arc;

use axum::{Router, extract::FromRef, routing::get};
use serde::Serialize;
use serde_json::Value;
use tower_http::services::ServeDir;

use chats::ChatController;
use config::Config;
use db::Store;
use feed::ChangeFeed;
use objects::ObjectStore;
use pairing::PairingEngine;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub feed: ChangeFeed,
    pub pairing: PairingEngine,
    pub chats: ChatController,
    pub objects: ObjectStore,
    pub clients: auth::Clients,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the components around one store. `feed` must be the feed the store publishes on.
    pub fn new(store: Arc<dyn Store>, feed: ChangeFeed, clients: auth::Clients, config: Config) -> AppState {
        AppState {
            pairing: PairingEngine::new(store.clone()),
            chats: ChatController::new(store.clone()),
            objects: ObjectStore::new(&config.upload_dir, &config.public_url),
            store,
            feed,
            clients,
            config: Arc::new(config),
        }
    }
}

pub fn routes(config: &Config) -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(profiles::router())
        .nest("/chats", chats::router(config.max_upload_bytes))
        .nest("/friends", friends::router())
        .nest("/presence", presence::router())
        .route("/ws", get(ws::live))
        .nest_service("/files", ServeDir::new(&config.upload_dir))
}

/// `{"ok": bool}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub const OK: Ack = Ack { ok: true };
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(self
            .get(field)
            .ok_or(format!("expected {field} in response"))?
            .as_str()
            .ok_or(format!("expected {field} to be a string"))?
            .to_owned())
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field).ok_or(format!("expected {field} in response").into())
    }
}
