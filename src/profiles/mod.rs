mod me;
mod search;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(me::me).post(me::upsert))
        .route("/profiles/search", get(search::search))
        .route("/profiles/{id}", get(search::by_id))
}
