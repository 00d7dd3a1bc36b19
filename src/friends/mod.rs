mod requests;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(requests::friends))
        .route("/requests", get(requests::incoming))
        .route("/send", post(requests::send))
        .route("/accept", post(requests::accept))
        .route("/reject", post(requests::reject))
}
