use std::sync::Arc;

use axum::{debug_handler, extract::State, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    db::{PresenceSink, Store, models::PresenceStatus},
    extract::AppQuery,
    session::USER_ID,
};

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

/// Clears the session; the user is reported offline on the way out.
#[debug_handler(state = AppState)]
pub(crate) async fn logout(
    AppQuery(LogoutQuery { return_url }): AppQuery<LogoutQuery>,
    State(store): State<Arc<dyn Store>>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(user_id) = session.get::<String>(USER_ID).await? {
        if let Err(err) = store.set_presence(&user_id, PresenceStatus::Offline).await {
            tracing::debug!(user_id, error = %err, "offline on logout dropped");
        }
        tracing::info!(user_id, "signed out");
    }
    session.flush().await?;
    Ok(Redirect::to(return_url.as_deref().unwrap_or("/")))
}
