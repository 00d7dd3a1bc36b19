//! Heuristic presence: a per-session reporter, the unload beacon, and a sweep
//! that marks profiles offline once their heartbeat has gone quiet.

mod reporter;

pub use reporter::PresenceReporter;

use std::{sync::Arc, time::Duration};

use axum::{Json, Router, body::Bytes, debug_handler, extract::State, routing::post};
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tower_sessions::Session;

use crate::{
    Ack, AppState,
    db::{PresenceSink, Store, models::PresenceStatus},
    session::USER_ID,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/offline", post(offline))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfflineBody {
    user_id: Option<String>,
}

/// Unload beacon. The session identity wins; the body's `userId` covers an
/// expired session. Always answers 200.
#[debug_handler(state = AppState)]
pub(crate) async fn offline(State(store): State<Arc<dyn Store>>, session: Session, body: Bytes) -> Json<Ack> {
    let from_session = session.get::<String>(USER_ID).await.ok().flatten();
    let target = from_session.or_else(|| {
        serde_json::from_slice::<OfflineBody>(&body)
            .ok()
            .and_then(|body| body.user_id)
    });
    let Some(user_id) = target else {
        return Json(Ack { ok: false });
    };

    match store.set_presence(&user_id, PresenceStatus::Offline).await {
        Ok(()) => Json(Ack::OK),
        Err(err) => {
            tracing::debug!(user_id, error = %err, "offline beacon dropped");
            Json(Ack { ok: false })
        }
    }
}

/// Every `every`, marks profiles whose last heartbeat is older than `stale_after` offline.
pub fn spawn_staleness_sweep(store: Arc<dyn Store>, every: Duration, stale_after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let cutoff = OffsetDateTime::now_utc() - stale_after;
            match store.mark_stale_offline(cutoff).await {
                Ok(swept) if !swept.is_empty() => tracing::info!(count = swept.len(), "stale profiles marked offline"),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "presence sweep failed"),
            }
        }
    })
}
