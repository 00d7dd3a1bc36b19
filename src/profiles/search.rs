use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    AppError, AppResult, AppState,
    db::{Store, models::Profile},
    extract::{AppPath, AppQuery},
    session::AuthUser,
};

const SEARCH_LIMIT: u32 = 10;

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize)]
pub(crate) struct SearchResponse {
    profiles: Vec<Profile>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn search(
    AuthUser(user_id): AuthUser,
    State(store): State<Arc<dyn Store>>,
    AppQuery(SearchQuery { q }): AppQuery<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let needle = q.trim().trim_start_matches('@');
    if needle.is_empty() {
        return Ok(Json(SearchResponse { profiles: Vec::new() }));
    }
    let profiles = store.search_profiles(needle, &user_id, SEARCH_LIMIT).await?;
    Ok(Json(SearchResponse { profiles }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn by_id(
    AuthUser(_): AuthUser,
    AppPath(profile_id): AppPath<String>,
    State(store): State<Arc<dyn Store>>,
) -> AppResult<Json<Profile>> {
    store
        .get_profile(&profile_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".to_owned()))
}
