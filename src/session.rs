use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::{AppError, AppResult};

pub const USER_ID: &str = "user_id";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

/// The identity-provider user id stored in the session at login.
///
/// Rejects with 401 `{"error":"Unauthorized"}` when there is none.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> AppResult<Self> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;

        match session.get::<String>(USER_ID).await? {
            Some(user_id) => Ok(AuthUser(user_id)),
            None => Err(AppError::Unauthorized),
        }
    }
}
