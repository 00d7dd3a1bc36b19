use std::sync::Arc;

use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Redirect},
};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    AppError, AppResult, AppState, GetField,
    config::Config,
    db::Store,
    extract::{AppPath, AppQuery},
    session::{CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID},
};

use super::{Clients, clients::ClientProvider};

/// Where a signed-in user without a profile is sent.
pub const ONBOARDING_PATH: &str = "/onboarding";

#[derive(Deserialize)]
pub(crate) struct LockinQuery {
    pub(crate) state: Option<String>,
    pub(crate) code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

/// OAuth callback: checks the csrf state, exchanges the code, and trades the provider
/// token for the identity toolkit's stable user id.
#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    AppPath(provider): AppPath<ClientProvider>,
    AppQuery(LockinQuery { state, code }): AppQuery<LockinQuery>,
    State(clients): State<Clients>,
    State(store): State<Arc<dyn Store>>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or_else(|| AppError::Invalid("OAuth: without state".to_owned()))?);
    let code = AuthorizationCode::new(code.ok_or_else(|| AppError::Invalid("OAuth: without code".to_owned()))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(AppError::Unauthorized);
    };
    if state.secret() != &stored_state {
        return Err(AppError::Unauthorized);
    }
    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(AppError::Unauthorized);
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: serde_json::Value = http_client
        .post(clients.idp_url()?)
        .json(&IdpRequest {
            post_body: format!("access_token={access_token}&providerId={}", provider.id()),
            request_uri: format!("{}/", config.public_url),
            return_idp_credential: true,
            return_secure_token: true,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let user_id = body.get_str_field("localId")?;
    session.cycle_id().await?;
    session.insert(USER_ID, user_id.clone()).await?;
    tracing::info!(user_id, %provider, "signed in");

    if store.get_profile(&user_id).await?.is_none() {
        return Ok(Redirect::to(ONBOARDING_PATH));
    }
    let return_url = session.remove::<String>(RETURN_URL).await?.unwrap_or_else(|| "/".to_owned());
    Ok(Redirect::to(&return_url))
}
