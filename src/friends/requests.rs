use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppResult, AppState,
    db::models::Profile,
    extract::AppJson,
    pairing::{IncomingRequest, PairingEngine},
    session::AuthUser,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendBody {
    receiver_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestIdBody {
    request_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SentResponse {
    ok: bool,
    request_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcceptedResponse {
    ok: bool,
    chat_id: Uuid,
}

#[derive(Serialize)]
pub(crate) struct FriendsResponse {
    friends: Vec<Profile>,
}

#[derive(Serialize)]
pub(crate) struct RequestsResponse {
    requests: Vec<IncomingRequest>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    AuthUser(user_id): AuthUser,
    State(pairing): State<PairingEngine>,
    AppJson(SendBody { receiver_id }): AppJson<SendBody>,
) -> AppResult<Json<SentResponse>> {
    let request = pairing.send_friend_request(&user_id, &receiver_id).await?;
    Ok(Json(SentResponse { ok: true, request_id: request.id }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn accept(
    AuthUser(user_id): AuthUser,
    State(pairing): State<PairingEngine>,
    AppJson(RequestIdBody { request_id }): AppJson<RequestIdBody>,
) -> AppResult<Json<AcceptedResponse>> {
    let chat = pairing.accept_friend_request(request_id, &user_id).await?;
    Ok(Json(AcceptedResponse { ok: true, chat_id: chat.id }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reject(
    AuthUser(user_id): AuthUser,
    State(pairing): State<PairingEngine>,
    AppJson(RequestIdBody { request_id }): AppJson<RequestIdBody>,
) -> AppResult<Json<crate::Ack>> {
    pairing.reject_friend_request(request_id, &user_id).await?;
    Ok(Json(crate::Ack::OK))
}

#[debug_handler(state = AppState)]
pub(crate) async fn friends(
    AuthUser(user_id): AuthUser,
    State(pairing): State<PairingEngine>,
) -> AppResult<Json<FriendsResponse>> {
    let friends = pairing.friends(&user_id).await?;
    Ok(Json(FriendsResponse { friends }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn incoming(
    AuthUser(user_id): AuthUser,
    State(pairing): State<PairingEngine>,
) -> AppResult<Json<RequestsResponse>> {
    let requests = pairing.incoming_requests(&user_id).await?;
    Ok(Json(RequestsResponse { requests }))
}
