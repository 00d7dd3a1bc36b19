//! Friend requests, friendships and the one-to-one chat that goes with them.
//!
//! A request moves `pending -> accepted` or `pending -> rejected` and never
//! leaves a terminal state. Friendships and chats are keyed by [`CanonicalPair`]
//! and the store refuses a second row for the same pair; losing that race is
//! treated as success and the winner's row is returned.

mod pair;

pub use pair::CanonicalPair;

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppError, AppResult,
    db::{
        Store,
        models::{Chat, FriendRequest, Friendship, Profile, RequestStatus},
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct IncomingRequest {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub sender: Option<Profile>,
}

#[derive(Clone)]
pub struct PairingEngine {
    store: Arc<dyn Store>,
}

impl PairingEngine {
    pub fn new(store: Arc<dyn Store>) -> PairingEngine {
        PairingEngine { store }
    }

    /// The chat between `requester_id` and `peer_id`, created on first use.
    pub async fn ensure_chat(&self, requester_id: &str, peer_id: &str) -> AppResult<Chat> {
        let pair = CanonicalPair::new(requester_id, peer_id)
            .ok_or_else(|| AppError::Invalid("Cannot open a chat with yourself".to_owned()))?;
        self.chat_for(&pair).await
    }

    async fn chat_for(&self, pair: &CanonicalPair) -> AppResult<Chat> {
        if let Some(chat) = self.store.find_chat(pair).await? {
            return Ok(chat);
        }
        match self.store.insert_chat(pair).await {
            Ok(chat) => {
                tracing::info!(chat_id = %chat.id, %pair, "chat created");
                Ok(chat)
            }
            Err(AppError::Conflict(_)) => self
                .store
                .find_chat(pair)
                .await?
                .ok_or_else(|| AppError::from(format!("chat for {pair} missing after conflict"))),
            Err(err) => Err(err),
        }
    }

    async fn friendship_for(&self, pair: &CanonicalPair) -> AppResult<Friendship> {
        if let Some(friendship) = self.store.find_friendship(pair).await? {
            return Ok(friendship);
        }
        match self.store.insert_friendship(pair).await {
            Ok(friendship) => {
                tracing::info!(%pair, "friendship created");
                Ok(friendship)
            }
            Err(AppError::Conflict(_)) => self
                .store
                .find_friendship(pair)
                .await?
                .ok_or_else(|| AppError::from(format!("friendship for {pair} missing after conflict"))),
            Err(err) => Err(err),
        }
    }

    /// Enqueues a pending request, or returns the one already pending for this
    /// exact sender and receiver.
    ///
    /// A pending request in the opposite direction is left alone.
    pub async fn send_friend_request(&self, sender_id: &str, receiver_id: &str) -> AppResult<FriendRequest> {
        if sender_id == receiver_id {
            return Err(AppError::Invalid("Cannot send a friend request to yourself".to_owned()));
        }
        if self.store.get_profile(receiver_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_owned()));
        }
        if let Some(existing) = self.store.find_pending_request(sender_id, receiver_id).await? {
            return Ok(existing);
        }
        match self.store.insert_friend_request(sender_id, receiver_id).await {
            Ok(request) => {
                tracing::info!(request_id = %request.id, sender_id, receiver_id, "friend request sent");
                Ok(request)
            }
            Err(AppError::Conflict(_)) => self
                .store
                .find_pending_request(sender_id, receiver_id)
                .await?
                .ok_or_else(|| AppError::from("pending request missing after conflict")),
            Err(err) => Err(err),
        }
    }

    async fn request_for_receiver(&self, request_id: Uuid, acting_user_id: &str) -> AppResult<FriendRequest> {
        let Some(request) = self.store.get_friend_request(request_id).await? else {
            return Err(AppError::NotFound("Request not found".to_owned()));
        };
        if request.receiver_id != acting_user_id {
            return Err(AppError::Forbidden("Not your request".to_owned()));
        }
        Ok(request)
    }

    /// Applies `target` if the request is still pending and reports where it ended up.
    async fn settle(&self, request: FriendRequest, target: RequestStatus) -> AppResult<RequestStatus> {
        if request.status != RequestStatus::Pending {
            return Ok(request.status);
        }
        if let Some(updated) = self.store.transition_request(request.id, target).await? {
            tracing::info!(request_id = %updated.id, status = %updated.status, "friend request settled");
            return Ok(updated.status);
        }
        // someone else settled it between our read and our update
        let current = self.store.get_friend_request(request.id).await?;
        Ok(current.map_or(request.status, |request| request.status))
    }

    /// Accepts and returns the pair's chat. Accepting again is a no-op that
    /// returns the same chat.
    pub async fn accept_friend_request(&self, request_id: Uuid, acting_user_id: &str) -> AppResult<Chat> {
        let request = self.request_for_receiver(request_id, acting_user_id).await?;
        let pair = CanonicalPair::new(&request.sender_id, &request.receiver_id)
            .ok_or_else(|| AppError::from("friend request pairs a user with themselves"))?;

        match self.settle(request, RequestStatus::Accepted).await? {
            RequestStatus::Accepted => {}
            RequestStatus::Rejected => return Err(AppError::Conflict("Request was already rejected".to_owned())),
            RequestStatus::Pending => return Err(AppError::from("friend request is still pending after accept")),
        }

        self.friendship_for(&pair).await?;
        self.chat_for(&pair).await
    }

    /// Rejecting again is a no-op.
    pub async fn reject_friend_request(&self, request_id: Uuid, acting_user_id: &str) -> AppResult<()> {
        let request = self.request_for_receiver(request_id, acting_user_id).await?;
        match self.settle(request, RequestStatus::Rejected).await? {
            RequestStatus::Rejected => Ok(()),
            RequestStatus::Accepted => Err(AppError::Conflict("Request was already accepted".to_owned())),
            RequestStatus::Pending => Err(AppError::from("friend request is still pending after reject")),
        }
    }

    pub async fn friends(&self, user_id: &str) -> AppResult<Vec<Profile>> {
        self.store.friends_of(user_id).await
    }

    /// Pending requests addressed to `user_id`, newest first.
    pub async fn incoming_requests(&self, user_id: &str) -> AppResult<Vec<IncomingRequest>> {
        let requests = self.store.pending_requests_for(user_id).await?;
        let mut incoming = Vec::with_capacity(requests.len());
        for request in requests {
            let sender = self.store.get_profile(&request.sender_id).await?;
            incoming.push(IncomingRequest { request, sender });
        }
        Ok(incoming)
    }
}
