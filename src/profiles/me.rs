use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};

use crate::{
    AppError, AppResult, AppState,
    db::{
        Store,
        models::{Profile, ProfileDraft},
    },
    extract::AppJson,
    session::AuthUser,
};

const MAX_USERNAME: usize = 32;

fn blank_to_none(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

pub(crate) fn normalize(draft: ProfileDraft) -> AppResult<ProfileDraft> {
    let username = draft.username.trim().trim_start_matches('@').to_owned();
    if username.is_empty() {
        return Err(AppError::Invalid("username is required".to_owned()));
    }
    if username.chars().count() > MAX_USERNAME || username.chars().any(char::is_whitespace) {
        return Err(AppError::Invalid(format!(
            "username must be at most {MAX_USERNAME} characters without spaces"
        )));
    }
    Ok(ProfileDraft {
        username,
        full_name: blank_to_none(draft.full_name),
        avatar_url: blank_to_none(draft.avatar_url),
        bio: blank_to_none(draft.bio),
    })
}

/// Completes onboarding, or updates the caller's profile afterwards.
#[debug_handler(state = AppState)]
pub(crate) async fn upsert(
    AuthUser(user_id): AuthUser,
    State(store): State<Arc<dyn Store>>,
    AppJson(draft): AppJson<ProfileDraft>,
) -> AppResult<Json<Profile>> {
    let profile = store.upsert_profile(&user_id, normalize(draft)?).await?;
    tracing::info!(user_id, username = %profile.username, "profile saved");
    Ok(Json(profile))
}

#[debug_handler(state = AppState)]
pub(crate) async fn me(AuthUser(user_id): AuthUser, State(store): State<Arc<dyn Store>>) -> AppResult<Json<Profile>> {
    store
        .get_profile(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(username: &str) -> ProfileDraft {
        ProfileDraft {
            username: username.to_owned(),
            full_name: Some("  ".to_owned()),
            avatar_url: None,
            bio: Some(" hi ".to_owned()),
        }
    }

    #[test]
    fn strips_at_and_blanks() {
        let clean = normalize(draft(" @alice ")).unwrap();
        assert_eq!(clean.username, "alice");
        assert_eq!(clean.full_name, None);
        assert_eq!(clean.bio.as_deref(), Some("hi"));
    }

    #[test]
    fn rejects_unusable_usernames() {
        assert!(matches!(normalize(draft("@")), Err(AppError::Invalid(_))));
        assert!(matches!(normalize(draft("two words")), Err(AppError::Invalid(_))));
        assert!(matches!(normalize(draft(&"x".repeat(33))), Err(AppError::Invalid(_))));
    }
}
