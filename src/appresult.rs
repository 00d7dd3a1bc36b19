use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No session, or the session carries no user id.
    #[error("Unauthorized")]
    Unauthorized,
    /// Authenticated, but not entitled to the entity.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// A uniqueness constraint or a terminal state machine state got in the way.
    #[error("{0}")]
    Conflict(String),
    /// The request itself is malformed.
    #[error("{0}")]
    Invalid(String),
    /// Opaque failure from the store, feed, object store or identity provider.
    #[error("{0}")]
    Backend(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Unauthorized => StatusCode::UNAUTHORIZED,
            Forbidden(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            Conflict(_) => StatusCode::CONFLICT,
            Invalid(_) | Backend(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Backend(err) = &self {
            tracing::error!(error = %err, "backend failure");
        }
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(err)
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Backend(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Backend(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Backend(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(sqlx::migrate::MigrateError);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(oauth2::url::ParseError);
apperr_impl!(std::io::Error);
apperr_impl!(uuid::Error);
apperr_impl!(strum::ParseError);

macro_rules! rejection_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(rejection: $E) -> Self {
                Self::Invalid(rejection.body_text())
            }
        }
    };
}

rejection_impl!(JsonRejection);
rejection_impl!(PathRejection);
rejection_impl!(QueryRejection);

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static> From<oauth2::RequestTokenError<E, R>> for AppError {
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self::Backend(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::from("boom").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_message_passes_through() {
        let err = AppError::from(anyhow::anyhow!("UNIQUE constraint failed: chats.user_id_1"));
        assert_eq!(err.to_string(), "UNIQUE constraint failed: chats.user_id_1");
        assert_eq!(AppError::Unauthorized.to_string(), "Unauthorized");
    }
}
