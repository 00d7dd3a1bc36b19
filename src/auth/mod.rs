//! Sign-in through an OAuth provider, exchanged at the identity toolkit for a
//! stable user id that lands in the session under [`crate::session::USER_ID`].

mod clients;
mod lockin;
mod login;
mod logout;

pub use clients::{ClientProvider, Clients};
pub use lockin::ONBOARDING_PATH;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
}
