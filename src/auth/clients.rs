use oauth2::{
    AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use serde_json::Value;
use strum::{AsRefStr, Display};

use crate::{AppError, AppResult, GetField};

pub(crate) type ProviderClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    /// Provider id as the identity toolkit knows it.
    pub fn id(&self) -> &'static str {
        match self {
            ClientProvider::Google => "google.com",
            ClientProvider::Github => "github.com",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        match self {
            ClientProvider::Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            ClientProvider::Github => {
                ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token")
            }
        }
    }
}

/// OAuth clients per provider plus the identity toolkit endpoint that turns
/// a provider token into a stable user id.
#[derive(Clone, Default)]
pub struct Clients {
    idp_url: Option<String>,
    google: Option<ProviderClient>,
    github: Option<ProviderClient>,
}

impl Clients {
    /// No provider configured; every login reports so.
    pub fn none() -> Clients {
        Clients::default()
    }

    /// Reads `{"firebase": {"apikey"}, "google": {...}, "github": {...}}`.
    /// Provider sections are optional.
    pub fn from_json(json: &Value, public_url: &str) -> AppResult<Clients> {
        let idp_url = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp?key={}",
            json.get_obj_field("firebase")?.get_str_field("apikey")?
        );
        let client = |provider: ClientProvider| {
            json.get(provider.as_ref())
                .map(|keys| build(provider, keys, public_url))
                .transpose()
        };

        Ok(Clients {
            idp_url: Some(idp_url),
            google: client(ClientProvider::Google)?,
            github: client(ClientProvider::Github)?,
        })
    }

    pub(crate) fn get_client(&self, provider: ClientProvider) -> AppResult<ProviderClient> {
        match provider {
            ClientProvider::Google => self.google.clone(),
            ClientProvider::Github => self.github.clone(),
        }
        .ok_or_else(|| AppError::NotFound(format!("OAuth provider {provider} is not configured")))
    }

    pub(crate) fn idp_url(&self) -> AppResult<&str> {
        self.idp_url
            .as_deref()
            .ok_or_else(|| AppError::from("identity toolkit key not supplied"))
    }
}

fn build(provider: ClientProvider, keys: &Value, public_url: &str) -> AppResult<ProviderClient> {
    let (auth_url, token_url) = provider.endpoints();
    Ok(BasicClient::new(ClientId::new(keys.get_str_field("client_id")?))
        .set_client_secret(ClientSecret::new(keys.get_str_field("client_secret")?))
        .set_auth_uri(AuthUrl::new(auth_url.to_owned())?)
        .set_token_uri(TokenUrl::new(token_url.to_owned())?)
        .set_redirect_uri(RedirectUrl::new(format!("{public_url}/lockin/{provider}"))?))
}
