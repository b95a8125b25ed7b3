//! Helix client with client-credentials authentication.

use std::sync::OnceLock;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::{
    AccessToken, HelixGame, HelixPage, HelixStream, HelixUser, StreamSnapshot, is_no_game,
};

pub const HELIX_BASE_URL: &str = "https://api.twitch.tv/helix";
pub const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

const USER_AGENT: &str = concat!("twitch-api/", env!("CARGO_PKG_VERSION"));

/// The calls the notifier needs from Twitch.
#[async_trait]
pub trait TwitchApi: Send + Sync {
    /// Current stream state of a streamer, offline when Helix returns no stream.
    async fn stream_snapshot(&self, login: &str) -> Result<StreamSnapshot, ApiError>;

    /// Display name of the user with the given login.
    async fn user_display_name(&self, login: &str) -> Result<String, ApiError>;

    /// Name of the game with the given ID.
    async fn game_name(&self, game_id: &str) -> Result<String, ApiError>;
}

/// Application credentials registered on the Twitch developer console.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Where requests go. Only overridden when pointing the client at a proxy or stub.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub helix_base: String,
    pub token_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            helix_base: HELIX_BASE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        }
    }
}

/// Install the rustls crypto provider once per process.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the `reqwest::Client` used for every Helix request.
pub fn default_client() -> Result<Client, ApiError> {
    install_rustls_provider();

    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(ApiError::Transport)
}

/// Authenticated Helix client.
///
/// The app access token is fetched on construction. When a request comes back
/// with 401 the token is refreshed once and the request repeated once.
pub struct HelixClient {
    client: Client,
    credentials: Credentials,
    endpoints: Endpoints,
    access_token: RwLock<String>,
}

impl HelixClient {
    /// Authenticate against the default endpoints.
    pub async fn connect(credentials: Credentials) -> Result<Self, ApiError> {
        Self::connect_with(default_client()?, credentials, Endpoints::default()).await
    }

    pub async fn connect_with(
        client: Client,
        credentials: Credentials,
        endpoints: Endpoints,
    ) -> Result<Self, ApiError> {
        let token = obtain_access_token(&client, &credentials, &endpoints).await?;

        Ok(Self {
            client,
            credentials,
            endpoints,
            access_token: RwLock::new(token),
        })
    }

    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        let token = obtain_access_token(&self.client, &self.credentials, &self.endpoints).await?;
        *self.access_token.write() = token;
        Ok(())
    }

    async fn send_get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response, ApiError> {
        let token = self.access_token.read().clone();

        self.client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header("Client-Id", &self.credentials.client_id)
            .send()
            .await
            .map_err(ApiError::from_transport)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let url = format!("{}/{}", self.endpoints.helix_base, path);

        let mut response = self.send_get(&url, query).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            info!("Access token rejected, fetching a new one");
            self.refresh_access_token().await?;
            response = self.send_get(&url, query).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::request(
                status.as_u16(),
                format!(
                    "An HTTP request to {} failed with status code {}",
                    url,
                    status.as_u16()
                ),
            ));
        }

        let page = response
            .json::<HelixPage<T>>()
            .await
            .map_err(|e| decode_error(&url, e))?;
        Ok(page.data)
    }
}

#[async_trait]
impl TwitchApi for HelixClient {
    async fn stream_snapshot(&self, login: &str) -> Result<StreamSnapshot, ApiError> {
        let streams: Vec<HelixStream> = self.get_page("streams", &[("user_login", login)]).await?;

        let snapshot = match streams.into_iter().next() {
            Some(stream) => StreamSnapshot::from(stream),
            None => StreamSnapshot::offline(),
        };
        debug!(
            streamer = %login,
            live = snapshot.live,
            game_id = %snapshot.game_id,
            "Fetched stream snapshot"
        );
        Ok(snapshot)
    }

    async fn user_display_name(&self, login: &str) -> Result<String, ApiError> {
        let users: Vec<HelixUser> = self.get_page("users", &[("login", login)]).await?;
        users
            .into_iter()
            .next()
            .map(|user| user.display_name)
            .ok_or_else(|| ApiError::NotFound {
                kind: "user",
                key: login.to_string(),
            })
    }

    async fn game_name(&self, game_id: &str) -> Result<String, ApiError> {
        if is_no_game(game_id) {
            return Ok(String::new());
        }

        let games: Vec<HelixGame> = self.get_page("games", &[("id", game_id)]).await?;
        games
            .into_iter()
            .next()
            .map(|game| game.name)
            .ok_or_else(|| ApiError::NotFound {
                kind: "game",
                key: game_id.to_string(),
            })
    }
}

async fn obtain_access_token(
    client: &Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
) -> Result<String, ApiError> {
    let response = client
        .post(&endpoints.token_url)
        .query(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .send()
        .await
        .map_err(ApiError::from_transport)?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(token_error(status));
    }

    let token = response
        .json::<AccessToken>()
        .await
        .map_err(|e| decode_error(&endpoints.token_url, e))?;
    debug!(expires_in = ?token.expires_in, "Obtained app access token");

    Ok(token.access_token)
}

/// Twitch answers 400 for an unknown client id and 403 for a wrong secret.
fn token_error(status: StatusCode) -> ApiError {
    let message = format!(
        "An access token fetch failed with status code {}",
        status.as_u16()
    );

    match status {
        StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN => {
            ApiError::authentication(status.as_u16(), message)
        }
        _ => ApiError::request(status.as_u16(), message),
    }
}

fn decode_error(endpoint: &str, err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    } else {
        ApiError::from_transport(err)
    }
}
