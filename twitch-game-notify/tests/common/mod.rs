#![allow(dead_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use twitch_api::{ApiError, StreamSnapshot, TwitchApi};
use twitch_game_notify::{Result, engine::StreamNotification, notification::NotificationSink};

/// Failure a fake endpoint answers with. Rebuilt into an `ApiError` per call.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Connection,
    Status(u16),
    Authentication,
}

impl Failure {
    fn to_error(self, url: &str) -> ApiError {
        match self {
            Self::Connection => ApiError::connection("connection refused"),
            Self::Status(code) => ApiError::request(
                code,
                format!("An HTTP request to {url} failed with status code {code}"),
            ),
            Self::Authentication => {
                ApiError::authentication(403, "An access token fetch failed with status code 403")
            }
        }
    }
}

type Reply<T> = std::result::Result<T, Failure>;

/// In-memory Helix stand-in that counts lookups.
#[derive(Default)]
pub struct FakeApi {
    streams: Mutex<HashMap<String, Reply<StreamSnapshot>>>,
    users: Mutex<HashMap<String, Reply<String>>>,
    games: Mutex<HashMap<String, Reply<String>>>,
    user_fetches: Mutex<Vec<String>>,
    game_fetches: Mutex<Vec<String>>,
    stream_fetches: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, login: &str, display_name: &str) -> Self {
        self.users
            .lock()
            .insert(login.to_string(), Ok(display_name.to_string()));
        self
    }

    pub fn with_game(self, game_id: &str, name: &str) -> Self {
        self.games
            .lock()
            .insert(game_id.to_string(), Ok(name.to_string()));
        self
    }

    pub fn set_live(&self, login: &str, game_id: &str, game_name: &str, title: &str) {
        self.streams.lock().insert(
            login.to_string(),
            Ok(StreamSnapshot::live(title, game_id, game_name, login)),
        );
    }

    pub fn set_offline(&self, login: &str) {
        self.streams
            .lock()
            .insert(login.to_string(), Ok(StreamSnapshot::offline()));
    }

    pub fn fail_stream(&self, login: &str, failure: Failure) {
        self.streams.lock().insert(login.to_string(), Err(failure));
    }

    pub fn fail_game(&self, game_id: &str, failure: Failure) {
        self.games.lock().insert(game_id.to_string(), Err(failure));
    }

    pub fn user_fetches(&self) -> Vec<String> {
        self.user_fetches.lock().clone()
    }

    pub fn game_fetches(&self) -> Vec<String> {
        self.game_fetches.lock().clone()
    }

    pub fn stream_fetches(&self) -> Vec<String> {
        self.stream_fetches.lock().clone()
    }
}

#[async_trait]
impl TwitchApi for FakeApi {
    async fn stream_snapshot(&self, login: &str) -> std::result::Result<StreamSnapshot, ApiError> {
        self.stream_fetches.lock().push(login.to_string());
        match self.streams.lock().get(login) {
            Some(Ok(snapshot)) => Ok(snapshot.clone()),
            Some(Err(failure)) => Err(failure.to_error("https://api.twitch.tv/helix/streams")),
            None => Ok(StreamSnapshot::offline()),
        }
    }

    async fn user_display_name(&self, login: &str) -> std::result::Result<String, ApiError> {
        self.user_fetches.lock().push(login.to_string());
        match self.users.lock().get(login) {
            Some(Ok(name)) => Ok(name.clone()),
            Some(Err(failure)) => Err(failure.to_error("https://api.twitch.tv/helix/users")),
            None => Err(ApiError::NotFound {
                kind: "user",
                key: login.to_string(),
            }),
        }
    }

    async fn game_name(&self, game_id: &str) -> std::result::Result<String, ApiError> {
        self.game_fetches.lock().push(game_id.to_string());
        match self.games.lock().get(game_id) {
            Some(Ok(name)) => Ok(name.clone()),
            Some(Err(failure)) => Err(failure.to_error("https://api.twitch.tv/helix/games")),
            None => Err(ApiError::NotFound {
                kind: "game",
                key: game_id.to_string(),
            }),
        }
    }
}

/// Sink that remembers everything it was asked to show.
#[derive(Default)]
pub struct RecordingSink {
    streams: Mutex<Vec<StreamNotification>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streams(&self) -> Vec<StreamNotification> {
        self.streams.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn sink_type(&self) -> &'static str {
        "recording"
    }

    async fn send_stream(&self, notification: &StreamNotification) -> Result<()> {
        self.streams.lock().push(notification.clone());
        Ok(())
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        self.errors.lock().push(message.to_string());
        Ok(())
    }
}
