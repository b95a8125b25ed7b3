//! Helix wire models and the snapshot handed to callers.

use serde::{Deserialize, Serialize};

/// Game ID Twitch uses for a live stream with no category selected.
pub const NO_GAME_ID: &str = "0";

/// State of one streamer at the moment of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub live: bool,
    /// Stream title. Empty when offline.
    pub title: String,
    /// Game ID, [`NO_GAME_ID`] when live without a category, empty when offline.
    pub game_id: String,
    pub game_name: String,
    pub display_name: String,
}

impl StreamSnapshot {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn live(
        title: impl Into<String>,
        game_id: impl Into<String>,
        game_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let mut game_id = game_id.into();
        if game_id.is_empty() {
            game_id = NO_GAME_ID.to_string();
        }

        Self {
            live: true,
            title: title.into(),
            game_id,
            game_name: game_name.into(),
            display_name: display_name.into(),
        }
    }
}

/// Whether a game ID means "nothing selected".
pub fn is_no_game(game_id: &str) -> bool {
    game_id.is_empty() || game_id == NO_GAME_ID
}

/// Envelope shared by every Helix collection endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct HelixPage<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HelixStream {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub title: String,
}

impl From<HelixStream> for StreamSnapshot {
    fn from(stream: HelixStream) -> Self {
        StreamSnapshot::live(
            stream.title,
            stream.game_id,
            stream.game_name,
            stream.user_name,
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HelixUser {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HelixGame {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
