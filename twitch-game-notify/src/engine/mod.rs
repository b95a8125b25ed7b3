//! Per-streamer notification decisions.
//!
//! [`evaluate`] turns one [`StreamSnapshot`] into a [`Decision`]: suppress
//! it (offline, unchanged game, filtered out), notify about it, or report
//! the API error that prevented resolving its names.

mod filter;
mod resolver;

pub use filter::is_allowed;
pub use resolver::{resolve_display_name, resolve_game_title};

use std::collections::HashMap;
use std::fmt;

use tracing::debug;
use twitch_api::{ApiError, StreamSnapshot, TwitchApi};

use crate::cache::NameCache;
use crate::config::StreamerConfig;

/// Why a snapshot produced no notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    Offline,
    SameGame,
    Filtered,
}

impl SuppressReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::SameGame => "same_game",
            Self::Filtered => "filtered",
        }
    }
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A streamer went live with (or switched to) a game worth announcing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNotification {
    pub display_name: String,
    pub title: String,
    /// Empty when the stream has no game set.
    pub game_title: String,
}

#[derive(Debug)]
pub enum Decision {
    Suppressed(SuppressReason),
    Notify(StreamNotification),
    Errored(ApiError),
}

impl Decision {
    pub fn is_notify(&self) -> bool {
        matches!(self, Self::Notify(_))
    }

    pub fn suppress_reason(&self) -> Option<SuppressReason> {
        match self {
            Self::Suppressed(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Last game ID seen per streamer. An empty value means the streamer is
/// not known to be live.
#[derive(Debug, Clone, Default)]
pub struct PreviousGameState {
    games: HashMap<String, String>,
}

impl PreviousGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with every streamer marked as not live.
    pub fn for_streamers<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            games: logins
                .into_iter()
                .map(|login| (login.into(), String::new()))
                .collect(),
        }
    }

    pub fn get(&self, login: &str) -> &str {
        self.games.get(login).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, login: &str, game_id: &str) {
        self.games.insert(login.to_string(), game_id.to_string());
    }

    /// Mark the streamer as not live. Returns whether anything changed.
    pub fn reset(&mut self, login: &str) -> bool {
        match self.games.get_mut(login) {
            Some(game_id) if !game_id.is_empty() => {
                game_id.clear();
                true
            }
            _ => false,
        }
    }
}

/// Decide what to do with one snapshot of one streamer.
///
/// `previous` enables duplicate suppression and is updated in place; the
/// stored game changes before filtering, so a switch to a filtered game
/// still counts as a switch. `cache` is consulted before the API for names
/// and filled on misses.
pub async fn evaluate<A>(
    login: &str,
    config: &StreamerConfig,
    snapshot: &StreamSnapshot,
    mut previous: Option<&mut PreviousGameState>,
    mut cache: Option<&mut NameCache>,
    api: &A,
) -> Decision
where
    A: TwitchApi + ?Sized,
{
    if !snapshot.live {
        if let Some(state) = previous.as_deref_mut()
            && state.reset(login)
        {
            debug!(streamer = %login, "Streamer went offline");
        }
        return Decision::Suppressed(SuppressReason::Offline);
    }

    let game_id = snapshot.game_id.as_str();
    let game_name = snapshot.game_name.as_str();

    if let Some(state) = previous.as_deref_mut() {
        if state.get(login) == game_id {
            return Decision::Suppressed(SuppressReason::SameGame);
        }
        debug!(
            streamer = %login,
            from = %state.get(login),
            to = %game_id,
            "Game changed"
        );
        state.set(login, game_id);
    }

    if !is_allowed(config, game_id, game_name) {
        debug!(streamer = %login, game_id = %game_id, game = %game_name, "Game filtered out");
        return Decision::Suppressed(SuppressReason::Filtered);
    }

    let display_name = match resolve_display_name(login, cache.as_deref_mut(), api).await {
        Ok(name) => name,
        Err(e) => return Decision::Errored(e),
    };
    let game_title = match resolve_game_title(game_id, cache.as_deref_mut(), api).await {
        Ok(title) => title,
        Err(e) => return Decision::Errored(e),
    };

    Decision::Notify(StreamNotification {
        display_name,
        title: snapshot.title.clone(),
        game_title,
    })
}
