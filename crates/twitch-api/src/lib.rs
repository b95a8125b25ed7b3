//! Minimal Twitch Helix client.
//!
//! Covers the three lookups needed to watch streamers (stream by login, user
//! by login, game by ID) plus the OAuth client-credentials flow behind them.

pub mod client;
pub mod error;
pub mod models;

pub use client::{Credentials, Endpoints, HelixClient, TwitchApi, default_client};
pub use error::{ApiError, HTTP_BAD_GATEWAY};
pub use models::{NO_GAME_ID, StreamSnapshot, is_no_game};
