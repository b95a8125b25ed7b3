//! Desktop notifications for Twitch streamers switching to games you follow.

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;

pub use error::{Error, Result};
