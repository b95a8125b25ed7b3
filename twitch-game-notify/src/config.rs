//! Configuration file handling.
//!
//! The config lives at `$XDG_CONFIG_HOME/twitch-game-notify/config.yaml`
//! (or the platform equivalent returned by `dirs::config_dir`).

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};
use twitch_api::Credentials;

use crate::error::{Error, Result};

/// Application name, used for the config directory and notifications.
pub const APP_NAME: &str = "twitch-game-notify";

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Longest accepted `query-period`.
pub const MAX_QUERY_PERIOD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Token in `include` that matches every game.
pub const WILDCARD: &str = "*";

/// Example configuration shipped with the binary.
pub const EXAMPLE_CONFIG: &str = include_str!("../config.example.yaml");

/// Per-user directory holding the config, the cache and its lock.
pub fn project_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_NAME);
    path
}

pub fn default_config_path() -> PathBuf {
    project_config_dir().join(CONFIG_FILE_NAME)
}

/// Which games of one streamer are worth a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// Game IDs, game names, or [`WILDCARD`].
    #[serde(deserialize_with = "deserialize_tokens")]
    pub include: BTreeSet<String>,

    /// Only consulted when `include` holds the wildcard.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_tokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub exclude: Option<BTreeSet<String>>,
}

impl StreamerConfig {
    pub fn new<I, S>(include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: include.into_iter().map(Into::into).collect(),
            exclude: None,
        }
    }

    /// Match every game.
    pub fn all_games() -> Self {
        Self::new([WILDCARD])
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(exclude.into_iter().map(Into::into).collect());
        self
    }

    pub fn has_wildcard(&self) -> bool {
        self.include.contains(WILDCARD)
    }
}

/// Contents of `config.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Seconds between two polls of the whole streamer set.
    #[serde(rename = "query-period")]
    pub query_period_secs: f64,

    /// `query_period_secs` as checked by validation.
    #[serde(skip)]
    query_period: Duration,

    #[serde(rename = "twitch-api-client-id")]
    pub client_id: String,

    #[serde(rename = "twitch-api-client-secret")]
    pub client_secret: String,

    /// Login name → games filter.
    pub streamers: BTreeMap<String, StreamerConfig>,

    #[serde(rename = "ignore-502-errors-one-shot")]
    pub ignore_502_errors_one_shot: bool,

    // The key keeps the spelling existing config files use.
    #[serde(rename = "ignore-502-errors-persistant")]
    pub ignore_502_errors_persistent: bool,
}

impl AppConfig {
    /// Load and validate the config from `path`, or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let config = Self::from_yaml(&contents)?;
        info!(
            path = %path.display(),
            streamers = config.streamers.len(),
            "Loaded config"
        );
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let mut config: Self =
            serde_yaml::from_str(contents).map_err(|e| Error::config_invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Report every problem at once rather than stopping at the first.
    fn validate(&mut self) -> Result<()> {
        let mut problems = Vec::new();

        match Duration::try_from_secs_f64(self.query_period_secs) {
            Ok(period) if !period.is_zero() && period <= MAX_QUERY_PERIOD => {
                self.query_period = period;
            }
            _ => problems.push(format!(
                "query-period must be a positive number of seconds up to {}, got {}",
                MAX_QUERY_PERIOD.as_secs(),
                self.query_period_secs
            )),
        }
        if self.client_id.trim().is_empty() {
            problems.push("twitch-api-client-id must not be empty".to_string());
        }
        if self.client_secret.trim().is_empty() {
            problems.push("twitch-api-client-secret must not be empty".to_string());
        }

        for (login, streamer) in &self.streamers {
            if streamer.include.is_empty() {
                problems.push(format!("streamer {login}: include must not be empty"));
            }
            if streamer.exclude.is_some() && !streamer.has_wildcard() {
                debug!(streamer = %login, "exclude is ignored without \"*\" in include");
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::config_invalid(problems.join("; ")))
        }
    }

    pub fn query_period(&self) -> Duration {
        self.query_period
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.client_id, &self.client_secret)
    }

    /// Whether 502 answers should be dropped silently in the given mode.
    pub fn ignore_502s(&self, one_shot: bool) -> bool {
        if one_shot {
            self.ignore_502_errors_one_shot
        } else {
            self.ignore_502_errors_persistent
        }
    }
}

/// YAML lets users write game IDs unquoted, so accept numbers too.
#[derive(Deserialize)]
#[serde(untagged)]
enum Token {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        match token {
            Token::Text(s) => s,
            Token::Integer(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
        }
    }
}

fn deserialize_tokens<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tokens = Vec::<Token>::deserialize(deserializer)?;
    Ok(tokens.into_iter().map(String::from).collect())
}

fn deserialize_optional_tokens<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<BTreeSet<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let tokens = Option::<Vec<Token>>::deserialize(deserializer)?;
    Ok(tokens.map(|tokens| tokens.into_iter().map(String::from).collect()))
}
