//! Include/exclude game filtering.

use std::collections::BTreeSet;

use crate::config::StreamerConfig;

/// Decide whether a game passes a streamer's filter.
///
/// Tokens match either the game ID or the game name. With `"*"` in
/// `include` every game passes unless `exclude` names it; otherwise the game
/// must appear in `include`.
pub fn is_allowed(config: &StreamerConfig, game_id: &str, game_name: &str) -> bool {
    let names_game = |tokens: &BTreeSet<String>| {
        tokens.contains(game_id) || (!game_name.is_empty() && tokens.contains(game_name))
    };

    if config.has_wildcard() {
        !config.exclude.as_ref().is_some_and(names_game)
    } else {
        names_game(&config.include)
    }
}
