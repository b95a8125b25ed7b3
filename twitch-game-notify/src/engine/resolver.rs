//! Cache-then-fetch lookups of display names.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::debug;
use twitch_api::{ApiError, TwitchApi, is_no_game};

use crate::cache::NameCache;

/// Display name of a streamer, keyed by login.
pub async fn resolve_display_name<A>(
    login: &str,
    cache: Option<&mut NameCache>,
    api: &A,
) -> Result<String, ApiError>
where
    A: TwitchApi + ?Sized,
{
    let entries = cache.map(|c| &mut c.streamers);
    cached_or_fetch(login, entries, || api.user_display_name(login)).await
}

/// Title of a game, keyed by game ID. The no-game sentinel resolves to an
/// empty title without touching the cache or the API.
pub async fn resolve_game_title<A>(
    game_id: &str,
    cache: Option<&mut NameCache>,
    api: &A,
) -> Result<String, ApiError>
where
    A: TwitchApi + ?Sized,
{
    if is_no_game(game_id) {
        return Ok(String::new());
    }
    let entries = cache.map(|c| &mut c.games);
    cached_or_fetch(game_id, entries, || api.game_name(game_id)).await
}

async fn cached_or_fetch<F, Fut>(
    key: &str,
    entries: Option<&mut BTreeMap<String, String>>,
    fetch: F,
) -> Result<String, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, ApiError>>,
{
    let Some(entries) = entries else {
        return fetch().await;
    };

    if let Some(value) = entries.get(key) {
        return Ok(value.clone());
    }

    let value = fetch().await?;
    debug!(key = %key, value = %value, "Cached new name");
    entries.insert(key.to_string(), value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let mut entries = BTreeMap::from([("k".to_string(), "cached".to_string())]);

        let value = cached_or_fetch("k", Some(&mut entries), || async {
            Err(ApiError::request(500, "fetched on a cache hit"))
        })
        .await
        .unwrap();
        assert_eq!(value, "cached");
    }

    #[tokio::test]
    async fn test_miss_inserts() {
        let mut entries = BTreeMap::new();

        let value = cached_or_fetch("k", Some(&mut entries), || async { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
        assert_eq!(entries.get("k").map(String::as_str), Some("fresh"));
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_untouched() {
        let mut entries = BTreeMap::new();

        let err = cached_or_fetch("k", Some(&mut entries), || async {
            Err(ApiError::request(502, "bad gateway"))
        })
        .await
        .unwrap_err();
        assert!(err.is_bad_gateway());
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_without_cache_always_fetches() {
        let value = cached_or_fetch("k", None, || async { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
    }
}
