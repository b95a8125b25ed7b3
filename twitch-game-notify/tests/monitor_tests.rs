mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use common::{FakeApi, Failure, RecordingSink};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use twitch_api::ApiError;
use twitch_game_notify::{
    Error,
    cache::{CacheSession, CacheStore, NameCache},
    config::StreamerConfig,
    monitor::{
        AUTHENTICATION_FAILED_MESSAGE, BackoffPolicy, CONNECTION_LOST_MESSAGE, CycleSummary,
        Monitor, MonitorSettings, establish_client,
    },
};

const PERIOD: Duration = Duration::from_secs(60);

fn settings(one_shot: bool, ignore_502s: bool) -> MonitorSettings {
    MonitorSettings {
        query_period: PERIOD,
        one_shot,
        ignore_502s,
    }
}

fn streamers() -> BTreeMap<String, StreamerConfig> {
    BTreeMap::from([
        ("shroud".to_string(), StreamerConfig::new(["516575"])),
        (
            "tyler1".to_string(),
            StreamerConfig::all_games().with_exclude(["Just Chatting"]),
        ),
    ])
}

fn fake_api() -> Arc<FakeApi> {
    Arc::new(
        FakeApi::new()
            .with_user("shroud", "shroud")
            .with_user("tyler1", "loltyler1")
            .with_game("516575", "VALORANT")
            .with_game("21779", "League of Legends"),
    )
}

fn monitor(api: &Arc<FakeApi>, sink: &Arc<RecordingSink>, settings: MonitorSettings) -> Monitor {
    Monitor::new(api.clone(), sink.clone(), streamers(), settings)
}

#[tokio::test]
async fn persistent_mode_notifies_once_per_transition() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, true));

    api.set_live("shroud", "516575", "VALORANT", "ranked grind");
    api.set_live("tyler1", "509658", "Just Chatting", "waking up");

    let summary = monitor.run_cycle(&token).await.unwrap();
    assert_eq!(
        summary,
        CycleSummary {
            notified: 1,
            suppressed: 1,
            failed: 0,
            unreachable: 0,
        }
    );

    let summary = monitor.run_cycle(&token).await.unwrap();
    assert_eq!(summary.notified, 0);
    assert_eq!(summary.suppressed, 2);

    api.set_live("tyler1", "21779", "League of Legends", "soloq");
    let summary = monitor.run_cycle(&token).await.unwrap();
    assert_eq!(summary.notified, 1);

    let shown: Vec<_> = sink.streams().into_iter().map(|n| n.display_name).collect();
    assert_eq!(shown, vec!["shroud", "loltyler1"]);
    assert!(sink.errors().is_empty());

    let state = monitor.previous_state().unwrap();
    assert_eq!(state.get("tyler1"), "21779");
}

#[tokio::test]
async fn one_shot_mode_has_no_duplicate_suppression() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(true, false));
    assert!(monitor.previous_state().is_none());

    api.set_live("shroud", "516575", "VALORANT", "ranked grind");
    monitor.run(&token).await.unwrap();
    monitor.run(&token).await.unwrap();

    assert_eq!(sink.streams().len(), 2);
    assert_eq!(api.stream_fetches(), vec!["shroud", "tyler1", "shroud", "tyler1"]);
}

#[tokio::test]
async fn bad_gateway_is_ignored_when_configured() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, true));

    api.fail_stream("shroud", Failure::Status(502));
    api.set_live("tyler1", "21779", "League of Legends", "soloq");

    let summary = monitor.run_cycle(&token).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 1);
    assert!(sink.errors().is_empty());
}

#[tokio::test]
async fn bad_gateway_is_reported_otherwise() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, false));

    api.fail_stream("shroud", Failure::Status(502));

    monitor.run_cycle(&token).await.unwrap();
    assert_eq!(
        sink.errors(),
        vec!["An HTTP request to https://api.twitch.tv/helix/streams failed with status code 502"]
    );
}

#[tokio::test]
async fn other_request_failures_skip_only_that_streamer() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, true));

    api.fail_stream("shroud", Failure::Status(500));
    api.set_live("tyler1", "21779", "League of Legends", "soloq");

    let summary = monitor.run_cycle(&token).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 1);
    assert_eq!(sink.errors().len(), 1);
    assert!(sink.errors()[0].contains("500"));
}

#[tokio::test]
async fn connection_failures_are_coalesced() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(true, false));

    api.fail_stream("shroud", Failure::Connection);
    api.fail_stream("tyler1", Failure::Connection);

    let summary = monitor.run_cycle(&token).await.unwrap();
    assert_eq!(summary.unreachable, 2);
    assert_eq!(sink.errors(), vec![CONNECTION_LOST_MESSAGE]);
}

#[tokio::test]
async fn connection_failure_message_mentions_next_poll() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, false));

    api.fail_stream("shroud", Failure::Connection);
    monitor.run_cycle(&token).await.unwrap();

    assert_eq!(
        sink.errors(),
        vec!["Unable to connect to Twitch. Retrying in 60s"]
    );
}

#[tokio::test]
async fn authentication_failure_stops_the_cycle() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, true));

    api.fail_stream("shroud", Failure::Authentication);
    api.set_live("tyler1", "21779", "League of Legends", "soloq");

    let err = monitor.run_cycle(&token).await.unwrap_err();
    assert!(matches!(err, Error::Api(ref e) if e.is_authentication()));
    assert_eq!(sink.errors(), vec![AUTHENTICATION_FAILED_MESSAGE]);
    // tyler1 comes after shroud and is never polled.
    assert_eq!(api.stream_fetches(), vec!["shroud"]);
}

#[tokio::test]
async fn cancelled_token_skips_remaining_streamers() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, true));

    token.cancel();
    let summary = monitor.run_cycle(&token).await.unwrap();

    assert_eq!(summary, CycleSummary::default());
    assert!(api.stream_fetches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_forever_polls_every_period_until_cancelled() {
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();
    let mut monitor = monitor(&api, &sink, settings(false, true));

    api.set_live("shroud", "516575", "VALORANT", "ranked grind");

    let task_token = token.clone();
    let handle = tokio::spawn(async move {
        monitor.run_forever(&task_token).await.unwrap();
        monitor
    });

    // Ticks at 0s, 60s and 120s.
    tokio::time::sleep(Duration::from_secs(150)).await;
    token.cancel();
    handle.await.unwrap();

    let shroud_polls = api
        .stream_fetches()
        .into_iter()
        .filter(|login| login == "shroud")
        .count();
    assert_eq!(shroud_polls, 3);
    assert_eq!(sink.streams().len(), 1);
}

#[tokio::test]
async fn collected_names_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();

    api.set_live("shroud", "516575", "VALORANT", "ranked grind");

    let mut session = CacheSession::open(store.clone()).unwrap();
    assert!(session.is_owner());
    let mut first = monitor(&api, &sink, settings(true, false)).with_cache(session.take_cache());
    first.run(&token).await.unwrap();
    assert!(session.close(first.into_cache()).unwrap());
    assert!(!store.lock_path().exists());

    let mut session = CacheSession::open(store.clone()).unwrap();
    let restored = session.take_cache();
    assert_eq!(restored.games.get("516575").map(String::as_str), Some("VALORANT"));
    assert_eq!(restored.streamers.get("shroud").map(String::as_str), Some("shroud"));

    let fresh_api = fake_api();
    fresh_api.set_live("shroud", "516575", "VALORANT", "ranked grind");
    let mut second = monitor(&fresh_api, &sink, settings(true, false)).with_cache(restored);
    second.run(&token).await.unwrap();
    session.close(second.into_cache()).unwrap();

    assert!(fresh_api.user_fetches().is_empty());
    assert!(fresh_api.game_fetches().is_empty());
    assert_eq!(sink.streams().len(), 2);
}

#[tokio::test]
async fn second_instance_does_not_persist_its_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(dir.path());
    let api = fake_api();
    let sink = Arc::new(RecordingSink::new());
    let token = CancellationToken::new();

    api.set_live("shroud", "516575", "VALORANT", "ranked grind");

    let owner = CacheSession::open(store.clone()).unwrap();
    let mut other = CacheSession::open(store.clone()).unwrap();
    assert!(owner.is_owner());
    assert!(!other.is_owner());

    let mut monitor = monitor(&api, &sink, settings(true, false)).with_cache(other.take_cache());
    monitor.run(&token).await.unwrap();
    let collected = monitor.into_cache().unwrap();
    assert_eq!(collected.games.get("516575").map(String::as_str), Some("VALORANT"));

    assert!(!other.close(Some(collected)).unwrap());
    assert!(!store.cache_path().exists());
    assert!(store.lock_path().exists());

    assert!(!owner.close(None).unwrap());
    assert_eq!(store.load().unwrap(), NameCache::default());
    assert!(!store.lock_path().exists());
}

#[tokio::test(start_paused = true)]
async fn setup_backs_off_until_connected() {
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    let attempts = AtomicU32::new(0);
    let start = Instant::now();

    let result = establish_client(&BackoffPolicy::default(), &sink, &token, || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 3 {
                Err(ApiError::connection("connection refused"))
            } else {
                Ok(attempt)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(2 + 4 + 8));
    assert_eq!(
        sink.errors(),
        vec![
            "Unable to connect to Twitch. Retrying in 2s",
            "Unable to connect to Twitch. Retrying in 4s",
            "Unable to connect to Twitch. Retrying in 8s",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn setup_retries_transient_server_errors() {
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    let attempts = AtomicU32::new(0);

    let result = establish_client(&BackoffPolicy::default(), &sink, &token, || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt == 0 {
                Err(ApiError::request(503, "unavailable"))
            } else {
                Ok(())
            }
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn setup_gives_up_on_bad_credentials() {
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    let attempts = AtomicU32::new(0);

    let result: twitch_game_notify::Result<()> =
        establish_client(&BackoffPolicy::default(), &sink, &token, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::authentication(400, "invalid client")) }
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Api(ref e) if e.is_authentication()));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(sink.errors(), vec![AUTHENTICATION_FAILED_MESSAGE]);
}

#[tokio::test(start_paused = true)]
async fn setup_wait_is_cancellable() {
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    let attempts = AtomicU32::new(0);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        canceller.cancel();
    });

    let result: twitch_game_notify::Result<()> =
        establish_client(&BackoffPolicy::default(), &sink, &token, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::connection("connection refused")) }
        })
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    // Attempts at 0s and 2s; the 4s wait that follows is cut short.
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
