use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use twitch_api::HelixClient;
use twitch_game_notify::{
    Error, Result,
    cache::{CacheSession, CacheStore},
    cli::Args,
    config::{AppConfig, EXAMPLE_CONFIG},
    logging::init_logging,
    monitor::{BackoffPolicy, Monitor, MonitorSettings, establish_client, report_error},
    notification::{DesktopSink, NotificationSink, TerminalSink},
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.log_level);

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            debug!(error = %e, "Exiting with failure");
            1
        }
    };
    process::exit(code);
}

/// Every error returned from here has already been reported to the user.
async fn run(args: Args) -> Result<()> {
    if args.print_example_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let store = CacheStore::default();
    if args.remove_cache_lock {
        return match store.force_unlock() {
            Ok(()) => {
                println!("Removed {}", store.lock_path().display());
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                Err(e)
            }
        };
    }

    let sink: Arc<dyn NotificationSink> = if args.print_to_terminal {
        Arc::new(TerminalSink)
    } else {
        Arc::new(DesktopSink::new())
    };

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            report_error(sink.as_ref(), &e.to_string()).await;
            return Err(e);
        }
    };

    let mut session = if args.no_caching {
        None
    } else {
        CacheSession::open(store)
            .inspect_err(|e| warn!("Running without the name cache: {e}"))
            .ok()
    };

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    let credentials = config.credentials();
    let client = establish_client(&BackoffPolicy::default(), sink.as_ref(), &token, || {
        HelixClient::connect(credentials.clone())
    })
    .await;

    let (result, cache) = match client {
        Ok(client) => {
            let settings = MonitorSettings::from_config(&config, args.one_shot);
            let mut monitor = Monitor::new(
                Arc::new(client),
                sink.clone(),
                config.streamers.clone(),
                settings,
            );
            if let Some(session) = session.as_mut() {
                monitor = monitor.with_cache(session.take_cache());
            }
            let result = monitor.run(&token).await;
            (result, monitor.into_cache())
        }
        Err(Error::Cancelled) => (Ok(()), None),
        Err(e) => (Err(e), None),
    };

    if let Some(session) = session
        && let Err(e) = session.close(cache)
    {
        warn!("Failed to save name cache: {e}");
    }

    info!("Shutting down");
    result
}

async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested");
    token.cancel();
}
