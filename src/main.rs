use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use printwatch::config::Config;
use printwatch::middleware::rate_limit::rate_limit_error_response;
use printwatch::services::init;
use printwatch::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "printwatch=debug,tower_http=debug".into());
    if config.server.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting printwatch backend");

    // Initialize database
    let pool = init::init_db(&config).await?;

    let app_state = Arc::new(AppState::new(pool, config.clone()));

    // Create shutdown notifier for background workers
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn background workers (returns JoinHandles so we can await shutdown)
    let mut bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    // Per-IP rate limiting for the whole API. The error handler returns a
    // proper 429 status and Retry-After header when limits are exceeded.
    let gov_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit.api_per_second.into())
            .burst_size(config.rate_limit.api_burst)
            .key_extractor(SmartIpKeyExtractor)
            .error_handler(rate_limit_error_response)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build API governor config"))?,
    );

    // Background cleanup for limiter storage
    {
        let limiter = gov_conf.limiter().clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        bg_handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Rate limiter cleanup task exiting");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(60)) => {
                        tracing::debug!("api rate limiter size: {}", limiter.len());
                        limiter.retain_recent();
                    }
                }
            }
        }));
    }

    let app = printwatch::build_router(app_state.clone())?.layer(GovernorLayer {
        config: gov_conf.clone(),
    });

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, waiting for Ctrl+C only: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = ctrl_c.await {
                tracing::error!("Failed to bind Ctrl+C: {}", e);
            }
        }

        tracing::info!("Shutdown signal received, notifying background workers");
        let _ = shutdown_tx_clone.send(());
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server future dropped to stop accepting new connections");
        }
    }

    // Give background workers some time to finish their work.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background workers to exit",
        shutdown_wait.as_secs()
    );

    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    let _ = tokio::time::timeout(shutdown_wait, bg_wait).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
