mod composition;
mod config;
mod handlers;
mod repository;
mod subscriber;
mod subscriptions;

use std::sync::Arc;

use reporting_core::{config::ExposeSecret, telemetry};
use tracing::{error, info, warn};

use composition::CompositionRoot;
use config::Config;
use handlers::HandlerSet;
use repository::{RedisReportRepository, ReportRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _guard = telemetry::init_tracing(&config.observability_config(), "reporting-service")?;

    let redis_client = redis::Client::open(config.redis_config().url.expose_secret().as_str())?;
    let repository: Arc<dyn ReportRepository> = Arc::new(RedisReportRepository::new(redis_client));

    let settings = config.subscriber_settings();
    let flags = config.feature_flags();
    info!(
        public_blockchain_disabled = flags.public_blockchain_disabled,
        handler_max_attempts = settings.retry.max_attempts(),
        "Starting reporting-service"
    );

    let root = CompositionRoot::new(settings, flags, HandlerSet::reporting(&repository));
    let subscribers = root.start().await?;
    if subscribers.is_empty() {
        warn!("No subscriptions are active");
    }
    info!(subscribers = subscribers.len(), "reporting-service running");

    shutdown_signal().await;
    info!("Shutdown signal received, stopping subscribers");

    if let Err(e) = subscribers.stop().await {
        error!(error = %e, "Subscribers did not shut down cleanly");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
