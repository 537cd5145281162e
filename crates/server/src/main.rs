mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use lounge_core::config::{AppConfig, LoadOptions};
use tracing::{error, info, warn};

use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use lounge_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before bootstrap so startup failures are reported.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = match bootstrap::bootstrap_with_config(config).await {
        Ok(app) => app,
        Err(bootstrap_error) => {
            error!(
                event_name = "system.bootstrap.failed",
                correlation_id = "bootstrap",
                error = %bootstrap_error,
                "startup aborted"
            );
            return Err(bootstrap_error.into());
        }
    };

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState::new(app.db_pool.clone(), app.followups.clone()),
    )
    .await?;

    info!(event_name = "system.server.started", correlation_id = "bootstrap", "lounge-server started");

    let outcome = tokio::select! {
        result = app.runner.run() => result.map_err(anyhow::Error::from),
        signal = wait_for_shutdown() => signal,
    };
    if let Err(runner_error) = &outcome {
        error!(
            event_name = "system.server.runner_failed",
            correlation_id = "shutdown",
            error = %runner_error,
            "polling runner stopped"
        );
    }

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "lounge-server stopping");
    app.followups.shutdown();
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = app.config.server.graceful_shutdown_secs,
            "database pool did not close within the grace period"
        );
    }

    outcome
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            signal = tokio::signal::ctrl_c() => signal?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!(event_name = "system.server.signal_received", correlation_id = "shutdown", "shutdown requested");
    Ok(())
}
