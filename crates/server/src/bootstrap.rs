use std::sync::Arc;

use lounge_core::config::{AppConfig, ConfigError, LoadOptions};
use lounge_core::flows::InMemoryConversationStore;
use lounge_db::repositories::{SqlAppointmentRepository, SqlUserRepository};
use lounge_db::{connect, migrations, DbPool};
use lounge_telegram::client::{ApiError, TelegramClient};
use lounge_telegram::controller::{DialogController, DialogSettings};
use lounge_telegram::delivery::MessageSink;
use lounge_telegram::events::dialog_dispatcher;
use lounge_telegram::followup::FollowUpScheduler;
use lounge_telegram::notifier::AdminNotifier;
use lounge_telegram::polling::{LongPollTransport, PollingRunner, ReconnectPolicy};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub followups: FollowUpScheduler,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[from] ApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let client = TelegramClient::new(&config.telegram)?;
    let sink: Arc<dyn MessageSink> = Arc::new(client.clone());

    if config.telegram.admin_chat_id.is_none() {
        warn!(
            event_name = "system.bootstrap.admin_chat_missing",
            correlation_id = "bootstrap",
            "telegram.admin_chat_id is not set; operator notifications will be dropped"
        );
    }
    let notifier = AdminNotifier::new(Arc::clone(&sink), config.telegram.admin_chat_id);
    let followups = FollowUpScheduler::new(Arc::clone(&sink));

    let controller = DialogController::new(
        Arc::new(SqlUserRepository::new(db_pool.clone())),
        Arc::new(SqlAppointmentRepository::new(db_pool.clone())),
        Arc::new(InMemoryConversationStore::default()),
        notifier,
        followups.clone(),
        DialogSettings::from_config(&config.dialog),
    );
    let dispatcher = Arc::new(dialog_dispatcher(Arc::new(controller)));

    let runner = PollingRunner::new(
        Arc::new(LongPollTransport::new(client)),
        dispatcher,
        sink,
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        available_times = config.dialog.available_times.len(),
        booking_horizon_days = config.dialog.booking_horizon_days,
        "dialog controller and polling runner wired"
    );

    Ok(Application { config, db_pool, followups, runner })
}

#[cfg(test)]
mod tests {
    use lounge_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn overrides(database_url: &str, bot_token: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_owned()),
                telegram_bot_token: Some(bot_token.to_owned()),
                telegram_admin_chat_id: Some(-100_200_300),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_a_malformed_bot_token() {
        let result = bootstrap(overrides("sqlite::memory:", "not-a-token")).await;

        let Err(BootstrapError::Config(error)) = result else {
            panic!("expected a configuration error");
        };
        assert!(error.to_string().contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_fails_when_the_database_cannot_be_opened() {
        let result =
            bootstrap(overrides("sqlite:///nonexistent-dir/lounge.db?mode=ro", "123456:test-token"))
                .await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_runtime() {
        let app = bootstrap(overrides("sqlite::memory:", "123456:test-token"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('users', 'appointments')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist after bootstrap");
        assert_eq!(table_count, 2);
        assert_eq!(app.config.telegram.admin_chat_id, Some(-100_200_300));
        assert_eq!(app.followups.pending_count(), 0);

        app.db_pool.close().await;
    }
}
