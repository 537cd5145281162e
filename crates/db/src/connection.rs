use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use lounge_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Every connection to a private in-memory database sees its own empty
/// schema, so such URLs are pinned to a single connection.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = is_in_memory(database_url);
    let max_connections = if in_memory { 1 } else { max_connections.max(1) };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                if !in_memory {
                    sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                }
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// Cheap round trip used by the health endpoint and `lounge doctor`.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await.map(|_| ())
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory, ping};

    #[test]
    fn recognises_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite::memory:?cache=shared"));
        assert!(is_in_memory("sqlite://file:lounge?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://lounge.db?mode=rwc"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_schema_across_queries() {
        let pool = connect_with_settings("sqlite::memory:", 5, 5).await.expect("pool");

        sqlx::query("CREATE TABLE probe (id INTEGER)").execute(&pool).await.expect("create");
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM probe").fetch_one(&pool).await.expect("select");

        assert_eq!(count, 0);
        assert_eq!(pool.options().get_max_connections(), 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn ping_fails_once_the_pool_is_closed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        ping(&pool).await.expect("open pool answers");

        pool.close().await;

        assert!(ping(&pool).await.is_err());
    }
}
