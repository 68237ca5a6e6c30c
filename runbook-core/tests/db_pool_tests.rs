/// Integration tests for the database connection pool
///
/// File-backed tests use a throwaway SQLite file in a temp directory, so no
/// database server is needed.

use runbook_core::db::pool::{close_pool, create_pool, get_pool_stats, health_check, DatabaseConfig};
use runbook_core::db::with_transaction;
use runbook_core::Error;
use tempfile::TempDir;

/// Config for a fresh database file inside `dir`
fn file_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("runbook.db").display()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_pool_creates_missing_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = file_config(&dir);

    let result = create_pool(config).await;
    assert!(result.is_ok(), "Failed to create pool: {:?}", result.err());

    let pool = result.unwrap();
    assert!(dir.path().join("runbook.db").exists());

    let stats = get_pool_stats(&pool);
    assert!(stats.total_connections > 0, "Pool should have at least one connection");

    close_pool(pool).await;
}

#[tokio::test]
async fn test_create_pool_with_invalid_path() {
    let config = DatabaseConfig {
        url: "sqlite:///nonexistent-dir/for/sure/runbook.db".to_string(),
        max_connections: 1,
        min_connections: 0,
        connect_timeout_seconds: 2,
        idle_timeout_seconds: None,
        max_lifetime_seconds: None,
        test_before_acquire: false,
    };

    let result = create_pool(config).await;
    assert!(result.is_err(), "Should fail when the directory does not exist");
}

#[tokio::test]
async fn test_health_check_success() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    let result = health_check(&pool).await;
    assert!(result.is_ok(), "Health check should succeed");

    close_pool(pool).await;
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .expect("Failed to read pragma");
    assert_eq!(enabled, 1);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_file_database_uses_wal() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = create_pool(file_config(&dir)).await.expect("Failed to create pool");

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .expect("Failed to read pragma");
    assert_eq!(mode.to_lowercase(), "wal");

    close_pool(pool).await;
}

#[tokio::test]
async fn test_pool_concurrent_queries() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = DatabaseConfig {
        max_connections: 4,
        min_connections: 1,
        ..file_config(&dir)
    };

    let pool = create_pool(config).await.expect("Failed to create pool");

    // More tasks than connections to exercise queueing
    let mut handles = vec![];
    for i in 0..20i64 {
        let pool_clone = pool.clone();
        let handle = tokio::spawn(async move {
            let row: (i64,) = sqlx::query_as("SELECT ?")
                .bind(i)
                .fetch_one(&pool_clone)
                .await
                .expect("Failed to execute query");

            assert_eq!(row.0, i);
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    close_pool(pool).await;
}

#[tokio::test]
async fn test_get_pool_stats() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    let stats = get_pool_stats(&pool);
    assert_eq!(stats.total_connections, 1);

    let _conn = pool.acquire().await.expect("Failed to acquire connection");

    let stats_with_active = get_pool_stats(&pool);
    assert_eq!(stats_with_active.active_connections, 1);
    assert_eq!(stats_with_active.idle_connections, 0);
}

#[tokio::test]
async fn test_in_memory_pool_keeps_its_data() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    sqlx::query("CREATE TABLE scratch (n INTEGER)")
        .execute(&pool)
        .await
        .expect("Failed to create table");

    for i in 0..10i64 {
        sqlx::query("INSERT INTO scratch (n) VALUES (?)")
            .bind(i)
            .execute(&pool)
            .await
            .expect("Failed to insert");
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
        .fetch_one(&pool)
        .await
        .expect("Failed to count");
    assert_eq!(count, 10);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_with_transaction_commits_and_rolls_back() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    sqlx::query("CREATE TABLE scratch (n INTEGER)")
        .execute(&pool)
        .await
        .expect("Failed to create table");

    let committed = with_transaction(&pool, |conn| {
        Box::pin(async move {
            sqlx::query("INSERT INTO scratch (n) VALUES (1)")
                .execute(&mut *conn)
                .await?;
            Ok(1)
        })
    })
    .await;
    assert_eq!(committed.unwrap(), 1);

    let failed: Result<(), Error> = with_transaction(&pool, |conn| {
        Box::pin(async move {
            sqlx::query("INSERT INTO scratch (n) VALUES (2)")
                .execute(&mut *conn)
                .await?;
            Err(Error::Conflict("abort".to_string()))
        })
    })
    .await;
    assert!(matches!(failed, Err(Error::Conflict(_))));

    let values: Vec<i64> = sqlx::query_scalar("SELECT n FROM scratch ORDER BY n")
        .fetch_all(&pool)
        .await
        .expect("Failed to read back");
    assert_eq!(values, vec![1]);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_close_pool() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    close_pool(pool.clone()).await;

    let result: Result<(i64,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    assert!(result.is_err(), "Queries should fail after pool is closed");
}

#[tokio::test]
async fn test_pool_exhaustion_timeout() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = DatabaseConfig {
        max_connections: 2,
        min_connections: 0,
        connect_timeout_seconds: 1,
        idle_timeout_seconds: None,
        max_lifetime_seconds: None,
        test_before_acquire: false,
        ..file_config(&dir)
    };

    let pool = create_pool(config).await.expect("Failed to create pool");

    let _conn1 = pool.acquire().await.expect("Failed to acquire connection 1");
    let _conn2 = pool.acquire().await.expect("Failed to acquire connection 2");

    let result = pool.acquire().await;
    assert!(result.is_err(), "Should time out when pool is exhausted");
}

#[test]
fn test_database_config_defaults() {
    let config = DatabaseConfig::default();
    assert_eq!(config.url, "sqlite://runbook.db");
    assert!(!config.is_in_memory());
    assert!(DatabaseConfig::in_memory().is_in_memory());
}
