mod common;

use common::sample_account;
use medrecord_server::{
    config::SchemaSync,
    repository::{Repository, SqliteRepository},
};
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};

/// One connection, so every query sees the same in-memory database.
async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite")
}

async fn column_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query("SELECT name FROM pragma_table_info('users')")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

#[tokio::test]
async fn ping_succeeds_on_a_live_pool() {
    let repo = SqliteRepository::new(memory_pool().await);
    assert!(repo.ping().await.is_ok());
}

#[tokio::test]
async fn ping_fails_when_storage_is_unreachable() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy("sqlite:///nonexistent-dir/medrecord.db?mode=ro")
        .unwrap();
    let repo = SqliteRepository::new(pool);
    assert!(repo.ping().await.is_err());
}

#[tokio::test]
async fn alter_creates_the_table_and_is_repeatable() {
    let pool = memory_pool().await;
    let repo = SqliteRepository::new(pool.clone());

    repo.sync_schema(SchemaSync::Alter).await.unwrap();
    repo.sync_schema(SchemaSync::Alter).await.unwrap();

    let columns = column_names(&pool).await;
    for expected in ["id", "name", "phone", "email", "password", "roles", "active_role"] {
        assert!(columns.iter().any(|c| c == expected), "missing {expected}");
    }
}

#[tokio::test]
async fn alter_adds_missing_columns_without_losing_rows() {
    let pool = memory_pool().await;
    sqlx::query("CREATE TABLE users (id TEXT PRIMARY KEY NOT NULL, name TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (id, name) VALUES ('legacy', 'Legacy User')")
        .execute(&pool)
        .await
        .unwrap();

    let repo = SqliteRepository::new(pool.clone());
    repo.sync_schema(SchemaSync::Alter).await.unwrap();

    assert!(column_names(&pool).await.iter().any(|c| c == "active_role"));
    let legacy = repo.find_account("legacy").await.unwrap().unwrap();
    assert_eq!(legacy.name, "Legacy User");
    assert!(legacy.roles.is_empty());
}

#[tokio::test]
async fn force_recreates_the_table_and_drops_rows() {
    let pool = memory_pool().await;
    let repo = SqliteRepository::new(pool);
    repo.sync_schema(SchemaSync::Alter).await.unwrap();
    repo.create_account(&sample_account("doc-1")).await.unwrap();

    repo.sync_schema(SchemaSync::Force).await.unwrap();

    assert!(repo.find_account("doc-1").await.unwrap().is_none());
}

#[tokio::test]
async fn create_then_find_round_trips_roles() {
    let repo = SqliteRepository::new(memory_pool().await);
    repo.sync_schema(SchemaSync::Alter).await.unwrap();

    let account = sample_account("doc-2");
    assert!(repo.create_account(&account).await.unwrap());

    let found = repo.find_account("doc-2").await.unwrap().unwrap();
    assert_eq!(found, account);
}

#[tokio::test]
async fn create_never_overwrites_an_existing_id() {
    let repo = SqliteRepository::new(memory_pool().await);
    repo.sync_schema(SchemaSync::Alter).await.unwrap();

    let original = sample_account("doc-3");
    assert!(repo.create_account(&original).await.unwrap());

    let mut impostor = sample_account("doc-3");
    impostor.name = "Someone Else".to_string();
    assert!(!repo.create_account(&impostor).await.unwrap());

    let stored = repo.find_account("doc-3").await.unwrap().unwrap();
    assert_eq!(stored.name, original.name);
}

#[tokio::test]
async fn find_missing_account_is_none() {
    let repo = SqliteRepository::new(memory_pool().await);
    repo.sync_schema(SchemaSync::Alter).await.unwrap();
    assert!(repo.find_account("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn queries_fail_before_schema_sync() {
    let repo = SqliteRepository::new(memory_pool().await);
    assert!(repo.find_account("anyone").await.is_err());
}

#[tokio::test]
async fn unreadable_roles_load_as_empty() {
    let pool = memory_pool().await;
    let repo = SqliteRepository::new(pool.clone());
    repo.sync_schema(SchemaSync::Alter).await.unwrap();
    sqlx::query(
        "INSERT INTO users (id, name, roles, active_role) VALUES ('admin001', 'Hand Edited', 'admin', 'admin')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let account = repo.find_account("admin001").await.unwrap().unwrap();
    assert_eq!(account.name, "Hand Edited");
    assert!(account.roles.is_empty());
    assert_eq!(account.active_role, "admin");
}
