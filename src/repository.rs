use crate::{config::SchemaSync, models::Account};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, SqlitePool};
use std::sync::Arc;

/// Repository Trait
///
/// The contract the rest of the crate uses to reach persistent storage. Startup needs
/// connectivity, schema reconciliation and seed reads/writes; the users group needs lookups.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum's tasks and
/// let tests substitute an in-memory double.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Round-trips a trivial query, forcing the lazy pool to open a connection.
    async fn ping(&self) -> Result<(), sqlx::Error>;

    /// Brings the `users` table in line with the account model using the given policy.
    async fn sync_schema(&self, strategy: SchemaSync) -> Result<(), sqlx::Error>;

    async fn find_account(&self, id: &str) -> Result<Option<Account>, sqlx::Error>;

    /// Inserts the account unless its id already exists. Returns true only if a row was
    /// written; an existing row is left untouched.
    async fn create_account(&self, account: &Account) -> Result<bool, sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Column definitions for `users`. Every NOT NULL column carries a constant default so
/// `Alter` can add it to a table that already holds rows (SQLite refuses non-constant
/// defaults in `ADD COLUMN`).
const ACCOUNT_COLUMNS: &[(&str, &str)] = &[
    ("name", "TEXT NOT NULL DEFAULT ''"),
    ("phone", "TEXT NOT NULL DEFAULT ''"),
    ("email", "TEXT NOT NULL DEFAULT ''"),
    ("password", "TEXT NOT NULL DEFAULT ''"),
    ("roles", "TEXT NOT NULL DEFAULT '[]'"),
    ("active_role", "TEXT NOT NULL DEFAULT ''"),
    ("created_at", "TEXT"),
    ("updated_at", "TEXT"),
];

fn create_users_table_sql() -> String {
    let columns = ACCOUNT_COLUMNS
        .iter()
        .map(|(name, decl)| format!("{name} {decl}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS users (id TEXT PRIMARY KEY NOT NULL, {columns})")
}

/// Raw `users` row. `roles` is stored as a JSON array of strings.
#[derive(FromRow)]
struct AccountRow {
    id: String,
    name: String,
    phone: String,
    email: String,
    password: String,
    roles: String,
    active_role: String,
}

impl From<AccountRow> for Account {
    /// A `roles` value that is not a JSON string array (hand-edited or legacy rows) loads as
    /// an empty role list, logged at `warn`.
    fn from(row: AccountRow) -> Self {
        let roles = serde_json::from_str::<Vec<String>>(&row.roles).unwrap_or_else(|e| {
            tracing::warn!(
                id = %row.id,
                roles = %row.roles,
                error = %e,
                "unreadable roles column, treating as empty"
            );
            Vec::new()
        });
        Account {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            password_hash: row.password,
            roles,
            active_role: row.active_role,
        }
    }
}

/// SqliteRepository
///
/// `Repository` backed by a SQLite pool. The pool may be built with `connect_lazy`; no
/// connection is opened until the first query.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// sync_schema
    ///
    /// `Force` drops the table and rebuilds it; `Alter` creates the table if absent and then
    /// adds whichever columns `pragma_table_info` reports missing. Either way the work runs in
    /// one transaction, so a failure leaves the previous schema intact.
    async fn sync_schema(&self, strategy: SchemaSync) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if strategy == SchemaSync::Force {
            sqlx::query("DROP TABLE IF EXISTS users")
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(&create_users_table_sql())
            .execute(&mut *tx)
            .await?;

        if strategy == SchemaSync::Alter {
            let existing: Vec<String> =
                sqlx::query("SELECT name FROM pragma_table_info('users')")
                    .fetch_all(&mut *tx)
                    .await?
                    .iter()
                    .map(|row| row.try_get::<String, _>("name"))
                    .collect::<Result<_, _>>()?;

            for (name, decl) in ACCOUNT_COLUMNS {
                if !existing.iter().any(|column| column.as_str() == *name) {
                    tracing::info!(column = name, "adding missing column to users");
                    sqlx::query(&format!("ALTER TABLE users ADD COLUMN {name} {decl}"))
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await
    }

    async fn find_account(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT id, name, phone, email, password, roles, active_role FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Account::from))
    }

    /// create_account
    ///
    /// Uses `ON CONFLICT DO NOTHING` so the insert itself is idempotent: a concurrent or
    /// repeated seed never overwrites an existing row.
    async fn create_account(&self, account: &Account) -> Result<bool, sqlx::Error> {
        let roles =
            serde_json::to_string(&account.roles).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let now: DateTime<Utc> = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, phone, email, password, roles, active_role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.phone)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(roles)
        .bind(&account.active_role)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
