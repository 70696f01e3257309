use std::{env, fmt, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Default listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 5000;
/// Default decoded body limit (100 KiB), matching common JSON body parser limits.
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024;
const DEFAULT_LOCAL_DB_URL: &str = "sqlite://medrecord.db?mode=rwc";

/// AppConfig
///
/// Holds the application's entire configuration state. The struct is immutable once loaded
/// and is pulled into handlers through `FromRef`, so every component reads the same values
/// for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Listen port, bound on 0.0.0.0.
    pub port: u16,
    // Runtime environment marker. Controls log format and which schema policies are allowed.
    pub env: Env,
    // SQLite connection string consumed by the storage handle.
    pub db_url: String,
    // Schema reconciliation policy applied at startup.
    pub schema_sync: SchemaSync,
    // Root directory for the single-page application's built assets.
    pub static_dir: PathBuf,
    // Directory served under `/uploads`.
    pub uploads_dir: PathBuf,
    // The SPA entry document returned for unmatched navigation.
    pub spa_index: PathBuf,
    // Upper bound on JSON / form bodies decoded by the middleware chain.
    pub body_limit: usize,
}

/// Env
///
/// Defines the runtime context. Only production changes behaviour: JSON logs, a mandatory
/// `DATABASE_URL`, and no destructive schema sync.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Env {
    /// Human label used in startup log lines.
    pub fn label(self) -> &'static str {
        match self {
            Env::Local => "development",
            Env::Production => "production",
        }
    }
}

/// SchemaSync
///
/// How the storage schema is reconciled at startup.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SchemaSync {
    /// Create missing tables and add missing columns in place. Never drops data.
    Alter,
    /// Drop and recreate tables. Only permitted outside production.
    Force,
}

impl fmt::Display for SchemaSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSync::Alter => f.write_str("alter"),
            SchemaSync::Force => f.write_str("force"),
        }
    }
}

impl FromStr for SchemaSync {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alter" => Ok(SchemaSync::Alter),
            "force" => Ok(SchemaSync::Force),
            other => Err(ConfigError::Invalid {
                var: "SCHEMA_SYNC",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
    #[error("SCHEMA_SYNC=force would drop tables and is refused in production")]
    DestructiveSyncInProduction,
}

impl Default for AppConfig {
    /// Non-panicking configuration for test scaffolding: in-memory storage, relative asset
    /// directories, local mode.
    fn default() -> Self {
        let static_dir = PathBuf::from("public");
        Self {
            port: DEFAULT_PORT,
            env: Env::Local,
            db_url: "sqlite::memory:".to_string(),
            schema_sync: SchemaSync::Alter,
            spa_index: static_dir.join("index.html"),
            static_dir,
            uploads_dir: PathBuf::from("uploads"),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every setting from the environment (after `.env` has been applied by `main`).
    /// Fails fast on malformed values and on production deployments missing `DATABASE_URL`
    /// or asking for a destructive schema sync, so the process never starts half-configured.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let port = parse_var("PORT", DEFAULT_PORT)?;
        let body_limit = parse_var("BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?;

        let db_url = match (env, env::var("DATABASE_URL")) {
            (_, Ok(url)) => url,
            (Env::Local, Err(_)) => DEFAULT_LOCAL_DB_URL.to_string(),
            (Env::Production, Err(_)) => return Err(ConfigError::Missing("DATABASE_URL")),
        };

        let schema_sync = match env::var("SCHEMA_SYNC") {
            Ok(value) => value.parse()?,
            Err(_) => SchemaSync::Alter,
        };
        if env == Env::Production && schema_sync == SchemaSync::Force {
            return Err(ConfigError::DestructiveSyncInProduction);
        }

        let static_dir = PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "public".into()));
        let uploads_dir =
            PathBuf::from(env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".into()));
        let spa_index = env::var("SPA_INDEX")
            .map(PathBuf::from)
            .unwrap_or_else(|_| static_dir.join("index.html"));

        Ok(Self {
            port,
            env,
            db_url,
            schema_sync,
            static_dir,
            uploads_dir,
            spa_index,
            body_limit,
        })
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
