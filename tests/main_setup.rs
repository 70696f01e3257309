use medrecord_server::{
    AppConfig,
    config::{ConfigError, DEFAULT_BODY_LIMIT, DEFAULT_PORT, Env, SchemaSync},
};
use serial_test::serial;
use std::{env, panic, path::PathBuf};

const CONFIG_VARS: &[&str] = &[
    "APP_ENV",
    "PORT",
    "DATABASE_URL",
    "SCHEMA_SYNC",
    "STATIC_DIR",
    "UPLOADS_DIR",
    "SPA_INDEX",
    "BODY_LIMIT_BYTES",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with exactly `vars` set (every other config variable cleared), then restores
/// the original environment.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn local_defaults_apply_when_nothing_is_set() {
    let config = run_with_env(&[], AppConfig::load).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.port, 5000);
    assert!(config.db_url.starts_with("sqlite://"));
    assert_eq!(config.schema_sync, SchemaSync::Alter);
    assert_eq!(config.static_dir, PathBuf::from("public"));
    assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
    assert_eq!(config.spa_index, PathBuf::from("public").join("index.html"));
    assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
}

#[test]
#[serial]
fn explicit_values_override_defaults() {
    let config = run_with_env(
        &[
            ("PORT", "8080"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("SCHEMA_SYNC", "FORCE"),
            ("STATIC_DIR", "/srv/www"),
            ("BODY_LIMIT_BYTES", "2048"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.db_url, "sqlite::memory:");
    assert_eq!(config.schema_sync, SchemaSync::Force);
    assert_eq!(config.spa_index, PathBuf::from("/srv/www/index.html"));
    assert_eq!(config.body_limit, 2048);
}

#[test]
#[serial]
fn production_requires_database_url() {
    let result = run_with_env(&[("APP_ENV", "production")], AppConfig::load);
    assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
}

#[test]
#[serial]
fn production_refuses_destructive_schema_sync() {
    let result = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "sqlite:///var/lib/medrecord.db"),
            ("SCHEMA_SYNC", "force"),
        ],
        AppConfig::load,
    );
    assert!(matches!(
        result,
        Err(ConfigError::DestructiveSyncInProduction)
    ));
}

#[test]
#[serial]
fn production_with_database_url_loads() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "sqlite:///var/lib/medrecord.db"),
        ],
        AppConfig::load,
    )
    .unwrap();
    assert_eq!(config.env, Env::Production);
    assert_eq!(config.env.label(), "production");
}

#[test]
#[serial]
fn malformed_values_fail_fast() {
    for (var, value) in [("PORT", "not-a-port"), ("SCHEMA_SYNC", "rebuild")] {
        let result = run_with_env(&[(var, value)], AppConfig::load);
        assert!(
            matches!(result, Err(ConfigError::Invalid { .. })),
            "{var}={value} should be rejected"
        );
    }
}
