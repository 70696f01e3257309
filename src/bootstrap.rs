//! Startup sequence: connect, reconcile schema, seed baseline accounts, then serve.
//!
//! Each step must finish before the next starts. A failure in any step stops the sequence
//! and is reported with the stage that was being left, so `main` can log it and exit.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::{
    config::SchemaSync,
    models::{Account, AccountError},
    repository::RepositoryState,
};

/// BootstrapStage
///
/// Where the process is in its startup sequence. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStage {
    Disconnected,
    Connected,
    SchemaSynced,
    Seeded,
    Serving,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("storage connectivity check failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("schema sync ({strategy}) failed: {source}")]
    SchemaSync {
        strategy: SchemaSync,
        #[source]
        source: sqlx::Error,
    },

    #[error("seeding account {id} failed: {source}")]
    Seed {
        id: String,
        #[source]
        source: SeedError,
    },

    #[error("cannot start serving from stage {0:?}; bootstrap has not completed")]
    NotSeeded(BootstrapStage),
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("credential hashing failed: {0}")]
    Hash(String),
}

impl BootstrapError {
    /// The stage the sequence was trying to leave when it failed.
    pub fn stage(&self) -> BootstrapStage {
        match self {
            BootstrapError::Connect(_) => BootstrapStage::Disconnected,
            BootstrapError::SchemaSync { .. } => BootstrapStage::Connected,
            BootstrapError::Seed { .. } => BootstrapStage::SchemaSynced,
            BootstrapError::NotSeeded(stage) => *stage,
        }
    }
}

/// SeedAccount
///
/// Static definition of a baseline account. The secret is hashed only when the account
/// actually has to be created.
#[derive(Debug, Clone, Copy)]
pub struct SeedAccount {
    pub id: &'static str,
    pub name: &'static str,
    pub phone: &'static str,
    pub email: &'static str,
    pub secret: &'static str,
    pub roles: &'static [&'static str],
    pub active_role: &'static str,
}

pub const SEED_ADMIN: SeedAccount = SeedAccount {
    id: "admin001",
    name: "Admin User",
    phone: "0000000000",
    email: "admin@medrecord.com",
    secret: "admin123",
    roles: &["admin"],
    active_role: "admin",
};

pub const SEED_PATIENT: SeedAccount = SeedAccount {
    id: "12345678901234",
    name: "Test Patient",
    phone: "01012345678",
    email: "patient@test.com",
    secret: "test123",
    roles: &["patient"],
    active_role: "patient",
};

pub const SEED_ACCOUNTS: [SeedAccount; 2] = [SEED_ADMIN, SEED_PATIENT];

impl SeedAccount {
    fn to_account(&self) -> Result<Account, SeedError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(self.secret.as_bytes(), &salt)
            .map_err(|e| SeedError::Hash(e.to_string()))?
            .to_string();

        Ok(Account::new(
            self.id,
            self.name,
            self.phone,
            self.email,
            hash,
            self.roles.iter().copied(),
            self.active_role,
        )?)
    }
}

/// Outcome of the seeding step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Bootstrapper
///
/// Drives the startup state machine against a repository. `run` performs connect, schema
/// sync and seeding; `mark_serving` is called by `main` once the listener is bound.
pub struct Bootstrapper {
    repo: RepositoryState,
    strategy: SchemaSync,
    seeds: Vec<SeedAccount>,
    stage: BootstrapStage,
}

impl Bootstrapper {
    pub fn new(repo: RepositoryState, strategy: SchemaSync) -> Self {
        Self {
            repo,
            strategy,
            seeds: SEED_ACCOUNTS.to_vec(),
            stage: BootstrapStage::Disconnected,
        }
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    pub async fn run(&mut self) -> Result<SeedReport, BootstrapError> {
        self.connect().await?;
        self.sync_schema().await?;
        self.seed().await
    }

    async fn connect(&mut self) -> Result<(), BootstrapError> {
        self.repo.ping().await.map_err(BootstrapError::Connect)?;
        self.advance(BootstrapStage::Connected);
        Ok(())
    }

    async fn sync_schema(&mut self) -> Result<(), BootstrapError> {
        let strategy = self.strategy;
        self.repo
            .sync_schema(strategy)
            .await
            .map_err(|source| BootstrapError::SchemaSync { strategy, source })?;
        self.advance(BootstrapStage::SchemaSynced);
        Ok(())
    }

    /// seed
    ///
    /// Look up each seed by id and create it only when absent. Existing accounts are
    /// reported and left exactly as they are, so re-running is a no-op.
    async fn seed(&mut self) -> Result<SeedReport, BootstrapError> {
        let mut report = SeedReport::default();

        for seed in &self.seeds {
            let fail = |source: SeedError| BootstrapError::Seed {
                id: seed.id.to_string(),
                source,
            };

            let found = self
                .repo
                .find_account(seed.id)
                .await
                .map_err(|e| fail(e.into()))?;
            if found.is_some() {
                tracing::debug!(id = seed.id, "[SEED] account already present");
                report.existing.push(seed.id.to_string());
                continue;
            }

            let account = seed.to_account().map_err(fail)?;
            let inserted = self
                .repo
                .create_account(&account)
                .await
                .map_err(|e| fail(e.into()))?;
            if inserted {
                tracing::info!(id = seed.id, role = seed.active_role, "[SEED] created account");
                report.created.push(seed.id.to_string());
            } else {
                report.existing.push(seed.id.to_string());
            }
        }

        self.advance(BootstrapStage::Seeded);
        Ok(report)
    }

    /// Enters `Serving`. Refused unless seeding has completed.
    pub fn mark_serving(&mut self) -> Result<(), BootstrapError> {
        if self.stage != BootstrapStage::Seeded {
            return Err(BootstrapError::NotSeeded(self.stage));
        }
        self.advance(BootstrapStage::Serving);
        Ok(())
    }

    fn advance(&mut self, next: BootstrapStage) {
        tracing::debug!(from = ?self.stage, to = ?next, "bootstrap stage");
        self.stage = next;
    }
}
