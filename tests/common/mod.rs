#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use medrecord_server::{
    AppConfig, AppState, RouteTable,
    config::SchemaSync,
    create_router,
    models::Account,
    repository::{Repository, RepositoryState},
};
use std::{
    collections::HashMap,
    fs,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const INDEX_HTML: &str = "<!doctype html><title>MedRecord</title><div id=\"root\"></div>";
pub const APP_JS: &str = "console.log('medrecord');";
pub const REPORT_PDF: &[u8] = b"%PDF-1.4 fake report";

// --- MOCK REPOSITORY IMPLEMENTATION ---

/// In-memory `Repository` with switchable failures and call counters.
#[derive(Default)]
pub struct MockRepository {
    pub accounts: Mutex<HashMap<String, Account>>,
    pub fail_ping: bool,
    pub fail_sync: bool,
    pub fail_queries: bool,
    pub ping_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails, as if the database were unreachable.
    pub fn unreachable() -> Self {
        Self {
            fail_ping: true,
            fail_sync: true,
            fail_queries: true,
            ..Self::default()
        }
    }

    pub fn with_account(self, account: Account) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.id.clone(), account);
        self
    }

    pub fn account(&self, id: &str) -> Option<Account> {
        self.accounts.lock().unwrap().get(id).cloned()
    }
}

fn simulated(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("simulated {what} failure"))
}

#[async_trait]
impl Repository for MockRepository {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ping {
            return Err(simulated("connect"));
        }
        Ok(())
    }

    async fn sync_schema(&self, _strategy: SchemaSync) -> Result<(), sqlx::Error> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sync {
            return Err(simulated("schema"));
        }
        Ok(())
    }

    async fn find_account(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        if self.fail_queries {
            return Err(simulated("query"));
        }
        Ok(self.account(id))
    }

    async fn create_account(&self, account: &Account) -> Result<bool, sqlx::Error> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries {
            return Err(simulated("insert"));
        }
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&account.id) {
            return Ok(false);
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(true)
    }
}

pub fn sample_account(id: &str) -> Account {
    Account::new(
        id,
        "Dr. Sample",
        "01000000000",
        "sample@medrecord.com",
        "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA",
        ["doctor", "patient"],
        "doctor",
    )
    .unwrap()
}

// --- SITE FIXTURE ---

/// A temporary static root and uploads directory, plus a config pointing at them.
pub struct TestSite {
    pub dir: TempDir,
    pub config: AppConfig,
}

pub fn test_site() -> TestSite {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("public");
    let uploads_dir = dir.path().join("uploads");
    fs::create_dir_all(static_dir.join("assets")).unwrap();
    fs::create_dir_all(&uploads_dir).unwrap();

    fs::write(static_dir.join("index.html"), INDEX_HTML).unwrap();
    fs::write(static_dir.join("assets").join("app.js"), APP_JS).unwrap();
    fs::write(uploads_dir.join("report.pdf"), REPORT_PDF).unwrap();

    let config = AppConfig {
        spa_index: static_dir.join("index.html"),
        static_dir,
        uploads_dir,
        ..AppConfig::default()
    };
    TestSite { dir, config }
}

pub fn app(repo: impl Repository + 'static, table: RouteTable, config: AppConfig) -> Router {
    let state = AppState {
        repo: Arc::new(repo) as RepositoryState,
        config,
    };
    create_router(state, table)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
