//! Shared test doubles: stores with switchable outages and a connector that
//! counts network attempts.

#![allow(dead_code)]

use async_trait::async_trait;
use faturadb::{
    Client, ClientConfig, Connector, DbError, MemoryStore, QueryResult, Result, Store,
    StoreConfig, StoreRole, Value,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const INVOICES_SCHEMA: &str =
    "CREATE TABLE invoices (id INTEGER, number TEXT, date TEXT, saved_at TEXT, pdf_path TEXT)";
pub const OFFERS_SCHEMA: &str =
    "CREATE TABLE offers (id INTEGER, number TEXT, date TEXT, saved_at TEXT)";

/// A memory store whose network can be cut at any moment, or left hanging
/// without ever answering.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    down: Arc<AtomicBool>,
    hung: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Subsequent operations never resolve, like a socket that accepted the
    /// request and went silent.
    pub fn set_hung(&self, hung: bool) {
        self.hung.store(hung, Ordering::SeqCst);
    }

    async fn check(&self) -> Result<()> {
        if self.hung.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.down.load(Ordering::SeqCst) {
            Err(DbError::Unavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn ping(&self) -> Result<()> {
        self.check().await?;
        self.inner.ping().await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.check().await?;
        self.inner.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Option<i64>> {
        self.check().await?;
        self.inner.execute(sql, params).await
    }

    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> Result<()> {
        self.check().await?;
        self.inner.execute_many(sql, batches).await
    }
}

/// Hands out one flaky store per role and counts open attempts so tests can
/// observe the reconnect throttle.
#[derive(Clone, Default)]
pub struct FlakyConnector {
    pub primary: FlakyStore,
    pub secondary: FlakyStore,
    primary_unreachable: Arc<AtomicBool>,
    secondary_unreachable: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_primary_unreachable(&self, unreachable: bool) {
        self.primary_unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_secondary_unreachable(&self, unreachable: bool) {
        self.secondary_unreachable
            .store(unreachable, Ordering::SeqCst);
    }

    pub fn open_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FlakyConnector {
    type Store = FlakyStore;

    async fn open(&self, role: StoreRole, _config: &StoreConfig) -> Result<Self::Store> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let (store, unreachable) = match role {
            StoreRole::Primary => (&self.primary, &self.primary_unreachable),
            StoreRole::Secondary => (&self.secondary, &self.secondary_unreachable),
        };
        if unreachable.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(format!("{role} refused connection")));
        }
        Ok(store.clone())
    }
}

pub fn dual_config() -> ClientConfig {
    ClientConfig::new(StoreConfig::new("primary"))
        .secondary(StoreConfig::new("secondary"))
        .reconnect_interval(Duration::from_millis(100))
        .operation_timeout(Duration::from_secs(1))
}

pub fn primary_only_config() -> ClientConfig {
    ClientConfig::new(StoreConfig::new("primary"))
        .reconnect_interval(Duration::from_millis(100))
        .operation_timeout(Duration::from_secs(1))
}

/// Connected client over both flaky stores, with document tables created on
/// each.
pub async fn connected_client() -> (Client<FlakyConnector>, FlakyConnector) {
    let connector = FlakyConnector::new();
    let client = Client::new(connector.clone(), dual_config());
    assert!(client.connect(false).await);

    for schema in [INVOICES_SCHEMA, OFFERS_SCHEMA] {
        let receipt = client.executor().write(schema, &[]).await;
        assert_eq!(receipt.last_insert_id, None);
    }
    (client, connector)
}
