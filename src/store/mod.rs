pub mod memory;
mod sql;

use crate::connection::config::StoreConfig;
use crate::core::{Result, Value};
use crate::result::QueryResult;
use async_trait::async_trait;

/// Which side of the dual-store setup a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    Primary,
    Secondary,
}

impl std::fmt::Display for StoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreRole::Primary => write!(f, "primary"),
            StoreRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// An open session to one backing store.
///
/// Statement text is store-native SQL; the resilience layer never interprets
/// it beyond read/write classification. Implementations exist per engine;
/// the crate ships [`memory::MemoryStore`] as the embedded local engine.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Cheap liveness round-trip.
    async fn ping(&self) -> Result<()>;

    /// Run a read statement and return its rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Run a write statement; returns the generated row id for inserts.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Option<i64>>;

    /// Run one write statement with many parameter sets as a single
    /// submission.
    async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> Result<()>;
}

/// Opens [`Store`] sessions from configuration.
///
/// The seam that lets tests inject unreachable or flaky stores and lets
/// deployments pair different engines for primary and secondary.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Store: Store;

    async fn open(&self, role: StoreRole, config: &StoreConfig) -> Result<Self::Store>;
}

/// Read/write classification of a statement, by leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" | "SHOW" | "EXPLAIN" | "WITH" | "PRAGMA" | "DESCRIBE" => Self::Read,
            _ => Self::Write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reads_and_writes() {
        assert_eq!(
            StatementKind::classify("  select * from invoices"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("SHOW TABLES"),
            StatementKind::Read
        );
        assert_eq!(
            StatementKind::classify("INSERT INTO invoices VALUES (?)"),
            StatementKind::Write
        );
        assert_eq!(
            StatementKind::classify("update invoices set number = ?"),
            StatementKind::Write
        );
        assert_eq!(StatementKind::classify(""), StatementKind::Write);
    }
}
