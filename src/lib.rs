// ============================================================================
// faturadb — resilient dual-store persistence for invoicing
// ============================================================================

pub mod connection;
pub mod core;
pub mod documents;
pub mod executor;
pub mod numbering;
pub mod result;
pub mod store;

// Re-export main types for convenience
pub use connection::{ClientConfig, ConnectionManager, StoreConfig};
pub use self::core::{DbError, Result, Row, Value};
pub use documents::{Document, DocumentKind};
pub use executor::{BatchReceipt, ExecOutcome, MirrorWrite, QueryExecutor, WriteReceipt};
pub use numbering::{ConflictResolver, NextNumber, SequenceAllocator};
pub use result::QueryResult;
pub use store::memory::{MemoryConnector, MemoryStore};
pub use store::{Connector, StatementKind, Store, StoreRole};

// ============================================================================
// High-level client API
// ============================================================================

/// Dual-store persistence client.
///
/// Talks to an authoritative primary store and an optional local fallback:
/// reads and writes go to the primary while it answers, writes are mirrored
/// to the secondary best-effort, and when the primary drops off the network
/// the client degrades to the secondary without surfacing errors. Document
/// numbering and collision handling sit on top of the same statement path.
///
/// Cloning a `Client` shares its connectivity state, so every request
/// handler in a process observes the same health view.
///
/// # Examples
///
/// ```
/// use faturadb::{Client, ClientConfig, MemoryConnector, StoreConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = ClientConfig::new(StoreConfig::new("fatura"))
///     .secondary(StoreConfig::new("fatura_local"));
/// let client = Client::new(MemoryConnector::new(), config);
/// assert!(client.connect(false).await);
///
/// client
///     .execute(
///         "CREATE TABLE invoices (id INTEGER, number TEXT, date TEXT, saved_at TEXT, pdf_path TEXT)",
///         &[],
///     )
///     .await;
/// let next = client
///     .allocate_next_number(faturadb::DocumentKind::Invoice, 2026)
///     .await;
/// assert_eq!(next.sequence, 1);
/// # }
/// ```
pub struct Client<C: Connector> {
    executor: QueryExecutor<C>,
}

impl<C: Connector> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<C: Connector> Client<C> {
    /// Build a client; no connection is attempted until [`Client::connect`]
    /// or the first statement.
    pub fn new(connector: C, config: ClientConfig) -> Self {
        Self {
            executor: QueryExecutor::new(ConnectionManager::new(connector, config)),
        }
    }

    /// Open the primary and secondary handles; true iff at least one is
    /// live. Throttled while both stores are down unless `force` is set.
    pub async fn connect(&self, force: bool) -> bool {
        self.executor.manager().connect(force).await
    }

    /// Drop both handles and reset shared connectivity state.
    pub async fn disconnect(&self) {
        self.executor.manager().disconnect().await
    }

    /// Re-test the primary without a full reconnect.
    pub async fn probe(&self) -> bool {
        self.executor.manager().probe().await
    }

    /// Whether the primary was last found unreachable.
    pub async fn is_offline(&self) -> bool {
        self.executor.manager().is_offline().await
    }

    /// Execute a statement; reads yield rows, writes a receipt. Never errors:
    /// with no reachable store a read is empty and a write carries no id.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> ExecOutcome {
        self.executor.execute(sql, params).await
    }

    /// Run a read statement.
    pub async fn query(&self, sql: &str, params: &[Value]) -> QueryResult {
        self.executor.query(sql, params).await
    }

    /// Run one write statement with many parameter sets as a single batch
    /// per store.
    pub async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> BatchReceipt {
        self.executor.execute_many(sql, batches).await
    }

    /// Propose the next document number for `kind` in calendar year `year`.
    pub async fn allocate_next_number(&self, kind: DocumentKind, year: i32) -> NextNumber {
        SequenceAllocator::new(&self.executor)
            .next_in_period(kind, year)
            .await
    }

    /// Persist a document, resolving or rejecting a number collision.
    pub async fn resolve_and_save(&self, document: Document) -> Result<Document> {
        ConflictResolver::new(&self.executor)
            .resolve_and_save(document)
            .await
    }

    /// Direct access to the statement executor.
    pub fn executor(&self) -> &QueryExecutor<C> {
        &self.executor
    }
}
