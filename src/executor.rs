//! Statement execution with primary-then-secondary fallback and best-effort
//! mirroring of successful primary writes.

use crate::connection::ConnectionManager;
use crate::core::Value;
use crate::result::QueryResult;
use crate::store::{Connector, StatementKind, Store};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of the best-effort secondary mirror of a primary write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorWrite {
    /// The secondary accepted the mirrored statement.
    Applied,
    /// No secondary was available to mirror to.
    Skipped,
    /// The secondary rejected the statement; logged, never surfaced.
    Failed,
}

/// Receipt for a single write.
///
/// `last_insert_id` is `None` either when the statement generates no id or
/// when no store was reachable; callers distinguish the two through
/// [`ConnectionManager::is_offline`], not through the receipt.
#[derive(Debug, Clone, Copy)]
pub struct WriteReceipt {
    pub last_insert_id: Option<i64>,
    pub mirror: MirrorWrite,
}

/// Receipt for a batched write.
#[derive(Debug, Clone, Copy)]
pub struct BatchReceipt {
    pub applied: bool,
    pub mirror: MirrorWrite,
}

/// Result of [`QueryExecutor::execute`].
#[derive(Debug)]
pub enum ExecOutcome {
    Rows(QueryResult),
    Write(WriteReceipt),
}

impl ExecOutcome {
    pub fn into_rows(self) -> QueryResult {
        match self {
            ExecOutcome::Rows(rows) => rows,
            ExecOutcome::Write(_) => QueryResult::empty(),
        }
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        match self {
            ExecOutcome::Write(receipt) => receipt.last_insert_id,
            ExecOutcome::Rows(_) => None,
        }
    }
}

/// Runs statements against the best available store.
///
/// Reads and writes go to the primary when it answers a probe; writes are
/// then mirrored to the secondary. When the primary is down, both degrade to
/// the secondary. When neither store answers, reads yield an empty result and
/// writes a null id; nothing here ever raises to the caller.
pub struct QueryExecutor<C: Connector> {
    manager: ConnectionManager<C>,
}

impl<C: Connector> Clone for QueryExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<C: Connector> QueryExecutor<C> {
    pub fn new(manager: ConnectionManager<C>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Execute one statement, classifying it as read or write by its leading
    /// keyword.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> ExecOutcome {
        match StatementKind::classify(sql) {
            StatementKind::Read => ExecOutcome::Rows(self.query(sql, params).await),
            StatementKind::Write => ExecOutcome::Write(self.write(sql, params).await),
        }
    }

    /// Run a read; empty result when no store is reachable.
    pub async fn query(&self, sql: &str, params: &[Value]) -> QueryResult {
        let (primary, secondary) = self.live_handles().await;

        if let Some(primary) = primary {
            if self.manager.ping(&primary).await {
                match self.attempt(primary.query(sql, params)).await {
                    Some(Ok(rows)) => {
                        self.manager.mark_primary(true).await;
                        return rows;
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "primary read failed, falling back");
                    }
                    None => warn!("primary read timed out, falling back"),
                }
            }
            self.manager.mark_primary(false).await;
        }

        if let Some(secondary) = secondary {
            match self.attempt(secondary.query(sql, params)).await {
                Some(Ok(rows)) => return rows,
                Some(Err(err)) => warn!(error = %err, "secondary read failed"),
                None => warn!("secondary read timed out"),
            }
        }

        QueryResult::empty()
    }

    /// Run a write; primary commit happens-before the secondary mirror.
    pub async fn write(&self, sql: &str, params: &[Value]) -> WriteReceipt {
        let (primary, secondary) = self.live_handles().await;

        if let Some(primary) = primary {
            if self.manager.ping(&primary).await {
                match self.attempt(primary.execute(sql, params)).await {
                    Some(Ok(last_insert_id)) => {
                        self.manager.mark_primary(true).await;
                        let mirror = match &secondary {
                            Some(secondary) => {
                                let batch = [params.to_vec()];
                                self.mirror(secondary, sql, &batch).await
                            }
                            None => MirrorWrite::Skipped,
                        };
                        return WriteReceipt {
                            last_insert_id,
                            mirror,
                        };
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "primary write failed, falling back");
                    }
                    None => warn!("primary write timed out, falling back"),
                }
            }
            self.manager.mark_primary(false).await;
        }

        if let Some(secondary) = secondary {
            match self.attempt(secondary.execute(sql, params)).await {
                Some(Ok(last_insert_id)) => {
                    return WriteReceipt {
                        last_insert_id,
                        mirror: MirrorWrite::Skipped,
                    }
                }
                Some(Err(err)) => warn!(error = %err, "secondary write failed"),
                None => warn!("secondary write timed out"),
            }
        }

        WriteReceipt {
            last_insert_id: None,
            mirror: MirrorWrite::Skipped,
        }
    }

    /// Run one statement with many parameter sets as a single submission per
    /// store, under the same fallback and mirror policy.
    pub async fn execute_many(&self, sql: &str, batches: &[Vec<Value>]) -> BatchReceipt {
        let (primary, secondary) = self.live_handles().await;

        if let Some(primary) = primary {
            if self.manager.ping(&primary).await {
                match self.attempt(primary.execute_many(sql, batches)).await {
                    Some(Ok(())) => {
                        self.manager.mark_primary(true).await;
                        let mirror = match &secondary {
                            Some(secondary) => self.mirror(secondary, sql, batches).await,
                            None => MirrorWrite::Skipped,
                        };
                        return BatchReceipt {
                            applied: true,
                            mirror,
                        };
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "primary batch failed, falling back");
                    }
                    None => warn!("primary batch timed out, falling back"),
                }
            }
            self.manager.mark_primary(false).await;
        }

        if let Some(secondary) = secondary {
            match self.attempt(secondary.execute_many(sql, batches)).await {
                Some(Ok(())) => {
                    return BatchReceipt {
                        applied: true,
                        mirror: MirrorWrite::Skipped,
                    }
                }
                Some(Err(err)) => warn!(error = %err, "secondary batch failed"),
                None => warn!("secondary batch timed out"),
            }
        }

        BatchReceipt {
            applied: false,
            mirror: MirrorWrite::Skipped,
        }
    }

    async fn mirror(
        &self,
        secondary: &Arc<C::Store>,
        sql: &str,
        batches: &[Vec<Value>],
    ) -> MirrorWrite {
        match self.attempt(secondary.execute_many(sql, batches)).await {
            Some(Ok(())) => MirrorWrite::Applied,
            Some(Err(err)) => {
                warn!(error = %err, "mirror write to secondary failed");
                MirrorWrite::Failed
            }
            None => {
                warn!("mirror write to secondary timed out");
                MirrorWrite::Failed
            }
        }
    }

    /// Handle clones, after a lazy throttled reconnect when both are gone.
    async fn live_handles(&self) -> (Option<Arc<C::Store>>, Option<Arc<C::Store>>) {
        let (primary, secondary) = self.manager.handles().await;
        if primary.is_none() && secondary.is_none() {
            debug!("no live handles, attempting throttled reconnect");
            self.manager.connect(false).await;
            return self.manager.handles().await;
        }
        (primary, secondary)
    }

    async fn attempt<T>(
        &self,
        fut: impl std::future::Future<Output = crate::core::Result<T>>,
    ) -> Option<crate::core::Result<T>> {
        tokio::time::timeout(self.manager.config().operation_timeout, fut)
            .await
            .ok()
    }
}
