use crate::connection::config::ClientConfig;
use crate::core::{DbError, Result};
use crate::store::{Connector, Store, StoreRole};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Process-wide health view of the two stores.
///
/// `offline` is true only after a round-trip against the primary has failed
/// since it was last confirmed healthy. `last_attempt` drives the reconnect
/// throttle while both handles are gone.
#[derive(Debug)]
pub(crate) struct ConnectivityState<S> {
    pub primary: Option<Arc<S>>,
    pub secondary: Option<Arc<S>>,
    pub offline: bool,
    pub last_attempt: Option<Instant>,
}

impl<S> Default for ConnectivityState<S> {
    fn default() -> Self {
        Self {
            primary: None,
            secondary: None,
            offline: false,
            last_attempt: None,
        }
    }
}

/// Owns the lifecycle of the primary and secondary store handles.
///
/// Clones share one `ConnectivityState`: opening a remote connection has real
/// cost, and every request handler in the process should observe the same
/// health view. Handles never leave this type except as `Arc` clones handed
/// to the executor.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    config: ClientConfig,
    state: Arc<Mutex<ConnectivityState<C::Store>>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
            state: Arc::new(Mutex::new(ConnectivityState::default())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Attempt to (re)open both handles; true iff at least one is live
    /// afterward.
    ///
    /// Failure of one side never blocks the other and nothing is raised to
    /// the caller. While both handles are absent, repeated attempts are
    /// suppressed until `reconnect_interval` has elapsed, unless `force` is
    /// set. The state lock is held for the duration, so concurrent reconnects
    /// collapse into a single network attempt.
    pub async fn connect(&self, force: bool) -> bool {
        let mut state = self.state.lock().await;

        let exhausted = state.primary.is_none() && state.secondary.is_none();
        if exhausted && !force {
            if let Some(last) = state.last_attempt {
                if last.elapsed() < self.config.reconnect_interval {
                    debug!("reconnect suppressed by throttle");
                    return state.primary.is_some() || state.secondary.is_some();
                }
            }
        }
        state.last_attempt = Some(Instant::now());

        match self.open(StoreRole::Primary).await {
            Ok(store) => {
                state.primary = Some(Arc::new(store));
                state.offline = false;
            }
            Err(err) => {
                warn!(error = %err, "primary store unreachable");
                state.primary = None;
                state.offline = true;
            }
        }

        if let Some(secondary_config) = &self.config.secondary {
            match self.open_with(StoreRole::Secondary, secondary_config).await {
                Ok(store) => state.secondary = Some(Arc::new(store)),
                Err(err) => {
                    warn!(error = %err, "secondary store unreachable");
                    state.secondary = None;
                }
            }
        }

        state.primary.is_some() || state.secondary.is_some()
    }

    /// Release both handles and reset the shared state. Idempotent.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        *state = ConnectivityState::default();
    }

    /// Re-test the primary handle without a full reconnect.
    ///
    /// Flips `offline` on the outcome and leaves the secondary untouched.
    /// Deliberately unthrottled: confirming recovery quickly is valuable.
    pub async fn probe(&self) -> bool {
        let handle = {
            let state = self.state.lock().await;
            state.primary.clone()
        };

        let healthy = match handle {
            Some(primary) => self.ping(&primary).await,
            None => false,
        };

        let mut state = self.state.lock().await;
        state.offline = !healthy;
        healthy
    }

    pub async fn is_offline(&self) -> bool {
        self.state.lock().await.offline
    }

    /// Current handle clones for the executor; never exposed further.
    pub(crate) async fn handles(&self) -> (Option<Arc<C::Store>>, Option<Arc<C::Store>>) {
        let state = self.state.lock().await;
        (state.primary.clone(), state.secondary.clone())
    }

    /// Record the result of a primary round-trip observed by the executor.
    pub(crate) async fn mark_primary(&self, healthy: bool) {
        let mut state = self.state.lock().await;
        state.offline = !healthy;
    }

    pub(crate) async fn ping(&self, store: &C::Store) -> bool {
        let attempt = tokio::time::timeout(self.config.operation_timeout, store.ping());
        matches!(attempt.await, Ok(Ok(())))
    }

    async fn open(&self, role: StoreRole) -> Result<C::Store> {
        self.open_with(role, &self.config.primary).await
    }

    async fn open_with(
        &self,
        role: StoreRole,
        store_config: &crate::connection::config::StoreConfig,
    ) -> Result<C::Store> {
        let attempt = self.connector.open(role, store_config);
        tokio::time::timeout(self.config.operation_timeout, attempt)
            .await
            .map_err(|_| DbError::Timeout(self.config.operation_timeout))?
    }
}
