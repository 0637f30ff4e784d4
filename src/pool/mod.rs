//! Connection pooling.
//!
//! [`ConnectionPool`] hands out [`Lease`]s either from bb8 pools (one per
//! replication role) or, with pooling disabled, from a single lazily opened
//! shared session.

mod classify;
mod connection;
mod lifecycle;
mod manager;
mod replication;
mod single;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bb8::Pool;
use tracing::{debug, info};

pub use classify::classify_connect_error;
pub use connection::Lease;
pub use manager::{DriverManager, Tracked};
use manager::Closer;
pub use single::SingleConnection;

use crate::config::{ConnectTarget, ConnectionConfig, PoolConfig};
use crate::driver::Driver;
use crate::error::SqlLoomError;
use crate::types::{ConnectionRole, Dialect};
use connection::LeaseKind;
use lifecycle::Lifecycle;
use replication::Router;

/// Stand-in for "wait forever" in bb8, which always wants a timeout.
const UNBOUNDED_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Checkout counters and open session count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub checked_out: usize,
    pub acquired: u64,
    pub released: u64,
    pub connections: u32,
}

#[derive(Debug)]
enum PoolMode {
    Pooled {
        /// `None` once drained.
        router: Mutex<Option<Router>>,
        closer: Arc<Closer>,
    },
    Single(SingleConnection),
}

/// Source of connections for the execution queue.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    mode: Arc<PoolMode>,
    lifecycle: Arc<Lifecycle>,
    handle_disconnects: bool,
}

impl ConnectionPool {
    /// Build the pool described by `config`. No connection is opened until the
    /// first acquisition. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` for an unusable pool policy or a
    /// replication block without a write target.
    pub fn new(driver: Arc<dyn Driver>, config: &ConnectionConfig) -> Result<Self, SqlLoomError> {
        let dialect = config.dialect;
        let (write, reads) = match &config.replication {
            Some(replication) => (replication.write.clone(), replication.read.clone()),
            None => (config.target.clone(), Vec::new()),
        };

        let Some(policy) = &config.pool else {
            debug!(dialect = ?dialect, "using a single shared connection");
            return Ok(Self {
                mode: Arc::new(PoolMode::Single(SingleConnection::new(driver, write, dialect))),
                lifecycle: Arc::default(),
                handle_disconnects: false,
            });
        };

        check_policy(policy)?;
        let closer = Arc::new(Closer::default());
        let write_pool = build_pool(
            DriverManager::new(Arc::clone(&driver), vec![write], dialect, ConnectionRole::Write)?
                .with_closer(Arc::clone(&closer)),
            policy,
        );
        let read_pool = if reads.is_empty() {
            None
        } else {
            let manager = DriverManager::new(driver, reads, dialect, ConnectionRole::Read)?
                .with_closer(Arc::clone(&closer));
            Some(build_pool(manager, policy))
        };
        let router = Router::new(write_pool, read_pool);
        debug!(
            dialect = ?dialect,
            max = policy.max_connections,
            replicated = router.is_replicated(),
            "built connection pool"
        );
        Ok(Self {
            mode: Arc::new(PoolMode::Pooled {
                router: Mutex::new(Some(router)),
                closer,
            }),
            lifecycle: Arc::default(),
            handle_disconnects: policy.handle_disconnects,
        })
    }

    /// Single-connection pool against one target.
    #[must_use]
    pub fn single(driver: Arc<dyn Driver>, target: ConnectTarget, dialect: Dialect) -> Self {
        Self {
            mode: Arc::new(PoolMode::Single(SingleConnection::new(driver, target, dialect))),
            lifecycle: Arc::default(),
            handle_disconnects: false,
        }
    }

    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(*self.mode, PoolMode::Single(_))
    }

    #[must_use]
    pub fn handle_disconnects(&self) -> bool {
        self.handle_disconnects
    }

    /// Borrow a connection for `role`, waiting while the pool is exhausted.
    ///
    /// # Errors
    /// Returns `SqlLoomError::PoolClosed` after [`Self::drain`], a classified
    /// connect error when a new session cannot be opened, or
    /// `SqlLoomError::PoolTimeout` when an `acquire_timeout` elapses.
    pub async fn acquire(&self, role: ConnectionRole) -> Result<Lease, SqlLoomError> {
        if self.lifecycle.is_closed() {
            return Err(SqlLoomError::PoolClosed);
        }
        let kind = match &*self.mode {
            PoolMode::Pooled { router, .. } => {
                let pool = lock(router)
                    .as_ref()
                    .map(|router| router.route(role).clone())
                    .ok_or(SqlLoomError::PoolClosed)?;
                LeaseKind::Pooled(pool.get_owned().await?)
            }
            PoolMode::Single(slot) => LeaseKind::Shared {
                conn: slot.get().await?,
                slot: slot.clone(),
            },
        };
        // A drain that started while we waited wins.
        if self.lifecycle.is_closed() {
            return Err(SqlLoomError::PoolClosed);
        }
        Ok(Lease::new(kind, role, Arc::clone(&self.lifecycle)))
    }

    /// Return a connection for reuse.
    pub fn release(&self, lease: Lease) {
        lease.release();
    }

    /// Discard a connection; the pool opens a fresh one when needed.
    pub fn destroy(&self, lease: Lease) {
        debug!(role = ?lease.role(), "destroying connection");
        lease.destroy();
    }

    /// Stop accepting acquisitions, wait for every lease to come back, then
    /// close all sessions. Safe to call repeatedly and with jobs still running.
    pub async fn drain(&self) {
        if self.lifecycle.close() {
            info!(checked_out = self.lifecycle.checked_out(), "draining connection pool");
        }
        self.lifecycle.wait_drained().await;
        match &*self.mode {
            PoolMode::Pooled { router, closer } => {
                // Dropping the pools hands their idle sessions to the closer.
                let dropped = lock(router).take().is_some();
                closer.wait().await;
                if dropped {
                    info!("connection pool drained");
                }
            }
            PoolMode::Single(slot) => slot.close().await,
        }
    }

    /// Close the shared session of a single-connection pool while keeping the
    /// pool usable; the next acquisition reconnects. Does nothing when pooled
    /// or while any job still holds the session. Returns whether it closed.
    pub async fn close_idle_session(&self) -> bool {
        match &*self.mode {
            PoolMode::Single(slot) => slot.close_if_unused().await,
            PoolMode::Pooled { .. } => false,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Whether at least one backend session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.open_sessions() > 0
    }

    fn open_sessions(&self) -> u32 {
        match &*self.mode {
            PoolMode::Pooled { router, .. } => lock(router).as_ref().map_or(0, Router::connections),
            PoolMode::Single(slot) => u32::from(slot.is_connected()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            checked_out: self.lifecycle.checked_out(),
            acquired: self.lifecycle.acquired(),
            released: self.lifecycle.released(),
            connections: self.open_sessions(),
        }
    }
}

fn check_policy(policy: &PoolConfig) -> Result<(), SqlLoomError> {
    if policy.max_connections == 0 {
        return Err(SqlLoomError::config("max_connections must be at least 1"));
    }
    if policy.min_connections > policy.max_connections {
        return Err(SqlLoomError::config(
            "min_connections cannot exceed max_connections",
        ));
    }
    if policy.acquire_timeout.is_some_and(|t| t.is_zero()) {
        return Err(SqlLoomError::config("acquire_timeout must be positive"));
    }
    Ok(())
}

fn build_pool(manager: DriverManager, policy: &PoolConfig) -> Pool<DriverManager> {
    let idle = Some(policy.max_idle_time).filter(|d| !d.is_zero());
    let mut builder = Pool::builder()
        .max_size(policy.max_connections)
        .min_idle(Some(policy.min_connections).filter(|n| *n > 0))
        .idle_timeout(idle)
        .connection_timeout(policy.acquire_timeout.unwrap_or(UNBOUNDED_WAIT))
        .test_on_check_out(policy.validate)
        .retry_connection(false);
    if let Some(idle) = idle {
        builder = builder.reaper_rate(idle);
    }
    builder.build_unchecked(manager)
}
