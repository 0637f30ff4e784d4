use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bb8::ManageConnection;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::classify::classify_connect_error;
use crate::config::ConnectTarget;
use crate::driver::{BoxedConnection, Driver, DriverError, DriverOutput};
use crate::error::SqlLoomError;
use crate::executor::ExecuteOptions;
use crate::types::{ConnectionRole, Dialect};

/// Closes sessions bb8 lets go of (broken, reaped, failed validation or left
/// in a dropped pool) and lets a drain wait until those closes finish.
#[derive(Debug, Default)]
pub(crate) struct Closer {
    pending: AtomicUsize,
    settled: Notify,
}

impl Closer {
    fn close(self: &Arc<Self>, mut conn: BoxedConnection, role: ConnectionRole) {
        let Ok(handle) = Handle::try_current() else {
            warn!(role = ?role, "no runtime left to close connection on");
            return;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        let closer = Arc::clone(self);
        handle.spawn(async move {
            match conn.close().await {
                Ok(()) => debug!(role = ?role, "closed connection"),
                Err(err) => warn!(role = ?role, error = %err, "closing connection failed"),
            }
            if closer.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                closer.settled.notify_waiters();
            }
        });
    }

    /// Resolve once every close started so far has finished.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.settled.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// A driver session plus the flag that tells bb8 to discard it on return.
///
/// Dropping it closes the session through the driver.
pub struct Tracked {
    conn: Option<BoxedConnection>,
    pub(crate) broken: bool,
    role: ConnectionRole,
    closer: Arc<Closer>,
}

impl Tracked {
    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        options: &ExecuteOptions,
    ) -> Result<DriverOutput, DriverError> {
        match &mut self.conn {
            Some(conn) => conn.execute(sql, options).await,
            None => Err(DriverError::new("connection is closed")),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.closer.close(conn, self.role);
        }
    }
}

/// bb8 manager opening driver sessions, round-robin across its targets.
pub struct DriverManager {
    driver: Arc<dyn Driver>,
    targets: Vec<ConnectTarget>,
    next: AtomicUsize,
    dialect: Dialect,
    role: ConnectionRole,
    closer: Arc<Closer>,
}

impl fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverManager")
            .field("targets", &self.targets.len())
            .field("dialect", &self.dialect)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl DriverManager {
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` when `targets` is empty.
    pub fn new(
        driver: Arc<dyn Driver>,
        targets: Vec<ConnectTarget>,
        dialect: Dialect,
        role: ConnectionRole,
    ) -> Result<Self, SqlLoomError> {
        if targets.is_empty() {
            return Err(SqlLoomError::config(format!(
                "no {role:?} connection targets configured"
            )));
        }
        Ok(Self {
            driver,
            targets,
            next: AtomicUsize::new(0),
            dialect,
            role,
            closer: Arc::default(),
        })
    }

    /// Share `closer` with other managers so one drain waits for all of them.
    pub(crate) fn with_closer(mut self, closer: Arc<Closer>) -> Self {
        self.closer = closer;
        self
    }

    fn next_target(&self) -> ConnectTarget {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.targets.len();
        self.targets[index].clone()
    }
}

impl ManageConnection for DriverManager {
    type Connection = Tracked;
    type Error = SqlLoomError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let driver = Arc::clone(&self.driver);
        let target = self.next_target();
        let dialect = self.dialect;
        let role = self.role;
        let closer = Arc::clone(&self.closer);
        async move {
            let conn = driver
                .connect(&target)
                .await
                .map_err(|err| classify_connect_error(dialect, err))?;
            debug!(role = ?role, host = %target.host, "opened connection");
            Ok(Tracked {
                conn: Some(conn),
                broken: false,
                role,
                closer,
            })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let role = conn.role;
            let Some(session) = conn.conn.as_mut() else {
                return Err(SqlLoomError::ConnectionError("connection is closed".to_string()));
            };
            session.ping().await.map_err(|err| {
                debug!(role = ?role, error = %err, "connection failed validation");
                SqlLoomError::ConnectionError(err.message)
            })
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.broken
    }
}
