use std::sync::Arc;

use bb8::PooledConnection;

use super::lifecycle::Lifecycle;
use super::manager::DriverManager;
use super::single::{SharedConnection, SingleConnection};
use crate::driver::{DriverError, DriverOutput};
use crate::executor::ExecuteOptions;
use crate::types::ConnectionRole;

pub(crate) enum LeaseKind {
    Pooled(PooledConnection<'static, DriverManager>),
    Shared {
        conn: SharedConnection,
        slot: SingleConnection,
    },
}

/// A connection borrowed for one job.
///
/// Dropping the lease returns the connection; [`Lease::destroy`] discards it
/// instead. Either way the checkout is recorded as released exactly once.
pub struct Lease {
    kind: LeaseKind,
    role: ConnectionRole,
    lifecycle: Arc<Lifecycle>,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Lease {
    pub(crate) fn new(kind: LeaseKind, role: ConnectionRole, lifecycle: Arc<Lifecycle>) -> Self {
        lifecycle.checkout();
        Self {
            kind,
            role,
            lifecycle,
        }
    }

    #[must_use]
    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Run one statement on the borrowed session.
    ///
    /// # Errors
    /// Returns the driver's rejection of the statement.
    pub async fn execute(
        &mut self,
        sql: &str,
        options: &ExecuteOptions,
    ) -> Result<DriverOutput, DriverError> {
        match &mut self.kind {
            LeaseKind::Pooled(conn) => conn.execute(sql, options).await,
            LeaseKind::Shared { conn, .. } => conn.lock().await.execute(sql, options).await,
        }
    }

    /// Give the connection back for reuse.
    pub fn release(self) {
        drop(self);
    }

    /// Discard the connection rather than returning it.
    pub fn destroy(mut self) {
        match &mut self.kind {
            LeaseKind::Pooled(conn) => conn.broken = true,
            LeaseKind::Shared { conn, slot } => slot.forget(conn),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.lifecycle.checkin();
    }
}
