//! The backend capability the pool and execution queue drive.
//!
//! The crate does not speak any wire protocol itself. A [`Driver`] opens
//! sessions against a [`ConnectTarget`]; each [`DriverConnection`] executes
//! already-compiled SQL text and reports rows back as [`SqlValue`]s.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConnectTarget;
use crate::executor::ExecuteOptions;
use crate::types::SqlValue;

/// Failure reported by a driver, with the backend's error code when it has one
/// (`ECONNREFUSED`, `ORA-00942`, `PROTOCOL_CONNECTION_LOST`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Raw statement output: column names, positional row values and the DML count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub rows_affected: usize,
}

/// One live backend session.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run one statement.
    ///
    /// # Errors
    /// Returns the backend's rejection of the statement.
    async fn execute(
        &mut self,
        sql: &str,
        options: &ExecuteOptions,
    ) -> Result<DriverOutput, DriverError>;

    /// Cheap liveness probe used before a cached connection is handed out.
    ///
    /// # Errors
    /// Returns an error when the session is no longer usable.
    async fn ping(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// End the session.
    ///
    /// # Errors
    /// Returns an error when the backend fails to close cleanly.
    async fn close(&mut self) -> Result<(), DriverError>;
}

pub type BoxedConnection = Box<dyn DriverConnection>;

/// Opens sessions.
#[async_trait]
pub trait Driver: Send + Sync {
    /// # Errors
    /// Returns the raw connect failure; classification happens in the pool.
    async fn connect(&self, target: &ConnectTarget) -> Result<BoxedConnection, DriverError>;
}
