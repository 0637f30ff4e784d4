use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum SqlLoomError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Connectivity error: {0}")]
    ConnectivityError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {message} (sql: {sql})")]
    ExecutionError {
        sql: String,
        message: String,
        code: Option<String>,
    },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Timed out waiting for a pooled connection")]
    PoolTimeout,

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlLoomError {
    /// Attach the statement that produced a driver failure.
    #[must_use]
    pub fn execution(sql: impl Into<String>, err: DriverError) -> Self {
        SqlLoomError::ExecutionError {
            sql: sql.into(),
            message: err.message,
            code: err.code,
        }
    }

    /// The SQL text attached to an execution failure, if any.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            SqlLoomError::ExecutionError { sql, .. } => Some(sql),
            _ => None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        SqlLoomError::ConfigError(message.into())
    }
}

impl From<bb8::RunError<SqlLoomError>> for SqlLoomError {
    fn from(err: bb8::RunError<SqlLoomError>) -> Self {
        match err {
            bb8::RunError::User(err) => err,
            bb8::RunError::TimedOut => SqlLoomError::PoolTimeout,
        }
    }
}
