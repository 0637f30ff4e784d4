use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use super::ExecuteOptions;
use crate::error::SqlLoomError;
use crate::pool::ConnectionPool;
use crate::results::ResultSet;

/// Driver code for a session the backend dropped mid-statement.
pub const CONNECTION_LOST: &str = "PROTOCOL_CONNECTION_LOST";

lazy_static! {
    static ref PLAIN_STATEMENT: Regex =
        Regex::new(r"(?i)^\s*(?:SELECT|INSERT|DELETE)\b").expect("statement pattern is valid");
    static ref TRAILING_SEMICOLON: Regex =
        Regex::new(r"; *$").expect("semicolon pattern is valid");
}

/// Strip the trailing `;` that backends reject on plain statements.
/// Anything else (PL/SQL blocks in particular) needs its terminator and is
/// left alone.
#[must_use]
pub fn normalize_sql(sql: &str) -> Cow<'_, str> {
    if PLAIN_STATEMENT.is_match(sql) {
        TRAILING_SEMICOLON.replace(sql, "")
    } else {
        Cow::Borrowed(sql)
    }
}

/// Acquire, execute, release. The lease goes back to the pool on every path;
/// with `handle_disconnects` a lost session is destroyed instead.
pub(crate) async fn run_job(
    pool: &ConnectionPool,
    sql: &str,
    options: &ExecuteOptions,
) -> Result<ResultSet, SqlLoomError> {
    let sql = normalize_sql(sql);
    let role = options.role_for(&sql);
    let mut lease = match pool.acquire(role).await {
        Ok(lease) => lease,
        Err(err) => {
            warn!(sql = %sql, error = %err, "no connection for statement");
            return Err(err);
        }
    };
    debug!(sql = %sql, role = ?role, priority = options.priority, "executing statement");

    match lease.execute(&sql, options).await {
        Ok(output) => {
            pool.release(lease);
            Ok(ResultSet::from_driver(
                output,
                options.output_format,
                options.max_rows,
            ))
        }
        Err(err) => {
            if pool.handle_disconnects() && err.code() == Some(CONNECTION_LOST) {
                warn!(error = %err, "connection lost, destroying it");
                pool.destroy(lease);
            } else {
                pool.release(lease);
            }
            Err(SqlLoomError::execution(sql, err))
        }
    }
}
