//! In-memory scripted driver for tests, benchmarks and the simulator.
//!
//! ```rust
//! use std::sync::Arc;
//! use sql_loom::prelude::*;
//! use sql_loom::test_utils::MockDriver;
//!
//! # tokio_test_block(async {
//! let driver = MockDriver::new().respond("FROM \"users\"", MockDriver::rows(&["id"], vec![vec![1.into()]]));
//! let config = ConnectionConfig::new(Dialect::Postgres, ConnectTarget::new("mock", "db"));
//! let manager = ConnectionManager::new(Arc::new(driver.clone()), config).unwrap();
//! let rows = manager.submit("SELECT * FROM \"users\"", ExecuteOptions::default()).await.unwrap();
//! assert_eq!(rows.results.len(), 1);
//! manager.close().await;
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod test_helpers;

pub use test_helpers::{ExecutedStatement, MockConnection, MockDriver};

use crate::results::CustomDbRow;
use crate::types::SqlValue;
use std::sync::Arc;

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<SqlValue>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}
