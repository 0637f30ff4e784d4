//! Dialect-aware SQL compilation for eager-loading ORM queries, plus the
//! connection pool and bounded execution queue that run the result.
//!
//! ```rust
//! use std::sync::Arc;
//! use sql_loom::prelude::*;
//!
//! let users = ModelMeta::new("users", "users")
//!     .attribute(AttributeMeta::id("id"))
//!     .attribute(AttributeMeta::new("name", DataType::String(None)))
//!     .into_shared();
//! let posts = ModelMeta::new("posts", "posts")
//!     .attribute(AttributeMeta::id("id"))
//!     .attribute(AttributeMeta::new("user_id", DataType::Integer))
//!     .into_shared();
//!
//! let options = SelectOptions::new()
//!     .include(Include::new(Association::has_many(users.clone(), posts, "user_id")))
//!     .order(OrderItem::column("id"))
//!     .limit(10);
//! let sql = QueryGenerator::new(Dialect::Oracle)
//!     .select_query(&users.table, &options, Some(&*users))
//!     .unwrap();
//! assert!(sql.contains("ROWNUM"));
//! ```

pub mod prelude;

pub mod config;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod executor;
pub mod expr;
pub mod format;
pub mod generator;
pub mod manager;
pub mod model;
pub mod pool;
pub mod quote;
pub mod results;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectTarget, ConnectionConfig, PoolConfig, ReplicationConfig};
pub use error::SqlLoomError;
pub use generator::QueryGenerator;
pub use manager::ConnectionManager;
pub use types::{ConnectionRole, Dialect, SqlValue};
