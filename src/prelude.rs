//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so a single
//! `use sql_loom::prelude::*;` covers compiling and running statements.

pub use crate::config::{ConnectTarget, ConnectionConfig, PoolConfig, ReplicationConfig};
pub use crate::driver::{Driver, DriverConnection, DriverError, DriverOutput};
pub use crate::error::SqlLoomError;
pub use crate::executor::{ExecuteOptions, ExecutionQueue, OutputFormat, PendingQuery, QueueStats};
pub use crate::expr::{ColumnRef, Expr};
pub use crate::format::ValueFormatter;
pub use crate::generator::{
    Attribute, Condition, CreateTableOptions, Include, Lock, LockLevel, OrderItem, Predicate,
    QueryGenerator, SelectOptions, ThroughOptions, UniqueKey,
};
pub use crate::manager::ConnectionManager;
pub use crate::model::{
    Association, AssociationKind, AttributeMeta, DataType, ModelMeta, Reference, TableRef,
};
pub use crate::pool::{ConnectionPool, Lease};
pub use crate::quote::Quoter;
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{ConnectionRole, Dialect, SqlValue};
