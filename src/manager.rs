use std::sync::Arc;

use tracing::info;

use crate::config::ConnectionConfig;
use crate::driver::Driver;
use crate::error::SqlLoomError;
use crate::executor::{ExecuteOptions, ExecutionQueue, PendingQuery, QueueStats};
use crate::generator::QueryGenerator;
use crate::pool::ConnectionPool;
use crate::types::Dialect;

/// Configuration, generator, pool and execution queue for one backend.
///
/// There is no process exit hook: hosts call [`ConnectionManager::close`]
/// from their own shutdown path.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    config: Arc<ConnectionConfig>,
    generator: QueryGenerator,
    queue: ExecutionQueue,
}

impl ConnectionManager {
    /// Build the pool and queue for `config`. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `SqlLoomError::ConfigError` when the pool policy is unusable.
    pub fn new(driver: Arc<dyn Driver>, config: ConnectionConfig) -> Result<Self, SqlLoomError> {
        let pool = ConnectionPool::new(driver, &config)?;
        let queue = if config.queue {
            ExecutionQueue::new(pool, config.max_concurrent_queries)
        } else {
            ExecutionQueue::unbounded(pool)
        };
        info!(
            dialect = ?config.dialect,
            pooled = config.pool.is_some(),
            queued = config.queue,
            "connection manager ready"
        );
        Ok(Self {
            generator: QueryGenerator::new(config.dialect)
                .with_time_zone(config.time_zone)
                .with_quote_identifiers(config.quote_identifiers),
            config: Arc::new(config),
            queue,
        })
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    #[must_use]
    pub fn generator(&self) -> &QueryGenerator {
        &self.generator
    }

    #[must_use]
    pub fn queue(&self) -> &ExecutionQueue {
        &self.queue
    }

    pub fn submit(&self, sql: impl Into<String>, options: ExecuteOptions) -> PendingQuery {
        self.queue.submit(sql, options)
    }

    #[must_use]
    pub fn has_queued_items(&self) -> bool {
        self.queue.has_queued_items()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.queue.is_connected()
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Finish outstanding work and close every connection. Idempotent.
    pub async fn close(&self) {
        self.queue.close().await;
    }
}
