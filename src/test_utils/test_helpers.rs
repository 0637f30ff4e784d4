use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::config::ConnectTarget;
use crate::driver::{BoxedConnection, Driver, DriverConnection, DriverError, DriverOutput};
use crate::executor::ExecuteOptions;
use crate::pool::lock;
use crate::types::SqlValue;

/// One statement as the mock backend received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedStatement {
    pub connection: usize,
    pub host: String,
    pub sql: String,
}

#[derive(Default)]
struct Script {
    responses: Vec<(String, Result<DriverOutput, DriverError>)>,
    connect_failures: VecDeque<DriverError>,
    ping_failures: VecDeque<DriverError>,
    executed: Vec<ExecutedStatement>,
    connect_delay: Duration,
    execute_delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

#[derive(Default)]
struct MockState {
    script: Mutex<Script>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    pings: AtomicUsize,
    abandoned: AtomicUsize,
    open: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted driver: statements are answered by the first registered pattern
/// they contain, everything else returns an empty result.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience output with string column names.
    #[must_use]
    pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> DriverOutput {
        DriverOutput {
            columns: columns.iter().map(ToString::to_string).collect(),
            rows,
            rows_affected: 0,
        }
    }

    #[must_use]
    pub fn respond(self, pattern: impl Into<String>, output: DriverOutput) -> Self {
        lock(&self.state.script)
            .responses
            .push((pattern.into(), Ok(output)));
        self
    }

    #[must_use]
    pub fn fail(self, pattern: impl Into<String>, err: DriverError) -> Self {
        lock(&self.state.script)
            .responses
            .push((pattern.into(), Err(err)));
        self
    }

    /// The next connect attempt fails with `err`.
    #[must_use]
    pub fn fail_next_connect(self, err: DriverError) -> Self {
        lock(&self.state.script).connect_failures.push_back(err);
        self
    }

    /// The next validation ping, on whichever session, fails with `err`.
    pub fn fail_next_ping(&self, err: DriverError) {
        lock(&self.state.script).ping_failures.push_back(err);
    }

    #[must_use]
    pub fn connect_delay(self, delay: Duration) -> Self {
        lock(&self.state.script).connect_delay = delay;
        self
    }

    #[must_use]
    pub fn execute_delay(self, delay: Duration) -> Self {
        lock(&self.state.script).execute_delay = delay;
        self
    }

    /// Park every statement until [`Self::release`] lets it through.
    #[must_use]
    pub fn hold_executions(self) -> Self {
        lock(&self.state.script).gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `n` parked statements finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &lock(&self.state.script).gate {
            gate.add_permits(n);
        }
    }

    #[must_use]
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Sessions ended through [`DriverConnection::close`].
    #[must_use]
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Sessions dropped without ever being closed.
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.state.abandoned.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    /// Sessions connected and not yet closed, abandoned ones included.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Statements currently inside `execute`.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        lock(&self.state.script).executed.clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn connect(&self, target: &ConnectTarget) -> Result<BoxedConnection, DriverError> {
        let (delay, failure) = {
            let mut script = lock(&self.state.script);
            (script.connect_delay, script.connect_failures.pop_front())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }
        let id = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id,
            host: target.host.clone(),
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

/// Session handed out by [`MockDriver`].
pub struct MockConnection {
    id: usize,
    host: String,
    state: Arc<MockState>,
    closed: bool,
}


#[async_trait]
impl DriverConnection for MockConnection {
    async fn execute(
        &mut self,
        sql: &str,
        _options: &ExecuteOptions,
    ) -> Result<DriverOutput, DriverError> {
        let (delay, gate, response) = {
            let mut script = lock(&self.state.script);
            script.executed.push(ExecutedStatement {
                connection: self.id,
                host: self.host.clone(),
                sql: sql.to_string(),
            });
            let response = script
                .responses
                .iter()
                .find(|(pattern, _)| sql.contains(pattern.as_str()))
                .map(|(_, response)| response.clone());
            (script.execute_delay, script.gate.clone(), response)
        };

        let running = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(gate) = gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        response.unwrap_or_else(|| Ok(DriverOutput::default()))
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        match lock(&self.state.script).ping_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            self.state.open.fetch_sub(1, Ordering::SeqCst);
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.state.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}
