use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info};

use super::ExecuteOptions;
use super::dispatch::run_job;
use crate::error::SqlLoomError;
use crate::pool::{ConnectionPool, lock};
use crate::results::ResultSet;

/// How long a fully idle single-connection queue keeps its session open.
pub const IDLE_CLOSE_DELAY: Duration = Duration::from_millis(100);

type JobResult = Result<ResultSet, SqlLoomError>;

struct Job {
    id: u64,
    sql: String,
    options: ExecuteOptions,
    reply: oneshot::Sender<JobResult>,
}

#[derive(Default)]
struct QueueState {
    active: usize,
    waiting: VecDeque<Job>,
    idle_timer: Option<AbortHandle>,
    closed: bool,
}

impl QueueState {
    fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }

    fn is_idle(&self) -> bool {
        self.active == 0 && self.waiting.is_empty()
    }
}

struct QueueInner {
    pool: ConnectionPool,
    /// `None` when admission control is off and jobs run immediately.
    ceiling: Option<usize>,
    state: Mutex<QueueState>,
    settled: Notify,
    next_id: AtomicU64,
}

/// Counters for one queue and the pool under it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub active: usize,
    pub waiting: usize,
    pub acquired: u64,
    pub released: u64,
    pub connections: u32,
}

/// Bounded admission in front of a [`ConnectionPool`].
///
/// At most `max_concurrent_queries` jobs hold or wait for a connection at
/// once; the rest wait in submission order and are promoted as active jobs
/// finish.
#[derive(Clone)]
pub struct ExecutionQueue {
    inner: Arc<QueueInner>,
}

impl fmt::Debug for ExecutionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionQueue")
            .field("ceiling", &self.inner.ceiling)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ExecutionQueue {
    /// Queue with a concurrency ceiling (clamped to at least 1).
    #[must_use]
    pub fn new(pool: ConnectionPool, max_concurrent_queries: usize) -> Self {
        Self::build(pool, Some(max_concurrent_queries.max(1)))
    }

    /// Jobs start as soon as they are submitted; only a pending count is kept.
    #[must_use]
    pub fn unbounded(pool: ConnectionPool) -> Self {
        Self::build(pool, None)
    }

    fn build(pool: ConnectionPool, ceiling: Option<usize>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pool,
                ceiling,
                state: Mutex::new(QueueState::default()),
                settled: Notify::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    /// Queue `sql` for execution. Must be called within a Tokio runtime.
    ///
    /// The job starts immediately when there is room under the ceiling and
    /// otherwise waits its turn. Await the returned [`PendingQuery`] for the
    /// rows or the failure, which carries the offending SQL.
    pub fn submit(&self, sql: impl Into<String>, options: ExecuteOptions) -> PendingQuery {
        let (reply, rx) = oneshot::channel();
        let job = Job {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            sql: sql.into(),
            options,
            reply,
        };

        let mut state = lock(&self.inner.state);
        if state.closed {
            drop(state);
            let _ = job.reply.send(Err(SqlLoomError::PoolClosed));
            return PendingQuery { rx };
        }
        state.cancel_idle_timer();
        let admit = self.inner.ceiling.is_none_or(|ceiling| state.active < ceiling);
        if admit {
            state.active += 1;
            drop(state);
            QueueInner::start(&self.inner, job);
        } else {
            state.waiting.push_back(job);
            debug!(waiting = state.waiting.len(), "statement queued");
        }
        PendingQuery { rx }
    }

    /// Jobs waiting or running.
    #[must_use]
    pub fn has_queued_items(&self) -> bool {
        !lock(&self.inner.state).is_idle()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.pool.is_connected()
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let (active, waiting) = {
            let state = lock(&self.inner.state);
            (state.active, state.waiting.len())
        };
        let pool = self.inner.pool.stats();
        QueueStats {
            active,
            waiting,
            acquired: pool.acquired,
            released: pool.released,
            connections: pool.connections,
        }
    }

    /// Refuse new submissions, let queued and running jobs finish, then drain
    /// the pool. Idempotent.
    pub async fn close(&self) {
        {
            let mut state = lock(&self.inner.state);
            if !state.closed {
                info!(
                    active = state.active,
                    waiting = state.waiting.len(),
                    "closing execution queue"
                );
            }
            state.closed = true;
            state.cancel_idle_timer();
        }
        loop {
            let settled = self.inner.settled.notified();
            if lock(&self.inner.state).is_idle() {
                break;
            }
            settled.await;
        }
        self.inner.pool.drain().await;
    }
}

impl QueueInner {
    fn start(this: &Arc<Self>, job: Job) {
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            let Job {
                id,
                sql,
                options,
                reply,
            } = job;
            let admission = Admission(Arc::clone(&inner));
            debug!(job = id, "statement started");
            let result = run_job(&inner.pool, &sql, &options).await;
            // Free the slot before the caller sees the result.
            drop(admission);
            let _ = reply.send(result);
        });
    }

    fn finish(this: &Arc<Self>) {
        let promoted = {
            let mut state = lock(&this.state);
            state.active = state.active.saturating_sub(1);
            let mut promoted = Vec::new();
            while this.ceiling.is_none_or(|ceiling| state.active < ceiling) {
                let Some(job) = state.waiting.pop_front() else {
                    break;
                };
                state.active += 1;
                promoted.push(job);
            }
            if state.is_idle() {
                this.settled.notify_waiters();
                if this.pool.is_single() && !state.closed {
                    state.cancel_idle_timer();
                    state.idle_timer = Some(Self::arm_idle_timer(this));
                }
            }
            promoted
        };
        for job in promoted {
            debug!(job = job.id, "statement promoted");
            Self::start(this, job);
        }
    }

    fn arm_idle_timer(this: &Arc<Self>) -> AbortHandle {
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            tokio::time::sleep(IDLE_CLOSE_DELAY).await;
            let idle = {
                let mut state = lock(&inner.state);
                state.idle_timer = None;
                state.is_idle()
            };
            if idle && inner.pool.close_idle_session().await {
                debug!("closed idle shared connection");
            }
        })
        .abort_handle()
    }
}

/// Holds one active slot; giving it up promotes waiting jobs, even when the
/// job panicked.
struct Admission(Arc<QueueInner>);

impl Drop for Admission {
    fn drop(&mut self) {
        QueueInner::finish(&self.0);
    }
}

/// The eventual outcome of a submitted statement.
#[must_use = "a submitted statement runs regardless, but its result is only seen by awaiting"]
pub struct PendingQuery {
    rx: oneshot::Receiver<JobResult>,
}

impl Future for PendingQuery {
    type Output = JobResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|outcome| {
            outcome.unwrap_or_else(|_| {
                Err(SqlLoomError::ConnectionError(
                    "statement was abandoned before completing".to_string(),
                ))
            })
        })
    }
}
