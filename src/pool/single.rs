use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tracing::{debug, warn};

use super::classify::classify_connect_error;
use super::lock;
use crate::config::ConnectTarget;
use crate::driver::{BoxedConnection, Driver, DriverError};
use crate::error::SqlLoomError;
use crate::types::Dialect;

pub(crate) type SharedConnection = Arc<AsyncMutex<BoxedConnection>>;

type ConnectOutcome = Option<Result<SharedConnection, DriverError>>;

enum SlotState {
    Idle,
    /// A connect is in flight; later callers wait on the same attempt.
    Connecting {
        attempt: u64,
        outcome: watch::Receiver<ConnectOutcome>,
    },
    Connected(SharedConnection),
}

struct SlotInner {
    driver: Arc<dyn Driver>,
    target: ConnectTarget,
    dialect: Dialect,
    state: Mutex<SlotState>,
    attempts: Mutex<u64>,
}

/// The lazily opened session used when pooling is disabled.
///
/// The first caller starts the connect; everyone arriving before it finishes
/// resolves with the same outcome. A failed attempt leaves the slot idle so
/// the next caller tries again.
#[derive(Clone)]
pub struct SingleConnection {
    inner: Arc<SlotInner>,
}

impl fmt::Debug for SingleConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleConnection")
            .field("dialect", &self.inner.dialect)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SingleConnection {
    pub(crate) fn new(driver: Arc<dyn Driver>, target: ConnectTarget, dialect: Dialect) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                driver,
                target,
                dialect,
                state: Mutex::new(SlotState::Idle),
                attempts: Mutex::new(0),
            }),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        matches!(*lock(&self.inner.state), SlotState::Connected(_))
    }

    pub(crate) async fn get(&self) -> Result<SharedConnection, SqlLoomError> {
        let mut outcome = match self.join_or_connect() {
            Ok(conn) => return Ok(conn),
            Err(outcome) => outcome,
        };
        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map(|value| value.clone());
        match settled {
            Ok(Some(Ok(conn))) => Ok(conn),
            Ok(Some(Err(err))) => Err(classify_connect_error(self.inner.dialect, err)),
            _ => Err(SqlLoomError::ConnectionError(
                "connection attempt was abandoned".to_string(),
            )),
        }
    }

    /// Cached connection, or a receiver for the attempt in flight (started
    /// here when the slot is idle).
    fn join_or_connect(&self) -> Result<SharedConnection, watch::Receiver<ConnectOutcome>> {
        let mut state = lock(&self.inner.state);
        match &*state {
            SlotState::Connected(conn) => return Ok(Arc::clone(conn)),
            SlotState::Connecting { outcome, .. } => return Err(outcome.clone()),
            SlotState::Idle => {}
        }
        let attempt = {
            let mut attempts = lock(&self.inner.attempts);
            *attempts += 1;
            *attempts
        };
        let (tx, rx) = watch::channel(None);
        *state = SlotState::Connecting {
            attempt,
            outcome: rx.clone(),
        };
        drop(state);
        debug!(attempt, "opening shared connection");
        tokio::spawn(connect_attempt(Arc::clone(&self.inner), attempt, tx));
        Err(rx)
    }

    /// Discard the cached session if it is `conn` and close it in the
    /// background, so the next caller reconnects.
    pub(crate) fn forget(&self, conn: &SharedConnection) {
        let forgotten = {
            let mut state = lock(&self.inner.state);
            let current = matches!(&*state, SlotState::Connected(current) if Arc::ptr_eq(current, conn));
            if current {
                *state = SlotState::Idle;
            }
            current
        };
        if !forgotten {
            return;
        }
        let conn = Arc::clone(conn);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { close_shared(&conn).await });
            }
            Err(_) => warn!("no runtime left to close shared connection on"),
        }
    }

    /// Close the cached session, if any.
    pub(crate) async fn close(&self) {
        let previous = mem::replace(&mut *lock(&self.inner.state), SlotState::Idle);
        if let SlotState::Connected(conn) = previous {
            close_shared(&conn).await;
        }
    }

    /// Close the cached session only when nobody holds it. Whether it is held
    /// and the slot reset are decided under the slot lock, the same lock new
    /// callers take the session under, so a caller can never be handed a
    /// session that is about to close. A connect in flight is left alone.
    pub(crate) async fn close_if_unused(&self) -> bool {
        let previous = {
            let mut state = lock(&self.inner.state);
            let unused = matches!(&*state, SlotState::Connected(conn) if Arc::strong_count(conn) == 1);
            if !unused {
                return false;
            }
            mem::replace(&mut *state, SlotState::Idle)
        };
        if let SlotState::Connected(conn) = previous {
            close_shared(&conn).await;
        }
        true
    }
}

async fn close_shared(conn: &SharedConnection) {
    match conn.lock().await.close().await {
        Ok(()) => debug!("closed shared connection"),
        Err(err) => warn!(error = %err, "closing shared connection failed"),
    }
}

async fn connect_attempt(inner: Arc<SlotInner>, attempt: u64, tx: watch::Sender<ConnectOutcome>) {
    let outcome = inner
        .driver
        .connect(&inner.target)
        .await
        .map(|conn| Arc::new(AsyncMutex::new(conn)));

    let superseded = {
        let mut state = lock(&inner.state);
        let current = matches!(
            &*state,
            SlotState::Connecting { attempt: pending, .. } if *pending == attempt
        );
        if current {
            *state = match &outcome {
                Ok(conn) => SlotState::Connected(Arc::clone(conn)),
                Err(_) => SlotState::Idle,
            };
        }
        !current
    };
    let outcome = if superseded {
        debug!(attempt, "shared connection closed while connecting");
        if let Ok(conn) = &outcome {
            let _ = conn.lock().await.close().await;
        }
        Err(DriverError::new("connection was closed while connecting"))
    } else {
        outcome
    };
    let _ = tx.send(Some(outcome));
}
