use std::sync::{Arc, Mutex};

use sql_loom::SqlLoomError;
use sql_loom::executor::CONNECTION_LOST;

/// Table names the mock backend answers with a scripted failure.
pub(crate) const MISSING_TABLE: &str = "missing_table";
pub(crate) const FLAKY_TABLE: &str = "flaky_table";
pub(crate) const MISSING_CODE: &str = "ORA-00942";

#[derive(Debug, Clone)]
pub(crate) enum Op {
    /// Submit this many statements at once.
    Submit(usize),
    /// Let this many parked statements finish.
    Release(usize),
    Sleep(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    Rows,
    Missing,
    Lost,
}

impl Expect {
    pub(crate) fn sql(self, id: u64) -> String {
        match self {
            Expect::Rows => format!("SELECT {id} FROM dual"),
            Expect::Missing => format!("SELECT {id} FROM {MISSING_TABLE};"),
            Expect::Lost => format!("SELECT {id} FROM {FLAKY_TABLE}"),
        }
    }

    /// Check a finished statement against what the script answers for it.
    pub(crate) fn check(self, id: u64, outcome: &Result<usize, SqlLoomError>) -> Result<(), String> {
        match (self, outcome) {
            (Expect::Rows, Ok(_)) => Ok(()),
            (Expect::Missing, Err(SqlLoomError::ExecutionError { sql, code, .. }))
                if code.as_deref() == Some(MISSING_CODE) =>
            {
                // normalization strips the terminator before execution
                let expected = format!("SELECT {id} FROM {MISSING_TABLE}");
                if *sql == expected {
                    Ok(())
                } else {
                    Err(format!("statement {id} failed with sql {sql:?}, expected {expected:?}"))
                }
            }
            (Expect::Lost, Err(SqlLoomError::ExecutionError { code, .. }))
                if code.as_deref() == Some(CONNECTION_LOST) =>
            {
                Ok(())
            }
            (expect, outcome) => Err(format!(
                "statement {id} expected {expect:?} but finished with {outcome:?}"
            )),
        }
    }
}

/// Finished statements reported by the awaiting tasks.
#[derive(Clone, Default)]
pub(crate) struct Outcomes {
    inner: Arc<Mutex<Vec<(u64, Expect, Result<usize, SqlLoomError>)>>>,
}

impl Outcomes {
    pub(crate) fn push(&self, id: u64, expect: Expect, outcome: Result<usize, SqlLoomError>) {
        if let Ok(mut finished) = self.inner.lock() {
            finished.push((id, expect, outcome));
        }
    }

    /// Take everything reported since the last call.
    pub(crate) fn drain(&self) -> Vec<(u64, Expect, Result<usize, SqlLoomError>)> {
        self.inner
            .lock()
            .map(|mut finished| std::mem::take(&mut *finished))
            .unwrap_or_default()
    }
}

/// What the simulator expects the queue to have done so far.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub(crate) submitted: u64,
    pub(crate) finished: u64,
    pub(crate) failed: u64,
}

impl Ledger {
    pub(crate) fn outstanding(&self) -> u64 {
        self.submitted - self.finished
    }
}
