use sql_loom::executor::QueueStats;
use sql_loom::test_utils::MockDriver;

use crate::args::SimConfig;
use crate::model::Ledger;

pub(crate) struct Oracle;

impl Oracle {
    /// Invariants that hold between any two steps.
    pub(crate) fn check(
        config: &SimConfig,
        stats: &QueueStats,
        driver: &MockDriver,
        ledger: &Ledger,
    ) -> Result<(), String> {
        let ceiling = config.max_concurrent_queries;
        if stats.active > ceiling {
            return Err(format!("{} active statements above the ceiling of {ceiling}", stats.active));
        }
        if stats.waiting > 0 && stats.active < ceiling {
            return Err(format!(
                "{} statements wait while only {} of {ceiling} slots are taken",
                stats.waiting, stats.active
            ));
        }
        let queued = (stats.active + stats.waiting) as u64;
        if queued > ledger.outstanding() {
            return Err(format!(
                "queue holds {queued} statements but only {} are outstanding",
                ledger.outstanding()
            ));
        }
        if stats.released > stats.acquired {
            return Err(format!(
                "released {} connections but acquired only {}",
                stats.released, stats.acquired
            ));
        }
        let checked_out = stats.acquired - stats.released;
        if checked_out > stats.active as u64 {
            return Err(format!(
                "{checked_out} connections checked out for {} active statements",
                stats.active
            ));
        }

        let limit = config.connection_limit();
        if driver.in_flight() > limit {
            return Err(format!("{} statements executing on at most {limit} sessions", driver.in_flight()));
        }
        if !config.single && driver.open_connections() > limit {
            return Err(format!("{} sessions open, pool size is {limit}", driver.open_connections()));
        }
        Ok(())
    }

    /// Invariants once every statement has finished and the manager is closed.
    pub(crate) fn check_closed(stats: &QueueStats, driver: &MockDriver, ledger: &Ledger) -> Result<(), String> {
        if ledger.outstanding() != 0 {
            return Err(format!("{} statements never finished", ledger.outstanding()));
        }
        if stats.acquired != stats.released {
            return Err(format!(
                "acquired {} connections but released {}",
                stats.acquired, stats.released
            ));
        }
        if stats.active != 0 || stats.waiting != 0 {
            return Err(format!("closed queue still holds {stats:?}"));
        }
        if driver.open_connections() != 0 {
            return Err(format!("{} sessions left open after close", driver.open_connections()));
        }
        if driver.abandoned() != 0 {
            return Err(format!("{} sessions dropped without being closed", driver.abandoned()));
        }
        Ok(())
    }
}
