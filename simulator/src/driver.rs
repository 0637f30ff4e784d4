use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sql_loom::driver::DriverError;
use sql_loom::executor::{CONNECTION_LOST, ExecuteOptions};
use sql_loom::test_utils::MockDriver;
use sql_loom::{ConnectTarget, ConnectionConfig, ConnectionManager, Dialect, PoolConfig};

use crate::args::SimConfig;
use crate::logging::EventLog;
use crate::model::{Expect, FLAKY_TABLE, Ledger, MISSING_CODE, MISSING_TABLE, Op, Outcomes};
use crate::oracle::Oracle;

/// Parked statements are let through in batches this large at shutdown.
const FLUSH_PERMITS: usize = 1 << 20;

pub(crate) async fn run(config: SimConfig, rng: &mut ChaCha8Rng) -> Result<(), String> {
    let driver = MockDriver::new()
        .fail(MISSING_TABLE, DriverError::with_code(MISSING_CODE, "table or view does not exist"))
        .fail(FLAKY_TABLE, DriverError::with_code(CONNECTION_LOST, "Connection lost"))
        .hold_executions();
    let manager = ConnectionManager::new(Arc::new(driver.clone()), manager_config(&config))
        .map_err(|err| format!("failed to build connection manager: {err}"))?;
    let outcomes = Outcomes::default();
    let mut ledger = Ledger::default();
    let mut events = EventLog::new(config.first_steps, config.tail_steps);

    let max_steps = config.iterations.unwrap_or(u64::MAX);
    let max_time = Duration::from_millis(config.duration_ms.unwrap_or(u64::MAX / 2));
    let started = tokio::time::Instant::now();

    let mut step: u64 = 0;
    while step < max_steps && started.elapsed() <= max_time {
        let op = next_op(&config, &ledger, rng);
        match &op {
            Op::Submit(count) => {
                for _ in 0..*count {
                    let expect = next_expectation(&config, rng);
                    let id = ledger.submitted;
                    ledger.submitted += 1;
                    let pending = manager.submit(expect.sql(id), ExecuteOptions::default());
                    let outcomes = outcomes.clone();
                    tokio::spawn(async move {
                        let outcome = pending.await.map(|rows| rows.results.len());
                        outcomes.push(id, expect, outcome);
                    });
                }
            }
            Op::Release(count) => driver.release(*count),
            Op::Sleep(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
        }
        // let spawned work settle before observing it
        tokio::time::sleep(Duration::from_millis(1)).await;

        settle_outcomes(&outcomes, &mut ledger, &mut events)?;
        let stats = manager.stats();
        events.record(format!(
            "step={step} time={}ms op={op:?} active={} waiting={} acquired={} released={} sessions={}",
            started.elapsed().as_millis(),
            stats.active,
            stats.waiting,
            stats.acquired,
            stats.released,
            driver.open_connections()
        ));
        if let Err(reason) = Oracle::check(&config, &stats, &driver, &ledger) {
            events.dump_failure(&reason);
            return Err(reason);
        }
        step += 1;
    }

    driver.release(FLUSH_PERMITS);
    manager.close().await;
    while ledger.outstanding() > 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        settle_outcomes(&outcomes, &mut ledger, &mut events)?;
    }
    let stats = manager.stats();
    if let Err(reason) = Oracle::check_closed(&stats, &driver, &ledger) {
        events.dump_failure(&reason);
        return Err(reason);
    }

    tracing::info!(
        "complete: steps={} submitted={} failed={} connects={} max_in_flight={}",
        step,
        ledger.submitted,
        ledger.failed,
        driver.connects(),
        driver.max_in_flight()
    );
    Ok(())
}

fn manager_config(config: &SimConfig) -> ConnectionConfig {
    let base = ConnectionConfig::new(Dialect::Oracle, ConnectTarget::new("sim", "XEPDB1"))
        .max_concurrent_queries(config.max_concurrent_queries);
    if config.single {
        base.single_connection()
    } else {
        base.pool(
            PoolConfig::default()
                .max_connections(config.pool_size)
                .handle_disconnects(true),
        )
    }
}

fn settle_outcomes(outcomes: &Outcomes, ledger: &mut Ledger, events: &mut EventLog) -> Result<(), String> {
    for (id, expect, outcome) in outcomes.drain() {
        ledger.finished += 1;
        if outcome.is_err() {
            ledger.failed += 1;
        }
        if let Err(reason) = expect.check(id, &outcome) {
            events.dump_failure(&reason);
            return Err(reason);
        }
    }
    Ok(())
}

fn next_op(config: &SimConfig, ledger: &Ledger, rng: &mut ChaCha8Rng) -> Op {
    if rng.random::<f64>() < config.sleep_rate {
        return Op::Sleep(rng.random_range(1..=50));
    }
    if ledger.outstanding() == 0 || rng.random_bool(0.4) {
        return Op::Submit(rng.random_range(1..=config.max_batch));
    }
    Op::Release(rng.random_range(1..=config.connection_limit()))
}

fn next_expectation(config: &SimConfig, rng: &mut ChaCha8Rng) -> Expect {
    let roll = rng.random::<f64>();
    if roll < config.disconnect_rate {
        Expect::Lost
    } else if roll < config.disconnect_rate + config.failure_rate {
        Expect::Missing
    } else {
        Expect::Rows
    }
}
