mod common;

use std::time::Duration;

use sql_loom::executor::{CONNECTION_LOST, IDLE_CLOSE_DELAY};
use sql_loom::prelude::*;
use sql_loom::test_utils::MockDriver;

use common::{manager, oracle_config, wait_until};

fn pooled(max: u32, ceiling: usize) -> ConnectionConfig {
    oracle_config()
        .pool(PoolConfig::default().max_connections(max))
        .max_concurrent_queries(ceiling)
}

#[tokio::test]
async fn ceiling_admits_two_and_promotes_in_submission_order() {
    let driver = MockDriver::new().hold_executions();
    let manager = manager(&driver, pooled(2, 2));

    let pending: Vec<PendingQuery> = (0..5)
        .map(|i| manager.submit(format!("SELECT {i} FROM dual"), ExecuteOptions::default()))
        .collect();
    wait_until("two running statements", || driver.in_flight() == 2).await;

    let stats = manager.stats();
    assert_eq!((stats.active, stats.waiting), (2, 3));
    assert!(manager.has_queued_items());

    let mut first_two: Vec<String> = driver.executed().into_iter().map(|s| s.sql).collect();
    first_two.sort();
    assert_eq!(first_two, ["SELECT 0 FROM dual", "SELECT 1 FROM dual"]);

    for (step, next) in (2..5).enumerate() {
        driver.release(1);
        wait_until("a promoted statement", || driver.executed().len() == 3 + step).await;
        assert_eq!(driver.executed()[2 + step].sql, format!("SELECT {next} FROM dual"));
        assert!(manager.stats().waiting <= 2 - step);
    }
    driver.release(2);

    for query in pending {
        query.await.unwrap();
    }
    let stats = manager.stats();
    assert_eq!((stats.active, stats.waiting), (0, 0));
    assert_eq!(stats.acquired, 5);
    assert_eq!(stats.released, 5);
    assert!(driver.max_in_flight() <= 2);
    assert!(!manager.has_queued_items());
    manager.close().await;
}

#[tokio::test]
async fn failures_carry_the_statement_and_return_the_connection() {
    let driver = MockDriver::new().fail(
        "missing_table",
        DriverError::with_code("ORA-00942", "table or view does not exist"),
    );
    let manager = manager(&driver, pooled(1, 4));

    let err = manager
        .submit("SELECT * FROM missing_table;", ExecuteOptions::default())
        .await
        .unwrap_err();
    match &err {
        SqlLoomError::ExecutionError { sql, message, code } => {
            assert_eq!(sql, "SELECT * FROM missing_table");
            assert_eq!(message, "table or view does not exist");
            assert_eq!(code.as_deref(), Some("ORA-00942"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.sql(), Some("SELECT * FROM missing_table"));

    // the single pooled connection is still usable
    manager
        .submit("SELECT 1 FROM dual", ExecuteOptions::default())
        .await
        .unwrap();
    let stats = manager.stats();
    assert_eq!(stats.acquired, 2);
    assert_eq!(stats.released, 2);
    assert_eq!(driver.connects(), 1);
    manager.close().await;
}

#[tokio::test]
async fn lost_connections_are_replaced_when_handling_disconnects() {
    let driver = MockDriver::new().fail(
        "FROM flaky",
        DriverError::with_code(CONNECTION_LOST, "Connection lost: The server closed the connection."),
    );
    let config = oracle_config()
        .pool(PoolConfig::default().max_connections(1).handle_disconnects(true));
    let manager = manager(&driver, config);

    assert!(manager.submit("SELECT 1 FROM flaky", ExecuteOptions::default()).await.is_err());
    wait_until("the lost connection to close", || driver.closes() == 1).await;

    manager
        .submit("SELECT 1 FROM dual", ExecuteOptions::default())
        .await
        .unwrap();
    let executed = driver.executed();
    assert_eq!(executed[0].connection, 1);
    assert_eq!(executed[1].connection, 2);
    assert_eq!(manager.stats().acquired, manager.stats().released);
    manager.close().await;
}

#[tokio::test]
async fn lost_connections_are_kept_without_disconnect_handling() {
    let driver = MockDriver::new().fail(
        "FROM flaky",
        DriverError::with_code(CONNECTION_LOST, "Connection lost"),
    );
    let manager = manager(&driver, pooled(1, 1));

    assert!(manager.submit("SELECT 1 FROM flaky", ExecuteOptions::default()).await.is_err());
    manager
        .submit("SELECT 1 FROM dual", ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(driver.connects(), 1);
    assert_eq!(driver.closes(), 0);
    manager.close().await;
}

#[tokio::test(start_paused = true)]
async fn idle_single_connection_closes_and_reopens() {
    let driver = MockDriver::new();
    let manager = manager(&driver, oracle_config().single_connection());

    manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap();
    assert!(manager.is_connected());

    tokio::time::sleep(IDLE_CLOSE_DELAY + Duration::from_millis(50)).await;
    assert_eq!(driver.closes(), 1);
    assert!(!manager.is_connected());

    manager.submit("SELECT 2 FROM dual", ExecuteOptions::default()).await.unwrap();
    assert_eq!(driver.connects(), 2);
    manager.close().await;
    assert_eq!(driver.open_connections(), 0);
    assert_eq!(driver.abandoned(), 0);
}

#[tokio::test(start_paused = true)]
async fn new_work_cancels_the_idle_close() {
    let driver = MockDriver::new();
    let manager = manager(&driver, oracle_config().single_connection());

    manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    manager.submit("SELECT 2 FROM dual", ExecuteOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(driver.closes(), 0, "the first timer should have been cancelled");

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(driver.closes(), 1);
    assert_eq!(driver.connects(), 1);
    manager.close().await;
}

#[tokio::test]
async fn pooled_queues_never_arm_the_idle_close() {
    let driver = MockDriver::new();
    let manager = manager(&driver, pooled(2, 2));
    manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap();
    tokio::time::sleep(IDLE_CLOSE_DELAY * 2).await;
    assert_eq!(driver.closes(), 0);
    assert!(manager.is_connected());
    manager.close().await;
}

#[tokio::test]
async fn unbounded_mode_runs_everything_at_once() {
    let driver = MockDriver::new().hold_executions();
    let manager = manager(&driver, pooled(3, 1).queue(false));

    let pending: Vec<PendingQuery> = (0..6)
        .map(|i| manager.submit(format!("SELECT {i} FROM dual"), ExecuteOptions::default()))
        .collect();
    let stats = manager.stats();
    assert_eq!((stats.active, stats.waiting), (6, 0));

    // the pool is the only limit left
    wait_until("the pool to fill", || driver.in_flight() == 3).await;
    driver.release(6);
    for query in pending {
        query.await.unwrap();
    }
    assert_eq!(driver.max_in_flight(), 3);
    manager.close().await;
}

#[tokio::test]
async fn close_finishes_queued_work_then_refuses_more() {
    let driver = MockDriver::new().hold_executions();
    let manager = manager(&driver, pooled(1, 1));

    let pending: Vec<PendingQuery> = (0..3)
        .map(|i| manager.submit(format!("SELECT {i} FROM dual"), ExecuteOptions::default()))
        .collect();
    wait_until("the first statement", || driver.in_flight() == 1).await;

    let closing = manager.close();
    tokio::pin!(closing);
    tokio::select! {
        biased;
        () = &mut closing => panic!("close finished with work outstanding"),
        () = std::future::ready(()) => {}
    }
    let refused = manager
        .submit("SELECT 9 FROM dual", ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(refused, SqlLoomError::PoolClosed));

    driver.release(3);
    for query in pending {
        query.await.unwrap();
    }
    closing.await;
    assert_eq!(driver.executed().len(), 3);
    wait_until("sessions to close", || driver.open_connections() == 0).await;
    assert_eq!(driver.closes(), driver.connects());
    assert_eq!(driver.abandoned(), 0, "every session should be closed through the driver");

    // idempotent
    manager.close().await;
}
