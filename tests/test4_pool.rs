mod common;

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sql_loom::prelude::*;
use sql_loom::test_utils::MockDriver;

use common::{manager, oracle_config, wait_until};

/// Log sink for asserting on what the library reports.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn pool(driver: &MockDriver, config: &ConnectionConfig) -> ConnectionPool {
    ConnectionPool::new(Arc::new(driver.clone()), config).unwrap()
}

#[tokio::test]
async fn concurrent_callers_share_one_connect() {
    let driver = MockDriver::new()
        .connect_delay(Duration::from_millis(20))
        .execute_delay(Duration::from_millis(1));
    let manager = manager(&driver, oracle_config().single_connection());

    let pending: Vec<PendingQuery> = (0..10)
        .map(|i| manager.submit(format!("SELECT {i} FROM dual"), ExecuteOptions::default()))
        .collect();
    for query in pending {
        query.await.unwrap();
    }
    assert_eq!(driver.connects(), 1);
    assert_eq!(driver.max_in_flight(), 1);
    assert!(driver.executed().iter().all(|stmt| stmt.connection == 1));
    manager.close().await;
    assert_eq!(driver.open_connections(), 0);
}

#[tokio::test]
async fn connect_failures_are_classified_and_retried() {
    let driver = MockDriver::new()
        .fail_next_connect(DriverError::with_code("ENOTFOUND", "getaddrinfo ENOTFOUND primary"))
        .fail_next_connect(DriverError::with_code("ER_ACCESS_DENIED_ERROR", "denied"))
        .fail_next_connect(DriverError::with_code("ORA-12514", "TNS:listener does not know of service"));
    let manager = manager(&driver, oracle_config().single_connection());

    let err = manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Connectivity error: Failed to find ORACLE server. Please double check your settings."
    );
    let err = manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        SqlLoomError::AuthenticationError(msg)
            if msg == "Failed to authenticate for ORACLE. Please double check your settings."
    ));
    let err = manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap_err();
    assert!(matches!(err, SqlLoomError::ConnectionError(msg) if msg == "TNS:listener does not know of service"));

    // a failed attempt leaves the slot idle, so the next caller connects
    manager.submit("SELECT 1 FROM dual", ExecuteOptions::default()).await.unwrap();
    assert!(manager.is_connected());
    let stats = manager.stats();
    assert_eq!(stats.acquired, 1);
    assert_eq!(stats.released, 1);
    manager.close().await;
}

#[tokio::test]
async fn connect_failures_are_logged_with_the_statement() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let driver = MockDriver::new()
        .fail_next_connect(DriverError::with_code("EHOSTUNREACH", "no route to host"));
    let manager = manager(&driver, oracle_config().single_connection());
    let err = manager
        .submit("SELECT 42 FROM dual", ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SqlLoomError::ConnectivityError(_)));

    let text = log.text();
    assert!(text.contains("no connection for statement"), "{text}");
    assert!(text.contains("SELECT 42 FROM dual"), "{text}");
    manager.close().await;
}

#[tokio::test]
async fn reads_go_to_replicas_and_writes_to_the_primary() {
    let driver = MockDriver::new().hold_executions();
    let config = oracle_config().replication(ReplicationConfig {
        read: vec![ConnectTarget::new("r1", "XEPDB1"), ConnectTarget::new("r2", "XEPDB1")],
        write: ConnectTarget::new("w", "XEPDB1"),
    });
    let manager = manager(&driver, config);

    let reads: Vec<PendingQuery> = (0..2)
        .map(|i| manager.submit(format!("SELECT {i} FROM dual"), ExecuteOptions::default()))
        .collect();
    wait_until("both reads to start", || driver.in_flight() == 2).await;
    let insert = manager.submit("INSERT INTO \"t\" (\"a\") VALUES (1)", ExecuteOptions::default());
    let forced = manager.submit(
        "SELECT 9 FROM dual",
        ExecuteOptions::default().role(ConnectionRole::Write),
    );
    wait_until("every statement to start", || driver.in_flight() == 4).await;
    driver.release(4);
    for query in reads {
        query.await.unwrap();
    }
    insert.await.unwrap();
    forced.await.unwrap();

    let executed = driver.executed();
    let host_of = |sql: &str| {
        executed
            .iter()
            .find(|stmt| stmt.sql == sql)
            .map(|stmt| stmt.host.clone())
            .unwrap()
    };
    let mut read_hosts = vec![host_of("SELECT 0 FROM dual"), host_of("SELECT 1 FROM dual")];
    read_hosts.sort();
    assert_eq!(read_hosts, ["r1", "r2"]);
    assert_eq!(host_of("INSERT INTO \"t\" (\"a\") VALUES (1)"), "w");
    assert_eq!(host_of("SELECT 9 FROM dual"), "w");
    assert_eq!(manager.stats().connections, 4);
    manager.close().await;
    wait_until("every session to close", || driver.open_connections() == 0).await;
}

#[tokio::test]
async fn drain_waits_for_leases_and_refuses_new_ones() {
    let driver = MockDriver::new();
    let pool = pool(&driver, &oracle_config());
    let mut lease = pool.acquire(ConnectionRole::Read).await.unwrap();
    lease
        .execute("SELECT 1 FROM dual", &ExecuteOptions::default())
        .await
        .unwrap();
    assert!(pool.is_connected());

    let drain = pool.drain();
    tokio::pin!(drain);
    tokio::select! {
        biased;
        () = &mut drain => panic!("drain finished while a lease was out"),
        () = std::future::ready(()) => {}
    }
    assert!(pool.is_closed());
    assert!(matches!(
        pool.acquire(ConnectionRole::Write).await,
        Err(SqlLoomError::PoolClosed)
    ));

    pool.release(lease);
    drain.await;
    let stats = pool.stats();
    assert_eq!((stats.acquired, stats.released, stats.checked_out), (1, 1, 0));
    wait_until("the pooled session to close", || driver.open_connections() == 0).await;

    // idempotent
    pool.drain().await;
    assert!(!pool.is_connected());
}

#[tokio::test]
async fn destroyed_connections_are_replaced() {
    let driver = MockDriver::new();
    let pool = pool(&driver, &oracle_config().pool(PoolConfig::default().max_connections(1)));

    let lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    pool.destroy(lease);
    wait_until("the destroyed session to close", || driver.closes() == 1).await;

    let mut lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    lease
        .execute("SELECT 1 FROM dual", &ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(driver.executed()[0].connection, 2);
    pool.release(lease);
    assert_eq!(pool.stats().released, 2);
    pool.drain().await;
    wait_until("the replacement session to close", || driver.closes() == 2).await;
    assert_eq!(driver.abandoned(), 0);
}

#[tokio::test]
async fn drain_closes_pooled_sessions_through_the_driver() {
    let driver = MockDriver::new();
    let manager = manager(&driver, oracle_config());
    manager
        .submit("SELECT 1 FROM dual", ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(driver.connects(), 1);

    manager.close().await;
    wait_until("the pooled session to close", || driver.closes() == 1).await;
    assert_eq!(driver.abandoned(), 0);
    assert_eq!(driver.open_connections(), 0);
}

#[tokio::test]
async fn sessions_failing_validation_are_replaced() {
    let driver = MockDriver::new();
    let pool = pool(&driver, &oracle_config().pool(PoolConfig::default().max_connections(1)));

    let mut lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    lease
        .execute("SELECT 1 FROM dual", &ExecuteOptions::default())
        .await
        .unwrap();
    pool.release(lease);

    driver.fail_next_ping(DriverError::with_code("ORA-03113", "end-of-file on communication channel"));
    let mut lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    lease
        .execute("SELECT 2 FROM dual", &ExecuteOptions::default())
        .await
        .unwrap();
    assert!(driver.pings() >= 1);
    assert_eq!(driver.connects(), 2);
    assert_eq!(driver.executed()[1].connection, 2);
    wait_until("the invalid session to close", || driver.closes() == 1).await;

    pool.release(lease);
    pool.drain().await;
    wait_until("every session to close", || driver.open_connections() == 0).await;
    assert_eq!(driver.abandoned(), 0);
}

#[tokio::test]
async fn idle_sessions_beyond_the_minimum_are_reaped() {
    let driver = MockDriver::new();
    let pool = pool(
        &driver,
        &oracle_config().pool(
            PoolConfig::default()
                .max_connections(3)
                .min_connections(1)
                .max_idle_time(Duration::from_millis(50)),
        ),
    );

    let leases = vec![
        pool.acquire(ConnectionRole::Write).await.unwrap(),
        pool.acquire(ConnectionRole::Write).await.unwrap(),
        pool.acquire(ConnectionRole::Write).await.unwrap(),
    ];
    assert_eq!(driver.open_connections(), 3);
    for lease in leases {
        pool.release(lease);
    }

    wait_until("idle sessions to be reaped", || {
        driver.closes() >= 2 && driver.open_connections() == 1
    })
    .await;
    assert_eq!(driver.abandoned(), 0);

    pool.drain().await;
    wait_until("every session to close", || driver.open_connections() == 0).await;
}

#[tokio::test]
async fn the_idle_close_skips_a_session_still_held() {
    let driver = MockDriver::new();
    let pool = ConnectionPool::single(
        Arc::new(driver.clone()),
        ConnectTarget::new("primary", "XEPDB1"),
        Dialect::Oracle,
    );

    let lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    assert!(!pool.close_idle_session().await);
    assert_eq!(driver.closes(), 0);
    assert!(pool.is_connected());

    pool.release(lease);
    assert!(pool.close_idle_session().await);
    assert_eq!(driver.closes(), 1);
    assert!(!pool.is_connected());
    pool.drain().await;
}

#[tokio::test]
async fn destroying_the_shared_session_reconnects() {
    let driver = MockDriver::new();
    let pool = ConnectionPool::single(
        Arc::new(driver.clone()),
        ConnectTarget::new("primary", "XEPDB1"),
        Dialect::Oracle,
    );
    assert!(pool.is_single());

    let lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    pool.destroy(lease);
    assert!(!pool.is_connected());
    wait_until("the shared session to close", || driver.closes() == 1).await;

    let lease = pool.acquire(ConnectionRole::Write).await.unwrap();
    assert_eq!(driver.connects(), 2);
    pool.release(lease);
    pool.drain().await;
    assert_eq!(driver.open_connections(), 0);
    assert_eq!(driver.abandoned(), 0);
}

#[tokio::test]
async fn unusable_pool_policies_are_rejected() {
    let driver = MockDriver::new();
    for policy in [
        PoolConfig::default().max_connections(0),
        PoolConfig::default().max_connections(2).min_connections(3),
        PoolConfig::default().acquire_timeout(Some(Duration::ZERO)),
    ] {
        let err = ConnectionPool::new(Arc::new(driver.clone()), &oracle_config().pool(policy)).unwrap_err();
        assert!(matches!(err, SqlLoomError::ConfigError(_)), "{err}");
    }
    assert_eq!(driver.connects(), 0);
}

#[tokio::test]
async fn acquire_timeout_surfaces_as_pool_timeout() {
    let driver = MockDriver::new();
    let pool = pool(
        &driver,
        &oracle_config().pool(
            PoolConfig::default()
                .max_connections(1)
                .acquire_timeout(Some(Duration::from_millis(50))),
        ),
    );
    let held = pool.acquire(ConnectionRole::Write).await.unwrap();
    let err = pool.acquire(ConnectionRole::Write).await.unwrap_err();
    assert!(matches!(err, SqlLoomError::PoolTimeout));
    pool.release(held);
    pool.drain().await;
}
