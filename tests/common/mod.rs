#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sql_loom::prelude::*;
use sql_loom::test_utils::MockDriver;

pub fn users() -> Arc<ModelMeta> {
    ModelMeta::new("users", "users")
        .attribute(AttributeMeta::id("id"))
        .attribute(AttributeMeta::new("name", DataType::String(None)))
        .attribute(AttributeMeta::new("email", DataType::String(None)).unique())
        .into_shared()
}

pub fn posts() -> Arc<ModelMeta> {
    ModelMeta::new("posts", "posts")
        .attribute(AttributeMeta::id("id"))
        .attribute(AttributeMeta::new("user_id", DataType::Integer))
        .attribute(AttributeMeta::new("title", DataType::String(None)))
        .into_shared()
}

pub fn oracle_config() -> ConnectionConfig {
    ConnectionConfig::new(Dialect::Oracle, ConnectTarget::new("primary", "XEPDB1"))
}

pub fn manager(driver: &MockDriver, config: ConnectionConfig) -> ConnectionManager {
    ConnectionManager::new(Arc::new(driver.clone()), config).unwrap()
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
