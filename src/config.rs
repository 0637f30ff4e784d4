//! Connection, pool and replication settings.
//!
//! All structs deserialize from JSON with every field optional; durations are
//! written as milliseconds.
//!
//! ```rust
//! use sql_loom::prelude::*;
//!
//! let config = ConnectionConfig::new(
//!     Dialect::Oracle,
//!     ConnectTarget::new("db.internal", "ORCLPDB1").credentials("app", "secret"),
//! )
//! .pool(PoolConfig::default().max_connections(4));
//! assert_eq!(config.target.connect_string(Dialect::Oracle), "//db.internal:1521/ORCLPDB1");
//! ```

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::types::Dialect;

/// Where one backend session connects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectTarget {
    pub host: String,
    /// Falls back to the dialect's default port.
    pub port: Option<u16>,
    /// Database or service name. A value containing `DESCRIPTION=` is a full
    /// TNS descriptor and is used as the connect string verbatim.
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Passed through to the driver untouched.
    pub dialect_options: Map<String, JsonValue>,
}

impl ConnectTarget {
    #[must_use]
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn dialect_option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.dialect_options.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn connect_string(&self, dialect: Dialect) -> String {
        if self.database.contains("DESCRIPTION=") {
            return self.database.clone();
        }
        let port = self.port.unwrap_or_else(|| dialect.default_port());
        format!("//{}:{port}/{}", self.host, self.database)
    }
}

/// Pool sizing and reaping policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Idle connections above `min_connections` are closed after this long.
    #[serde(with = "millis")]
    pub max_idle_time: Duration,
    /// Destroy a connection whose statement failed with `PROTOCOL_CONNECTION_LOST`.
    pub handle_disconnects: bool,
    /// Ping cached connections before handing them out.
    pub validate: bool,
    /// `None` waits indefinitely for a free connection.
    #[serde(with = "opt_millis")]
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            max_idle_time: Duration::from_millis(1000),
            handle_disconnects: false,
            validate: true,
            acquire_timeout: None,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    #[must_use]
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    #[must_use]
    pub fn max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time = idle;
        self
    }

    #[must_use]
    pub fn handle_disconnects(mut self, enabled: bool) -> Self {
        self.handle_disconnects = enabled;
        self
    }

    #[must_use]
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Read replicas plus the single write primary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Read replicas, used round-robin. Empty means reads go to `write`.
    pub read: Vec<ConnectTarget>,
    pub write: ConnectTarget,
}

/// Everything needed to open connections and run the execution queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    pub target: ConnectTarget,
    /// `None` runs in single-connection mode: one lazily opened, shared session.
    pub pool: Option<PoolConfig>,
    /// Overrides `target` with separate read and write pools.
    pub replication: Option<ReplicationConfig>,
    pub max_concurrent_queries: usize,
    /// When false, jobs skip admission control and run immediately.
    pub queue: bool,
    /// Session time zone timestamps are converted into, written as `+HH:MM`.
    #[serde(with = "offset")]
    pub time_zone: FixedOffset,
    /// When false, identifiers are emitted bare and fold to the backend's case.
    pub quote_identifiers: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Oracle,
            target: ConnectTarget::default(),
            pool: Some(PoolConfig::default()),
            replication: None,
            max_concurrent_queries: 50,
            queue: true,
            time_zone: Utc.fix(),
            quote_identifiers: true,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(dialect: Dialect, target: ConnectTarget) -> Self {
        Self {
            dialect,
            target,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn single_connection(mut self) -> Self {
        self.pool = None;
        self
    }

    #[must_use]
    pub fn replication(mut self, replication: ReplicationConfig) -> Self {
        self.replication = Some(replication);
        self
    }

    #[must_use]
    pub fn max_concurrent_queries(mut self, max: usize) -> Self {
        self.max_concurrent_queries = max;
        self
    }

    #[must_use]
    pub fn queue(mut self, enabled: bool) -> Self {
        self.queue = enabled;
        self
    }

    #[must_use]
    pub fn time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = time_zone;
        self
    }

    #[must_use]
    pub fn quote_identifiers(mut self, enabled: bool) -> Self {
        self.quote_identifiers = enabled;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod offset {
    use chrono::{DateTime, FixedOffset};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Accepts `+HH:MM`, `-HH:MM` or `Z`.
    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedOffset, D::Error> {
        let text = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&format!("2000-01-01T00:00:00{text}"))
            .map(|date| *date.offset())
            .map_err(|_| D::Error::custom(format!("invalid time zone offset \"{text}\"")))
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tns_descriptors_pass_through() {
        let target = ConnectTarget::new(
            "ignored",
            "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=db)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=x)))",
        );
        assert!(target.connect_string(Dialect::Oracle).starts_with("(DESCRIPTION="));
        assert_eq!(
            ConnectTarget::new("db", "XE").port(1600).connect_string(Dialect::Oracle),
            "//db:1600/XE"
        );
    }

    #[test]
    fn json_config_fills_defaults() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"dialect":"oracle","target":{"host":"h","database":"d"},"pool":{"max_connections":3,"max_idle_time":250}}"#,
        )
        .unwrap();
        let pool = config.pool.unwrap();
        assert_eq!(pool.max_connections, 3);
        assert_eq!(pool.max_idle_time, Duration::from_millis(250));
        assert!(pool.validate);
        assert_eq!(pool.acquire_timeout, None);
        assert_eq!(config.max_concurrent_queries, 50);
        assert!(config.queue);
        assert_eq!(config.time_zone, Utc.fix());
        assert!(config.quote_identifiers);
    }

    #[test]
    fn json_config_reads_session_settings() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"dialect":"postgres","time_zone":"+05:30","quote_identifiers":false}"#,
        )
        .unwrap();
        assert_eq!(config.time_zone, FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap());
        assert!(!config.quote_identifiers);
        let written = serde_json::to_value(&config).unwrap();
        assert_eq!(written["time_zone"], "+05:30");

        let bad = serde_json::from_str::<ConnectionConfig>(r#"{"time_zone":"Europe/Paris"}"#);
        assert!(bad.is_err());
    }
}
