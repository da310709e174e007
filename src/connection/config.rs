use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Address and credentials of one backing store.
///
/// Supplied by the surrounding application's configuration loader; nothing in
/// here is ever hard-coded by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store host name or address
    pub host: String,

    /// Store port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,

    /// Whether the connection must be TLS-protected
    pub require_tls: bool,
}

impl StoreConfig {
    pub fn new(database: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: database.to_string(),
            username: String::new(),
            password: String::new(),
            require_tls: false,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn require_tls(mut self, required: bool) -> Self {
        self.require_tls = required;
        self
    }
}

/// Resilience settings for the dual-store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Authoritative remote store
    pub primary: StoreConfig,

    /// Optional best-effort local fallback store
    pub secondary: Option<StoreConfig>,

    /// Minimum interval between reconnect attempts while both stores are down
    #[serde(with = "duration_secs")]
    pub reconnect_interval: Duration,

    /// Per-attempt timeout for connect, probe and statement execution
    #[serde(with = "duration_secs")]
    pub operation_timeout: Duration,
}

impl ClientConfig {
    pub fn new(primary: StoreConfig) -> Self {
        Self {
            primary,
            secondary: None,
            reconnect_interval: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(4),
        }
    }

    pub fn secondary(mut self, secondary: StoreConfig) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
