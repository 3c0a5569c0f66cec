//! Configuration loading and constants.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file, then
//! command-line flags and environment variables (applied by `main` through
//! [`Overrides`]). `AppConfig` is the root struct and is immutable once the
//! process has started.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use const_format::formatcp;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Broker Probe Constants
// =============================================================================

/// Management API prefix of the aliveness check; the vhost is appended
pub const ALIVENESS_PATH_PREFIX: &str = "/api/aliveness-test";

/// Header sent with every probe so broker-side logs can tell checks apart
pub const HEALTHCHECK_HEADER: &str = "Healthcheck";

/// Value of [`HEALTHCHECK_HEADER`]
pub const HEALTHCHECK_HEADER_VALUE: &str = "rabbitmq-checker";

/// User agent of the probe client
pub const USER_AGENT: &str = formatcp!("rabbitmq-checker/{}", env!("CARGO_PKG_VERSION"));

/// Cache-Control value for status responses; probes must never see a cached answer
pub const CACHE_CONTROL_STATUS: &str = "no-store";

// =============================================================================
// Defaults
// =============================================================================

pub const DEFAULT_LISTEN: &str = "0.0.0.0:9672";
pub const DEFAULT_WEB_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 2048;
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_CHECK_FAIL_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_RABBITMQ_HOST: &str = "127.0.0.1";
pub const DEFAULT_RABBITMQ_PORT: u16 = 15672;
pub const DEFAULT_RABBITMQ_VHOST: &str = "/";
pub const DEFAULT_RABBITMQ_TIMEOUT_MS: u64 = 5000;

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "rabbitmq_checker=info,tower_http=info";

/// Log filter used when `logging.debug` is set
pub const DEBUG_LOG_FILTER: &str = "rabbitmq_checker=debug,tower_http=debug";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub rabbitmq: RabbitMqConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address; a bare `:port` binds all interfaces
    pub listen: String,
    /// Request body read timeout, ms
    pub read_timeout_ms: u64,
    /// Time allowed to produce a response, ms
    pub write_timeout_ms: u64,
    /// Maximum number of requests served at once
    pub max_concurrency: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            read_timeout_ms: DEFAULT_WEB_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WEB_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl WebConfig {
    /// Resolve the listen address. Accepts `host:port` and `:port`.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let listen = self.listen.trim();
        let normalized = match listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port),
            None => listen.to_string(),
        };
        normalized.parse().map_err(|e| {
            ConfigError::Validation(format!("Invalid web.listen '{}': {}", self.listen, e))
        })
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Check loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Report the node as available regardless of probe results
    pub force_enabled: bool,
    /// Delay between probes, ms
    pub interval_ms: u64,
    /// Accepted for compatibility; no logic consumes it yet
    pub fail_timeout_ms: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            force_enabled: false,
            interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            fail_timeout_ms: DEFAULT_CHECK_FAIL_TIMEOUT_MS,
        }
    }
}

impl CheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// RabbitMQ management API connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RabbitMqConfig {
    pub host: String,
    /// Management (web) port
    pub port: u16,
    /// Virtual host to exercise; percent-encoded into the probe path
    pub vhost: String,
    /// Pre-encoded Basic Auth token (`base64(user:password)`)
    pub basic_auth: String,
    /// Used to derive the token when `basic_auth` is empty
    pub username: Option<String>,
    pub password: Option<String>,
    /// Probe request timeout, ms
    pub timeout_ms: u64,
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RABBITMQ_HOST.to_string(),
            port: DEFAULT_RABBITMQ_PORT,
            vhost: DEFAULT_RABBITMQ_VHOST.to_string(),
            basic_auth: String::new(),
            username: None,
            password: None,
            timeout_ms: DEFAULT_RABBITMQ_TIMEOUT_MS,
        }
    }
}

impl RabbitMqConfig {
    /// Full URL of the aliveness check for the configured vhost
    pub fn aliveness_url(&self) -> String {
        format!(
            "http://{}:{}{}/{}",
            self.host,
            self.port,
            ALIVENESS_PATH_PREFIX,
            urlencoding::encode(&self.vhost)
        )
    }

    /// Basic Auth token, preferring the pre-encoded form
    pub fn basic_auth_token(&self) -> String {
        if !self.basic_auth.is_empty() {
            return self.basic_auth.clone();
        }
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => BASE64.encode(format!("{}:{}", user, pass)),
            _ => String::new(),
        }
    }

    /// Check if any credential is configured
    pub fn has_credentials(&self) -> bool {
        !self.basic_auth_token().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    pub format: String,
    /// Verbose logging, including every broker response
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
            debug: false,
        }
    }
}

impl LoggingConfig {
    /// Filter used when neither the CLI nor RUST_LOG provide one
    pub fn default_filter(&self) -> &'static str {
        if self.debug {
            DEBUG_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// `None` leaves the file (or default) value untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub web_listen: Option<String>,
    pub web_read_timeout_ms: Option<u64>,
    pub web_write_timeout_ms: Option<u64>,
    pub web_max_concurrency: Option<usize>,
    pub check_force_enabled: Option<bool>,
    pub check_interval_ms: Option<u64>,
    pub check_fail_timeout_ms: Option<u64>,
    pub rabbitmq_host: Option<String>,
    pub rabbitmq_port: Option<u16>,
    pub rabbitmq_vhost: Option<String>,
    pub rabbitmq_basic_auth: Option<String>,
    pub rabbitmq_username: Option<String>,
    pub rabbitmq_password: Option<String>,
    pub rabbitmq_timeout_ms: Option<u64>,
    pub log_format: Option<String>,
    pub debug: Option<bool>,
}

impl AppConfig {
    /// Load from a TOML file. Missing sections and keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise start from defaults, then apply
    /// overrides and validate.
    pub fn resolve<P: AsRef<Path>>(
        path: Option<P>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, o: Overrides) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut self.web.listen, o.web_listen);
        set(&mut self.web.read_timeout_ms, o.web_read_timeout_ms);
        set(&mut self.web.write_timeout_ms, o.web_write_timeout_ms);
        set(&mut self.web.max_concurrency, o.web_max_concurrency);
        set(&mut self.check.force_enabled, o.check_force_enabled);
        set(&mut self.check.interval_ms, o.check_interval_ms);
        set(&mut self.check.fail_timeout_ms, o.check_fail_timeout_ms);
        set(&mut self.rabbitmq.host, o.rabbitmq_host);
        set(&mut self.rabbitmq.port, o.rabbitmq_port);
        set(&mut self.rabbitmq.vhost, o.rabbitmq_vhost);
        set(&mut self.rabbitmq.basic_auth, o.rabbitmq_basic_auth);
        if o.rabbitmq_username.is_some() {
            self.rabbitmq.username = o.rabbitmq_username;
        }
        if o.rabbitmq_password.is_some() {
            self.rabbitmq.password = o.rabbitmq_password;
        }
        set(&mut self.rabbitmq.timeout_ms, o.rabbitmq_timeout_ms);
        set(&mut self.logging.format, o.log_format);
        set(&mut self.logging.debug, o.debug);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.web.listen_addr()?;

        if self.check.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "check.interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.rabbitmq.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "rabbitmq.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.web.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "web.max_concurrency must be greater than zero".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got \"{}\"",
                other
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
