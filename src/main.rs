//! rabbitmq-checker: exposes RabbitMQ node aliveness to load balancers.
//!
//! This is the application entry point. It resolves configuration from an
//! optional TOML file, flags and environment, initializes tracing, starts the
//! checker worker, and serves the status endpoint until SIGTERM/SIGINT.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rabbitmq_checker::checker::CheckWorker;
use rabbitmq_checker::config::{AppConfig, Overrides, DEFAULT_CHECK_FAIL_TIMEOUT_MS};
use rabbitmq_checker::http::{setup_shutdown_handler, start_server};
use rabbitmq_checker::routes::create_router;
use rabbitmq_checker::state::AppState;
use rabbitmq_checker::status::StatusStore;

/// rabbitmq-checker: RabbitMQ node aliveness over HTTP
#[derive(Parser, Debug)]
#[command(name = "rabbitmq-checker", version, about)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "CHECKER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "rabbitmq_checker=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Web server listening interface and port
    #[arg(long, env = "WEB_LISTEN")]
    web_listen: Option<String>,

    /// Web server request read timeout, ms
    #[arg(long, env = "WEB_READ_TIMEOUT")]
    web_read_timeout: Option<u64>,

    /// Web server request write timeout, ms
    #[arg(long, env = "WEB_WRITE_TIMEOUT")]
    web_write_timeout: Option<u64>,

    /// Maximum number of requests served at once
    #[arg(long, env = "WEB_MAX_CONCURRENCY")]
    web_max_concurrency: Option<usize>,

    /// Ignore the status of the checks and always mark the node as available
    #[arg(long, env = "CHECK_FORCE_ENABLED", value_parser = BoolishValueParser::new())]
    check_force_enabled: Option<bool>,

    /// RabbitMQ checks interval, ms
    #[arg(long, env = "CHECK_INTERVAL")]
    check_interval: Option<u64>,

    /// Mark the node unavailable if no check succeeded within this time, ms (not enforced)
    #[arg(long, env = "CHECK_FAIL_TIMEOUT")]
    check_fail_timeout: Option<u64>,

    /// RabbitMQ host address
    #[arg(long, env = "RABBITMQ_HOST")]
    rabbitmq_host: Option<String>,

    /// RabbitMQ management port
    #[arg(long, env = "RABBITMQ_WEB_PORT")]
    rabbitmq_web_port: Option<u16>,

    /// Virtual host to run the aliveness test against
    #[arg(long, env = "RABBITMQ_VHOST")]
    rabbitmq_vhost: Option<String>,

    /// RabbitMQ management Basic Auth token (base64 of user:password)
    #[arg(long, env = "RABBITMQ_BASIC_AUTH", hide_env_values = true)]
    rabbitmq_basic_auth: Option<String>,

    /// RabbitMQ management user, used when no Basic Auth token is given
    #[arg(long, env = "RABBITMQ_USER")]
    rabbitmq_user: Option<String>,

    /// RabbitMQ management password, used when no Basic Auth token is given
    #[arg(long, env = "RABBITMQ_PASSWORD", hide_env_values = true)]
    rabbitmq_password: Option<String>,

    /// Aliveness request timeout, ms
    #[arg(long, env = "RABBITMQ_TIMEOUT")]
    rabbitmq_timeout: Option<u64>,

    /// Log format: text or json
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<String>,

    /// Debug logs
    #[arg(long, env = "DEBUG", value_parser = BoolishValueParser::new())]
    debug: Option<bool>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            web_listen: self.web_listen.clone(),
            web_read_timeout_ms: self.web_read_timeout,
            web_write_timeout_ms: self.web_write_timeout,
            web_max_concurrency: self.web_max_concurrency,
            check_force_enabled: self.check_force_enabled,
            check_interval_ms: self.check_interval,
            check_fail_timeout_ms: self.check_fail_timeout,
            rabbitmq_host: self.rabbitmq_host.clone(),
            rabbitmq_port: self.rabbitmq_web_port,
            rabbitmq_vhost: self.rabbitmq_vhost.clone(),
            rabbitmq_basic_auth: self.rabbitmq_basic_auth.clone(),
            rabbitmq_username: self.rabbitmq_user.clone(),
            rabbitmq_password: self.rabbitmq_password.clone(),
            rabbitmq_timeout_ms: self.rabbitmq_timeout,
            log_format: self.log_format.clone(),
            debug: self.debug,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration: defaults < file < env/CLI
    let config = AppConfig::resolve(args.config.as_ref(), args.overrides())?;

    // Initialize tracing with priority: CLI > env > config
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.logging.default_filter().to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        listen = %config.web.listen,
        interval_ms = config.check.interval_ms,
        force_enabled = config.check.force_enabled,
        "Loaded configuration"
    );
    tracing::info!(
        url = %config.rabbitmq.aliveness_url(),
        timeout_ms = config.rabbitmq.timeout_ms,
        has_auth = config.rabbitmq.has_credentials(),
        "RabbitMQ broker configured"
    );

    if config.check.force_enabled {
        tracing::warn!("Force enabled: node is reported available regardless of check results");
    }
    if config.check.fail_timeout_ms != DEFAULT_CHECK_FAIL_TIMEOUT_MS {
        tracing::warn!(
            fail_timeout_ms = config.check.fail_timeout_ms,
            "check.fail_timeout_ms is accepted but not enforced; every check result is reported as-is"
        );
    }

    let addr = config.web.listen_addr()?;
    let shutdown = CancellationToken::new();
    setup_shutdown_handler(shutdown.clone());

    // Status store shared by the checker (writer) and the handlers (readers)
    let store = StatusStore::new();
    let checker = CheckWorker::from_config(&config, store.clone())?.spawn(shutdown.clone());

    let state = AppState::new(config, store);
    let app = create_router(state);

    start_server(app, addr, shutdown.clone()).await?;

    shutdown.cancel();
    if let Err(e) = checker.await {
        tracing::error!(error = %e, "Checker task failed");
    }

    Ok(())
}
