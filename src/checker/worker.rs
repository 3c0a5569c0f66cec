//! Background loop that keeps the status store current.
//!
//! Each cycle sleeps for the configured interval, probes the broker once and
//! commits the result, success or not. There is no retry inside a cycle and no
//! backoff; the next cycle is the retry. The loop only ends when its
//! cancellation token fires.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::AppConfig;
use crate::status::{ProbeOutcome, StatusStore};

use super::{BrokerProbe, CheckerError};

/// Periodic aliveness checker, the only writer of the status store
pub struct CheckWorker {
    probe: BrokerProbe,
    store: StatusStore,
    interval: Duration,
}

impl CheckWorker {
    pub fn new(probe: BrokerProbe, store: StatusStore, interval: Duration) -> Self {
        Self {
            probe,
            store,
            interval,
        }
    }

    /// Build a worker for the broker described in `config`.
    pub fn from_config(config: &AppConfig, store: StatusStore) -> Result<Self, CheckerError> {
        let probe = BrokerProbe::new(&config.rabbitmq)?;
        Ok(Self::new(probe, store, config.check.interval()))
    }

    /// Spawn the loop onto the runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run cycles until `shutdown` is cancelled.
    #[instrument(
        name = "checker.worker",
        skip(self, shutdown),
        fields(url = %self.probe.url(), interval_ms = self.interval.as_millis() as u64)
    )]
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Checker starting");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.probe.probe() => result,
            };

            if let ProbeOutcome::Unreachable { error } = &result.outcome {
                tracing::debug!(error = %error, "Broker unreachable, marking node unavailable");
            }

            let available = result.is_available();
            let previous = self.store.commit(result);

            if previous.available != available {
                if available {
                    tracing::info!("Node became available");
                } else {
                    tracing::warn!(
                        last_code = previous.http_response_code,
                        "Node became unavailable"
                    );
                }
            }
        }

        tracing::info!("Checker stopped");
    }
}
