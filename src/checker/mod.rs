//! RabbitMQ aliveness checker.
//!
//! [`BrokerProbe`] performs a single `GET /api/aliveness-test/<vhost>` against the
//! management API and turns whatever happens into a [`CheckResult`]. The
//! [`worker`] module runs it on a fixed interval and commits each result to the
//! shared [`StatusStore`](crate::status::StatusStore).
//!
//! A probe never fails from the caller's point of view: transport errors are
//! logged and reported as an unreachable node.

pub mod worker;

use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::instrument;

use crate::config::{RabbitMqConfig, HEALTHCHECK_HEADER, HEALTHCHECK_HEADER_VALUE, USER_AGENT};
use crate::status::CheckResult;

pub use worker::CheckWorker;

#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP client bound to one broker's aliveness endpoint
#[derive(Debug, Clone)]
pub struct BrokerProbe {
    client: Client,
    url: String,
    authorization: String,
}

impl BrokerProbe {
    pub fn new(config: &RabbitMqConfig) -> Result<Self, CheckerError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: config.aliveness_url(),
            authorization: format!("Basic {}", config.basic_auth_token()),
        })
    }

    /// Target URL, for logging
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run one aliveness check.
    ///
    /// The result carries the time the check started, not when it finished.
    #[instrument(name = "checker.probe", skip(self), fields(url = %self.url))]
    pub async fn probe(&self) -> CheckResult {
        let started_at = Utc::now().timestamp_millis();

        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build aliveness request");
                return CheckResult::unreachable(started_at, e.to_string());
            }
        };

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, timeout = e.is_timeout(), "Aliveness request failed");
                return CheckResult::unreachable(started_at, e.to_string());
            }
        };

        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, status_code, "Failed to read aliveness response body");
                String::new()
            }
        };

        tracing::debug!(status_code, body = %body, "Broker responded");

        CheckResult::responded(started_at, status_code, body)
    }

    /// Fails when the URL or the credential cannot be put on the wire.
    fn build_request(&self) -> Result<reqwest::Request, reqwest::Error> {
        self.client
            .get(&self.url)
            .header(HEALTHCHECK_HEADER, HEALTHCHECK_HEADER_VALUE)
            .header(AUTHORIZATION, &self.authorization)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ProbeOutcome;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> RabbitMqConfig {
        let addr = server.address();
        RabbitMqConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            basic_auth: "Z3Vlc3Q6Z3Vlc3Q=".to_string(),
            timeout_ms: 500,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_probe_sends_identifying_and_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/aliveness-test/%2F"))
            .and(header("Healthcheck", "rabbitmq-checker"))
            .and(header("Authorization", "Basic Z3Vlc3Q6Z3Vlc3Q="))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let probe = BrokerProbe::new(&config_for(&server)).unwrap();
        let result = probe.probe().await;

        assert!(result.is_available());
        assert_eq!(
            result.outcome,
            ProbeOutcome::Responded {
                status_code: 200,
                body: r#"{"status":"ok"}"#.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_probe_non_200_is_unavailable_with_body_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("node down"))
            .mount(&server)
            .await;

        let probe = BrokerProbe::new(&config_for(&server)).unwrap();
        let result = probe.probe().await;

        assert!(!result.is_available());
        assert_eq!(
            result.outcome,
            ProbeOutcome::Responded {
                status_code: 503,
                body: "node down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(2000)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.timeout_ms = 100;
        let probe = BrokerProbe::new(&config).unwrap();
        let result = probe.probe().await;

        assert!(!result.is_available());
        assert!(matches!(result.outcome, ProbeOutcome::Unreachable { .. }));
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_unreachable() {
        // Bind then drop a listener to get a port nothing is listening on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = RabbitMqConfig {
            port,
            timeout_ms: 500,
            ..Default::default()
        };

        let before = Utc::now().timestamp_millis();
        let result = BrokerProbe::new(&config).unwrap().probe().await;

        assert!(matches!(result.outcome, ProbeOutcome::Unreachable { .. }));
        assert!(result.timestamp_millis >= before);
    }

    #[tokio::test]
    async fn test_probe_invalid_host_is_unreachable() {
        let config = RabbitMqConfig {
            host: "bad host name".to_string(),
            ..Default::default()
        };
        let result = BrokerProbe::new(&config).unwrap().probe().await;
        assert!(matches!(result.outcome, ProbeOutcome::Unreachable { .. }));
    }
}
