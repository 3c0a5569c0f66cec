//! Shared node status, written by the checker and read by request handlers.
//!
//! The store holds an `Arc<NodeStatus>` behind a lock and replaces the whole
//! value on every commit. Readers clone the `Arc`, so a snapshot is never a mix
//! of two check cycles and holding one never delays the writer.

use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Latest known state of the broker node.
///
/// Field names on the wire are fixed by the load balancers that consume them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    #[serde(rename = "NodeAvailable")]
    pub available: bool,
    /// Start of the check cycle that produced this status, Unix ms
    #[serde(rename = "Timestamp")]
    pub timestamp_millis: i64,
    #[serde(rename = "HTTPResponseText")]
    pub http_response_text: String,
    #[serde(rename = "HTTPResponseCode")]
    pub http_response_code: u16,
}

/// What a single probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The broker answered; body kept verbatim for diagnostics
    Responded { status_code: u16, body: String },
    /// No HTTP response (request could not be built, connect error, timeout)
    Unreachable { error: String },
}

/// Result of one check cycle, committed to the store as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub timestamp_millis: i64,
    pub outcome: ProbeOutcome,
}

impl CheckResult {
    pub fn responded(timestamp_millis: i64, status_code: u16, body: impl Into<String>) -> Self {
        Self {
            timestamp_millis,
            outcome: ProbeOutcome::Responded {
                status_code,
                body: body.into(),
            },
        }
    }

    pub fn unreachable(timestamp_millis: i64, error: impl Into<String>) -> Self {
        Self {
            timestamp_millis,
            outcome: ProbeOutcome::Unreachable {
                error: error.into(),
            },
        }
    }

    /// Only a 200 counts as alive; the body is never inspected.
    pub fn is_available(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Responded { status_code: 200, .. })
    }
}

impl From<CheckResult> for NodeStatus {
    fn from(result: CheckResult) -> Self {
        let available = result.is_available();
        match result.outcome {
            ProbeOutcome::Responded { status_code, body } => NodeStatus {
                available,
                timestamp_millis: result.timestamp_millis,
                http_response_text: body,
                http_response_code: status_code,
            },
            ProbeOutcome::Unreachable { .. } => NodeStatus {
                available: false,
                timestamp_millis: result.timestamp_millis,
                ..Default::default()
            },
        }
    }
}

/// Process-wide holder of the latest [`NodeStatus`]. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    current: Arc<RwLock<Arc<NodeStatus>>>,
}

impl StatusStore {
    /// A store holding the zero status (unavailable, no response seen).
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current status with the outcome of a finished cycle.
    ///
    /// Returns the status that was replaced.
    pub fn commit(&self, result: CheckResult) -> Arc<NodeStatus> {
        let next = Arc::new(NodeStatus::from(result));
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }

    /// Consistent view of the last committed status.
    pub fn snapshot(&self) -> Arc<NodeStatus> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }
}
