//! Node status endpoint for load balancers and orchestrators.
//!
//! Answers `GET /` and `HEAD /` from the last committed check result. The
//! handler never waits on the checker: it takes a snapshot of the store and
//! decides from that alone.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::HandlerError;
use crate::state::AppState;
use crate::status::NodeStatus;

/// Why the endpoint answered the way it did. Serialized as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i8")]
pub enum ReasonCode {
    InternalError = -1,
    Ok = 0,
    ForceEnabled = 1,
    NotOk = 2,
}

impl From<ReasonCode> for i8 {
    fn from(code: ReasonCode) -> Self {
        code as i8
    }
}

/// Outcome of applying the availability policy to a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub status: StatusCode,
    pub reason_code: ReasonCode,
    pub reason_text: &'static str,
}

/// First match wins: forced, then unavailable, then OK.
pub fn decide(force_enabled: bool, node: &NodeStatus) -> Decision {
    if force_enabled {
        Decision {
            status: StatusCode::OK,
            reason_code: ReasonCode::ForceEnabled,
            reason_text: "Force enabled",
        }
    } else if !node.available {
        Decision {
            status: StatusCode::SERVICE_UNAVAILABLE,
            reason_code: ReasonCode::NotOk,
            reason_text: "Node isn't available",
        }
    } else {
        Decision {
            status: StatusCode::OK,
            reason_code: ReasonCode::Ok,
            reason_text: "OK",
        }
    }
}

/// Body of a `GET /` response
#[derive(Debug, Serialize)]
pub struct StatusResponse<'a> {
    #[serde(flatten)]
    pub node: &'a NodeStatus,
    #[serde(rename = "ReasonText")]
    pub reason_text: &'static str,
    #[serde(rename = "ReasonCode")]
    pub reason_code: ReasonCode,
}

impl<'a> StatusResponse<'a> {
    pub fn new(node: &'a NodeStatus, decision: &Decision) -> Self {
        Self {
            node,
            reason_text: decision.reason_text,
            reason_code: decision.reason_code,
        }
    }
}

/// Status handler for `GET /` and `HEAD /`.
pub async fn status(State(state): State<AppState>, method: Method) -> Response {
    let node = state.store.snapshot();
    let decision = decide(state.config.check.force_enabled, &node);

    tracing::debug!(
        status = decision.status.as_u16(),
        reason_code = ?decision.reason_code,
        "Node status served"
    );

    render(&method, decision.status, &StatusResponse::new(&node, &decision))
}

/// Serialize `body` for GET; HEAD gets the status line and headers only.
pub fn render<T: Serialize>(method: &Method, status: StatusCode, body: &T) -> Response {
    let headers = [(CONTENT_TYPE, "application/json")];

    if *method == Method::HEAD {
        return (status, headers).into_response();
    }

    match serde_json::to_vec(body) {
        Ok(json) => (status, headers, json).into_response(),
        Err(e) => HandlerError::from(e).into_response(),
    }
}
