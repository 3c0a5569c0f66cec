//! rabbitmq-checker: RabbitMQ node aliveness over HTTP.
//!
//! A background [`checker::CheckWorker`] polls the management API's aliveness
//! test and commits every result to a shared [`status::StatusStore`]. The
//! router built by [`routes::create_router`] answers `GET /` and `HEAD /` from
//! that store with 200 or 503, for load balancers and orchestrators.

pub mod checker;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod status;

pub use error::HandlerError;
