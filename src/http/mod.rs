//! HTTP server module.
//!
//! Binds the listener, serves the router and drains in-flight requests when a
//! shutdown signal arrives. The same cancellation token also stops the checker.

mod server;
mod shutdown;

pub use server::{serve, start_server, ServerError};
pub use shutdown::setup_shutdown_handler;
