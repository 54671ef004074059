//! bpr-daemon library target.
//!
//! Exposes the router and state for integration tests; `main.rs` wires them
//! to Postgres and a TCP listener.

pub mod api_types;
pub mod routes;
pub mod state;
