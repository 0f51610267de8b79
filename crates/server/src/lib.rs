//! Marquee display server library.
//!
//! Exposes the building blocks (config, state, protocol, routes, WebSocket
//! infrastructure) so integration tests and the binary entrypoint can both
//! access them.

pub mod config;
pub mod exercise;
pub mod forward;
pub mod protocol;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
