//! Live pointer-sharing relay for collaborative mindmap documents.
//!
//! Connections join a document session over WebSocket and every cursor
//! move is fanned out to the other viewers of the same document.

pub mod config;
pub mod frame;
pub mod logging;
pub mod routes;
pub mod services;
pub mod state;
