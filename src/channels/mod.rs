//! Front ends: the WebSocket/REST server and the terminal REPL.

pub mod cli;
pub mod ws;

pub use ws::{AppState, session_routes};
