//! NEXUS Trainer: retail sales role-play against a simulated customer.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod scenario;
pub mod session;
