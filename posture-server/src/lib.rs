//! # Posture Server
//!
//! HTTP front end for the Posture cloud security posture scanner: layered
//! configuration, the versioned collect/scan API, and the scheduled runner.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
