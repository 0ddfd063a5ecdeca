//! Read-only service surfaces over the control plane.

pub mod health_server;

pub use health_server::{HealthServer, ServerState};
