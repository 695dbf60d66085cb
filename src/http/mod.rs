//! HTTP operator console
//!
//! - GET /health - Health check
//! - GET /session/status - Current session snapshot
//! - POST /session/ready - Subject is ready (calibration or challenges)
//! - POST /session/stop-recording - Subject finished answering

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, OperatorCommand};
