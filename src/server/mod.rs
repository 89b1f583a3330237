//! Read-only HTTP status endpoint
//!
//! - `GET /health` - liveness
//! - `GET /status` - latest controller snapshot
//! - `GET /config` - effective scaling configuration

pub mod handlers;
pub mod state;

pub use handlers::create_router;
pub use state::StatusState;
