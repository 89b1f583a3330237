//! # queue-autoscaler
//!
//! Keeps the replica count of one workload proportional to the depth of a
//! work queue. Every poll interval the queue depth is sampled; at or above
//! the scale-up threshold the replica count grows, at or below the
//! scale-down threshold it shrinks, always within `[min, max]` and never
//! more often than each direction's cooldown allows.
//!
//! - [`scaling`]: the decision engine (calculator, cooldowns, loop)
//! - [`adapters`]: queue and workload collaborators
//! - [`config`]: configuration types, file loading and validation
//! - [`server`]: optional read-only status endpoint
//! - [`cli`]: command-line flags

pub mod adapters;
pub mod cli;
pub mod config;
pub mod scaling;
pub mod server;

pub use adapters::{AdapterError, QueueDepthSource, WorkloadScaler};
pub use config::{AppConfig, AutoscalerConfig, ConfigError};
pub use scaling::{
    compute, spawn_controller, Controller, ControllerStatus, CooldownTracker, Direction,
    DirectionOutcome, Operator, ScaleDecision, ScalingRule, TickOutcome,
};
