//! # Autoscaling decision engine
//!
//! Keeps one workload's replica count in step with a queue's depth.
//!
//! ```text
//!   ┌──────────────────┐   sample()   ┌──────────────────────────────┐
//!   │ QueueDepthSource │ ───────────▶ │          Controller          │
//!   └──────────────────┘              │  tick: SAMPLE → UP → DOWN    │
//!                                     │                              │
//!   ┌──────────────────┐  get / set   │  CooldownTracker  compute()  │
//!   │  WorkloadScaler  │ ◀──────────▶ │                              │
//!   └──────────────────┘              └──────────────────────────────┘
//! ```
//!
//! Each tick samples the depth once, then evaluates scale-up and scale-down
//! independently. A direction fires when its threshold is met and it is not
//! cooling down; the new count comes from [`compute`] and is written only
//! when it differs from the current one. The cooldown clock for a direction
//! restarts only after the workload accepted a changed count.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod calculator;
pub mod clock;
pub mod controller;
pub mod cooldown;

pub use calculator::{compute, Operator, ScalingRule};
pub use clock::{Clock, ManualClock, TokioClock};
pub use controller::{
    spawn_controller, Controller, ControllerStatus, DirectionOutcome, ScaleError, ScaleEvent,
    TickOutcome,
};
pub use cooldown::CooldownTracker;

/// Sense of a scaling adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// A replica change computed within one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleDecision {
    pub direction: Direction,
    pub current_replicas: u32,
    pub new_replicas: u32,
}

impl ScaleDecision {
    /// False when the calculator left the count where it was
    pub fn changes(&self) -> bool {
        self.new_replicas != self.current_replicas
    }
}
