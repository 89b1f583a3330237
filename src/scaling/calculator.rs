//! Replica-count arithmetic
//!
//! Pure functions only: given the current replica count and a direction,
//! apply the configured operator and amount, then clamp into the replica
//! bounds. No I/O, no state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Direction;
use crate::config::{AutoscalerConfig, ConfigError};

/// Arithmetic applied to the current replica count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    /// `current + amount`
    Add,
    /// `current - amount`
    Subtract,
    /// `current * amount`
    Multiply,
    /// `current / amount`
    Divide,
}

impl Operator {
    /// The symbol used on the command line and in config files
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
        }
    }

    /// Apply the operator in floating point
    pub fn apply(&self, current: f64, amount: f64) -> f64 {
        match self {
            Operator::Add => current + amount,
            Operator::Subtract => current - amount,
            Operator::Multiply => current * amount,
            Operator::Divide => current / amount,
        }
    }
}

impl FromStr for Operator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Operator::Add),
            "-" => Ok(Operator::Subtract),
            "*" => Ok(Operator::Multiply),
            "/" => Ok(Operator::Divide),
            other => Err(ConfigError::InvalidOperator(other.to_string())),
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.symbol().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operator and amount for one scaling direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalingRule {
    pub operator: Operator,
    pub amount: f64,
}

impl ScalingRule {
    pub fn new(operator: Operator, amount: f64) -> Self {
        Self { operator, amount }
    }

    /// `+ 1`, the default scale-up rule
    pub fn default_up() -> Self {
        Self::new(Operator::Add, 1.0)
    }

    /// `- 1`, the default scale-down rule
    pub fn default_down() -> Self {
        Self::new(Operator::Subtract, 1.0)
    }
}

impl fmt::Display for ScalingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator, self.amount)
    }
}

/// Compute the replica count a scale in `direction` should produce.
///
/// The raw result is truncated toward zero and then clamped into
/// `[min_replicas, max_replicas]`. Returning `current` means no change.
/// Total over every configuration accepted by [`AutoscalerConfig::validate`].
pub fn compute(current: u32, direction: Direction, config: &AutoscalerConfig) -> u32 {
    let rule = config.rule(direction);
    let raw = rule.operator.apply(current as f64, rule.amount).trunc();

    raw.clamp(config.min_replicas as f64, config.max_replicas as f64) as u32
}
