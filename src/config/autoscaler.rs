//! Controller configuration
//!
//! [`AutoscalerConfig`] holds everything the decision engine needs: poll
//! interval, thresholds, cooldowns, replica bounds and the scaling rules.
//! [`AppConfig`] adds the adapter settings the binary needs to reach the
//! queue and the workload. Both deserialize from camelCase JSON/YAML with
//! human-readable durations ("5s", "1m30s").

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::scaling::{Direction, ScalingRule};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_SCALE_UP_COOLDOWN: Duration = Duration::from_secs(10);
pub const DEFAULT_SCALE_DOWN_COOLDOWN: Duration = Duration::from_secs(30);
pub const DEFAULT_SCALE_UP_THRESHOLD: u64 = 100;
pub const DEFAULT_SCALE_DOWN_THRESHOLD: u64 = 10;
pub const DEFAULT_MIN_REPLICAS: u32 = 1;
pub const DEFAULT_MAX_REPLICAS: u32 = 5;

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_scale_up_cooldown() -> Duration {
    DEFAULT_SCALE_UP_COOLDOWN
}

fn default_scale_down_cooldown() -> Duration {
    DEFAULT_SCALE_DOWN_COOLDOWN
}

fn default_scale_up_threshold() -> u64 {
    DEFAULT_SCALE_UP_THRESHOLD
}

fn default_scale_down_threshold() -> u64 {
    DEFAULT_SCALE_DOWN_THRESHOLD
}

fn default_min_replicas() -> u32 {
    DEFAULT_MIN_REPLICAS
}

fn default_max_replicas() -> u32 {
    DEFAULT_MAX_REPLICAS
}

fn default_namespace() -> String {
    "default".to_string()
}


/// Thresholds, bounds, timings and scaling rules for one controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerConfig {
    /// Time between queue samples
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Scale up when depth >= this
    #[serde(default = "default_scale_up_threshold")]
    pub scale_up_threshold: u64,

    /// Scale down when depth <= this
    #[serde(default = "default_scale_down_threshold")]
    pub scale_down_threshold: u64,

    #[serde(with = "humantime_serde", default = "default_scale_up_cooldown")]
    pub scale_up_cooldown: Duration,

    #[serde(with = "humantime_serde", default = "default_scale_down_cooldown")]
    pub scale_down_cooldown: Duration,

    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,

    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,

    #[serde(default = "ScalingRule::default_up")]
    pub scale_up: ScalingRule,

    #[serde(default = "ScalingRule::default_down")]
    pub scale_down: ScalingRule,

    /// Upper bound on each queue/workload call; unbounded when unset
    #[serde(
        with = "humantime_serde",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub call_timeout: Option<Duration>,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            scale_up_threshold: DEFAULT_SCALE_UP_THRESHOLD,
            scale_down_threshold: DEFAULT_SCALE_DOWN_THRESHOLD,
            scale_up_cooldown: DEFAULT_SCALE_UP_COOLDOWN,
            scale_down_cooldown: DEFAULT_SCALE_DOWN_COOLDOWN,
            min_replicas: DEFAULT_MIN_REPLICAS,
            max_replicas: DEFAULT_MAX_REPLICAS,
            scale_up: ScalingRule::default_up(),
            scale_down: ScalingRule::default_down(),
            call_timeout: None,
        }
    }
}

impl AutoscalerConfig {
    /// Check the invariants the calculator and loop rely on.
    ///
    /// Overlapping thresholds are allowed; see [`Self::thresholds_overlap`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.max_replicas < self.min_replicas {
            return Err(ConfigError::InvalidReplicaBounds {
                min: self.min_replicas,
                max: self.max_replicas,
            });
        }

        for direction in [Direction::Up, Direction::Down] {
            let amount = self.rule(direction).amount;
            if !amount.is_finite() || amount <= 0.0 {
                return Err(ConfigError::InvalidAmount { direction, amount });
            }
        }

        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::InvalidCallTimeout);
        }

        Ok(())
    }

    /// Whether a single depth can trigger both directions
    pub fn thresholds_overlap(&self) -> bool {
        self.scale_down_threshold >= self.scale_up_threshold
    }

    pub fn threshold(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Up => self.scale_up_threshold,
            Direction::Down => self.scale_down_threshold,
        }
    }

    /// Whether `depth` calls for a scale in `direction`
    pub fn triggers(&self, direction: Direction, depth: u64) -> bool {
        match direction {
            Direction::Up => depth >= self.scale_up_threshold,
            Direction::Down => depth <= self.scale_down_threshold,
        }
    }

    pub fn cooldown(&self, direction: Direction) -> Duration {
        match direction {
            Direction::Up => self.scale_up_cooldown,
            Direction::Down => self.scale_down_cooldown,
        }
    }

    pub fn rule(&self, direction: Direction) -> &ScalingRule {
        match direction {
            Direction::Up => &self.scale_up,
            Direction::Down => &self.scale_down,
        }
    }
}

/// Where the queue depth comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    /// Endpoint returning the depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Dotted JSON path to the depth in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_field: Option<String>,
}

/// The Deployment whose replicas are managed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Kubeconfig to load; inferred (`$KUBECONFIG`, `~/.kube/config`,
    /// in-cluster service account) when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context; the current context when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            deployment: None,
            namespace: default_namespace(),
            kubeconfig: None,
            context: None,
        }
    }
}

/// Full configuration of the binary: one queue, one workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(flatten)]
    pub scaling: AutoscalerConfig,

    #[serde(default)]
    pub queue: QueueSettings,

    #[serde(default)]
    pub workload: WorkloadSettings,
}

impl AppConfig {
    /// Validate the scaling parameters and require both adapter targets
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scaling.validate()?;

        if self.queue.url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingSetting("queue url"));
        }
        if self.workload.deployment.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingSetting("kubernetes deployment"));
        }
        Ok(())
    }

    /// Display name used in log lines, `namespace/deployment`
    pub fn workload_name(&self) -> String {
        format!(
            "{}/{}",
            self.workload.namespace,
            self.workload.deployment.as_deref().unwrap_or("<unset>")
        )
    }
}
