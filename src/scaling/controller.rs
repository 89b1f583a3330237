//! Controller loop
//!
//! Runs one tick per poll interval:
//!
//! ```text
//! IDLE → SAMPLE → EVALUATE_UP → EVALUATE_DOWN → IDLE
//!          │
//!          └─ sample failed ─────────────────▶ IDLE
//! ```
//!
//! Up and down are evaluated independently on every tick: a direction that
//! is cooling down, or whose read/write failed, never stops the other one
//! from being evaluated. Nothing is retried inside a tick; the next tick is
//! the retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::calculator::compute;
use super::clock::{Clock, TokioClock};
use super::cooldown::CooldownTracker;
use super::{Direction, ScaleDecision};
use crate::adapters::{AdapterError, QueueDepthSource, WorkloadScaler};
use crate::config::{AutoscalerConfig, ConfigError};

/// Per-tick failures. None of them stop the loop.
#[derive(Error, Debug)]
pub enum ScaleError {
    /// No scaling is attempted for the rest of the tick
    #[error("Failed to sample queue depth: {0}")]
    SampleFailure(#[source] AdapterError),

    /// Only the direction being evaluated is abandoned
    #[error("Failed to read replicas, no scale {direction} occurred: {source}")]
    ReadFailure {
        direction: Direction,
        #[source]
        source: AdapterError,
    },

    /// The cooldown clock is left untouched so the next tick can retry
    #[error(
        "Failed to scale {} from {} to {} replicas: {source}",
        .decision.direction,
        .decision.current_replicas,
        .decision.new_replicas
    )]
    WriteFailure {
        decision: ScaleDecision,
        #[source]
        source: AdapterError,
    },
}

/// What happened to one direction during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionOutcome {
    /// Depth did not reach the threshold
    NotTriggered,
    /// Threshold met, but the last change in this direction was too recent
    CoolingDown { remaining: Duration },
    /// The calculator returned the current count; nothing was written
    Unchanged { replicas: u32 },
    /// The new count was written and the cooldown restarted
    Scaled(ScaleDecision),
    ReadFailed,
    WriteFailed(ScaleDecision),
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    SampleFailed,
    Evaluated {
        depth: u64,
        up: DirectionOutcome,
        down: DirectionOutcome,
    },
}

impl TickOutcome {
    /// Outcome for `direction`, `None` when the sample failed
    pub fn direction(&self, direction: Direction) -> Option<DirectionOutcome> {
        match self {
            TickOutcome::SampleFailed => None,
            TickOutcome::Evaluated { up, down, .. } => Some(match direction {
                Direction::Up => *up,
                Direction::Down => *down,
            }),
        }
    }

    /// Changes applied during this tick
    pub fn applied(&self) -> Vec<ScaleDecision> {
        [Direction::Up, Direction::Down]
            .into_iter()
            .filter_map(|d| match self.direction(d) {
                Some(DirectionOutcome::Scaled(decision)) => Some(decision),
                _ => None,
            })
            .collect()
    }
}

/// A replica change the workload accepted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleEvent {
    pub from: u32,
    pub to: u32,
    pub depth: u64,
    pub at: DateTime<Utc>,
}

/// Read-only snapshot published after every tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub workload: String,
    pub ticks: u64,
    pub last_depth: Option<u64>,
    pub last_sampled_at: Option<DateTime<Utc>>,
    /// Most recent count read from or written to the workload
    pub observed_replicas: Option<u32>,
    pub consecutive_sample_failures: u32,
    pub scale_up_cooldown_until: Option<DateTime<Utc>>,
    pub scale_down_cooldown_until: Option<DateTime<Utc>>,
    pub last_scale_up: Option<ScaleEvent>,
    pub last_scale_down: Option<ScaleEvent>,
}

/// Drives one workload from one queue
pub struct Controller {
    name: String,
    config: AutoscalerConfig,
    queue: Arc<dyn QueueDepthSource>,
    workload: Arc<dyn WorkloadScaler>,
    clock: Arc<dyn Clock>,
    tracker: CooldownTracker,
    status: watch::Sender<ControllerStatus>,
}

impl Controller {
    /// Validate `config` and anchor both cooldowns at the current time.
    ///
    /// An invalid configuration is refused here, before any loop can start.
    pub fn new(
        name: impl Into<String>,
        config: AutoscalerConfig,
        queue: Arc<dyn QueueDepthSource>,
        workload: Arc<dyn WorkloadScaler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let name = name.into();
        if config.thresholds_overlap() {
            warn!(
                workload = %name,
                "Scale-down threshold ({}) >= scale-up threshold ({}): both directions can fire on the same tick",
                config.scale_down_threshold, config.scale_up_threshold
            );
        }

        let clock: Arc<dyn Clock> = Arc::new(TokioClock);
        let tracker = CooldownTracker::new(clock.now());
        let (status, _) = watch::channel(ControllerStatus {
            workload: name.clone(),
            ..ControllerStatus::default()
        });

        Ok(Self {
            name,
            config,
            queue,
            workload,
            clock,
            tracker,
            status,
        })
    }

    /// Use another time source. Re-anchors both cooldowns at its current time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.tracker = CooldownTracker::new(clock.now());
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AutoscalerConfig {
        &self.config
    }

    pub fn tracker(&self) -> &CooldownTracker {
        &self.tracker
    }

    /// Subscribe to status snapshots
    pub fn status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.subscribe()
    }

    /// Bound a collaborator call by `call_timeout`
    async fn bounded<T, F>(&self, call: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        match self.config.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AdapterError::Timeout(limit))?,
            None => call.await,
        }
    }

    /// Run one SAMPLE → EVALUATE_UP → EVALUATE_DOWN cycle
    pub async fn tick(&mut self) -> TickOutcome {
        debug!(workload = %self.name, "Polling queue depth");

        let depth = match self.sample().await {
            Ok(depth) => depth,
            Err(e) => {
                error!(workload = %self.name, "{}", e);
                self.status.send_modify(|s| {
                    s.ticks += 1;
                    s.consecutive_sample_failures += 1;
                });
                return TickOutcome::SampleFailed;
            }
        };

        let up = self.evaluate_logged(Direction::Up, depth).await;
        let down = self.evaluate_logged(Direction::Down, depth).await;

        self.publish(depth, &[up, down]);

        TickOutcome::Evaluated { depth, up, down }
    }

    async fn sample(&self) -> Result<u64, ScaleError> {
        self.bounded(self.queue.sample())
            .await
            .map_err(ScaleError::SampleFailure)
    }

    async fn evaluate_logged(&mut self, direction: Direction, depth: u64) -> DirectionOutcome {
        match self.evaluate(direction, depth).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(workload = %self.name, %direction, "{}", e);
                match e {
                    ScaleError::WriteFailure { decision, .. } => DirectionOutcome::WriteFailed(decision),
                    _ => DirectionOutcome::ReadFailed,
                }
            }
        }
    }

    /// Evaluate one direction against `depth`
    async fn evaluate(&mut self, direction: Direction, depth: u64) -> Result<DirectionOutcome, ScaleError> {
        if !self.config.triggers(direction, depth) {
            return Ok(DirectionOutcome::NotTriggered);
        }

        let now = self.clock.now();
        if self.tracker.in_cooldown(direction, now, &self.config) {
            let remaining = self.tracker.remaining(direction, now, &self.config);
            info!(
                workload = %self.name,
                %direction,
                depth,
                "Waiting for cool off, skipping scale {} ({:?} left)",
                direction, remaining
            );
            return Ok(DirectionOutcome::CoolingDown { remaining });
        }

        info!(
            workload = %self.name,
            %direction,
            depth,
            threshold = self.config.threshold(direction),
            "Scale {} may be appropriate",
            direction
        );

        let current = self
            .bounded(self.workload.current_replicas())
            .await
            .map_err(|source| ScaleError::ReadFailure { direction, source })?;

        let decision = ScaleDecision {
            direction,
            current_replicas: current,
            new_replicas: compute(current, direction, &self.config),
        };

        if !decision.changes() {
            info!(
                workload = %self.name,
                %direction,
                replicas = current,
                min = self.config.min_replicas,
                max = self.config.max_replicas,
                "No change needed"
            );
            return Ok(DirectionOutcome::Unchanged { replicas: current });
        }

        self.bounded(self.workload.set_replicas(decision.new_replicas))
            .await
            .map_err(|source| ScaleError::WriteFailure { decision, source })?;

        self.tracker.record_scale(direction, now);
        info!(
            workload = %self.name,
            %direction,
            from = decision.current_replicas,
            to = decision.new_replicas,
            "Scale {} successful",
            direction
        );

        Ok(DirectionOutcome::Scaled(decision))
    }

    fn publish(&self, depth: u64, outcomes: &[DirectionOutcome]) {
        let now = self.clock.now();
        let wall = Utc::now();
        // Cooldowns past chrono's range are reported as the latest representable time
        let until = |direction: Direction| {
            let remaining = self.tracker.remaining(direction, now, &self.config);
            if remaining.is_zero() {
                return None;
            }
            let end = chrono::Duration::from_std(remaining)
                .ok()
                .and_then(|d| wall.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            Some(end)
        };
        let scale_up_cooldown_until = until(Direction::Up);
        let scale_down_cooldown_until = until(Direction::Down);

        self.status.send_modify(|s| {
            s.ticks += 1;
            s.last_depth = Some(depth);
            s.last_sampled_at = Some(wall);
            s.consecutive_sample_failures = 0;
            s.scale_up_cooldown_until = scale_up_cooldown_until;
            s.scale_down_cooldown_until = scale_down_cooldown_until;

            for outcome in outcomes {
                match outcome {
                    DirectionOutcome::Unchanged { replicas } => s.observed_replicas = Some(*replicas),
                    DirectionOutcome::Scaled(decision) => {
                        s.observed_replicas = Some(decision.new_replicas);
                        let event = Some(ScaleEvent {
                            from: decision.current_replicas,
                            to: decision.new_replicas,
                            depth,
                            at: wall,
                        });
                        match decision.direction {
                            Direction::Up => s.last_scale_up = event,
                            Direction::Down => s.last_scale_down = event,
                        }
                    }
                    DirectionOutcome::WriteFailed(decision) => {
                        s.observed_replicas = Some(decision.current_replicas)
                    }
                    _ => {}
                }
            }
        });
    }

    /// Tick every `poll_interval` until `shutdown` turns true or its sender is dropped.
    ///
    /// The first tick happens one interval after start. A tick in progress
    /// always completes before shutdown is observed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            workload = %self.name,
            "Starting autoscaler: poll={:?}, up: depth>={} {} (cool off {:?}), down: depth<={} {} (cool off {:?}), replicas {}..={}",
            period,
            self.config.scale_up_threshold,
            self.config.scale_up,
            self.config.scale_up_cooldown,
            self.config.scale_down_threshold,
            self.config.scale_down,
            self.config.scale_down_cooldown,
            self.config.min_replicas,
            self.config.max_replicas
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(workload = %self.name, "Autoscaler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// Spawn the controller loop as a background task
///
/// Send `true` (or drop the sender) to stop it; the handle resolves once the
/// loop has exited.
pub fn spawn_controller(controller: Controller) -> (watch::Sender<bool>, JoinHandle<()>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(controller.run(shutdown_rx));
    (shutdown_tx, handle)
}
