use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::{
    load_config_file, AppConfig, AutoscalerConfig, ConfigError, QueueSettings, WorkloadSettings,
};
use crate::scaling::{Operator, ScalingRule};

#[derive(Parser, Debug)]
#[command(name = "queue-autoscaler")]
#[command(about = "Scale a Kubernetes deployment with the depth of a work queue")]
#[command(version)]
pub struct Args {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// JSON (comments allowed) or YAML config file; overrides all scaling flags
    #[arg(long, value_name = "FILE", env = "AUTOSCALER_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Path to a .env file; its variables feed the env fallbacks of every
    /// other flag. Variables already set in the environment win.
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Serve /health, /status and /config on this address
    #[arg(long, value_name = "ADDR", env = "AUTOSCALER_STATUS_ADDR")]
    pub status_addr: Option<String>,

    /// Interval between queue depth checks
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration, env = "AUTOSCALER_POLL_PERIOD")]
    pub poll_period: Duration,

    /// Minimum time between two scale-ups
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration, env = "AUTOSCALER_SCALE_UP_COOL_OFF")]
    pub scale_up_cool_off: Duration,

    /// Minimum time between two scale-downs
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration, env = "AUTOSCALER_SCALE_DOWN_COOL_OFF")]
    pub scale_down_cool_off: Duration,

    /// Queue depth at or above which to scale up
    #[arg(long, default_value = "100", env = "AUTOSCALER_SCALE_UP_MESSAGES")]
    pub scale_up_messages: u64,

    /// Queue depth at or below which to scale down
    #[arg(long, default_value = "10", env = "AUTOSCALER_SCALE_DOWN_MESSAGES")]
    pub scale_down_messages: u64,

    /// Upper replica bound
    #[arg(long, default_value = "5", env = "AUTOSCALER_MAX_PODS")]
    pub max_pods: u32,

    /// Lower replica bound
    #[arg(long, default_value = "1", env = "AUTOSCALER_MIN_PODS")]
    pub min_pods: u32,

    /// Operator applied on scale-up: +, -, * or /
    #[arg(long, default_value = "+", env = "AUTOSCALER_SCALE_UP_OPERATOR")]
    pub scale_up_operator: Operator,

    /// Operand for the scale-up operator
    #[arg(long, default_value = "1", env = "AUTOSCALER_SCALE_UP_AMOUNT")]
    pub scale_up_amount: f64,

    /// Operator applied on scale-down: +, -, * or /
    #[arg(long, default_value = "-", env = "AUTOSCALER_SCALE_DOWN_OPERATOR")]
    pub scale_down_operator: Operator,

    /// Operand for the scale-down operator
    #[arg(long, default_value = "1", env = "AUTOSCALER_SCALE_DOWN_AMOUNT")]
    pub scale_down_amount: f64,

    /// Give up on a single queue or Kubernetes call after this long
    #[arg(long, value_parser = humantime::parse_duration, env = "AUTOSCALER_CALL_TIMEOUT")]
    pub call_timeout: Option<Duration>,

    /// URL reporting the queue depth
    #[arg(long, value_name = "URL", env = "AUTOSCALER_QUEUE_URL")]
    pub queue_url: Option<String>,

    /// Dotted JSON path of the depth in the queue response
    #[arg(long, value_name = "PATH", env = "AUTOSCALER_QUEUE_DEPTH_FIELD")]
    pub queue_depth_field: Option<String>,

    /// Deployment to scale
    #[arg(long, value_name = "NAME", env = "AUTOSCALER_KUBERNETES_DEPLOYMENT")]
    pub kubernetes_deployment: Option<String>,

    /// Namespace of the deployment
    #[arg(long, default_value = "default", env = "AUTOSCALER_KUBERNETES_NAMESPACE")]
    pub kubernetes_namespace: String,

    /// Kubeconfig file (inferred from $KUBECONFIG, ~/.kube/config or the
    /// pod's service account when unset)
    #[arg(long, value_name = "FILE", env = "AUTOSCALER_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, value_name = "NAME", env = "AUTOSCALER_KUBERNETES_CONTEXT")]
    pub kubernetes_context: Option<String>,
}

/// Failure to turn the command line into [`Args`]
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("Failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

impl Args {
    /// Parse `argv`, loading `--env-file` first when one is given.
    ///
    /// The command line is parsed a second time after the file is loaded so
    /// that `AUTOSCALER_*` variables defined in it reach clap.
    pub fn parse_with_env_file<I, T>(argv: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        let args = Self::try_parse_from(argv.iter().cloned())?;

        let Some(path) = args.env_file.clone() else {
            return Ok(args);
        };
        dotenvy::from_path(&path).map_err(|source| CliError::EnvFile { path, source })?;

        Ok(Self::try_parse_from(argv)?)
    }

    /// Build the configuration from flags alone
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            scaling: AutoscalerConfig {
                poll_interval: self.poll_period,
                scale_up_threshold: self.scale_up_messages,
                scale_down_threshold: self.scale_down_messages,
                scale_up_cooldown: self.scale_up_cool_off,
                scale_down_cooldown: self.scale_down_cool_off,
                min_replicas: self.min_pods,
                max_replicas: self.max_pods,
                scale_up: ScalingRule::new(self.scale_up_operator, self.scale_up_amount),
                scale_down: ScalingRule::new(self.scale_down_operator, self.scale_down_amount),
                call_timeout: self.call_timeout,
            },
            queue: QueueSettings {
                url: self.queue_url.clone(),
                depth_field: self.queue_depth_field.clone(),
            },
            workload: WorkloadSettings {
                deployment: self.kubernetes_deployment.clone(),
                namespace: self.kubernetes_namespace.clone(),
                kubeconfig: self.kubeconfig.clone(),
                context: self.kubernetes_context.clone(),
            },
        }
    }

    /// The config file when given, the flags otherwise; always validated
    pub fn resolve_config(&self) -> Result<AppConfig, ConfigError> {
        let config = match self.config_file {
            Some(ref path) => load_config_file(path)?,
            None => self.to_config(),
        };
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

/// Format the dry-run summary of an effective configuration.
/// Pure function - returns a formatted string.
pub fn format_dry_run(config: &AppConfig, args: &Args) -> String {
    let scaling = &config.scaling;
    let mut output = String::new();

    output.push_str(&format!(
        "queue-autoscaler v{} - Dry Run Mode\n\n",
        env!("CARGO_PKG_VERSION")
    ));

    match args.config_file {
        Some(ref path) => output.push_str(&format!("Config: {}\n\n", path.display())),
        None => output.push_str("Config: command-line flags\n\n"),
    }

    output.push_str(&format!("Workload: {}\n", config.workload_name()));
    match config.workload.kubeconfig {
        Some(ref path) => output.push_str(&format!("  Kubeconfig: {}\n", path.display())),
        None => output.push_str("  Kubeconfig: inferred\n"),
    }
    if let Some(ref context) = config.workload.context {
        output.push_str(&format!("  Context: {}\n", context));
    }

    output.push_str(&format!(
        "Queue: {}\n",
        config.queue.url.as_deref().unwrap_or("<unset>")
    ));
    if let Some(ref field) = config.queue.depth_field {
        output.push_str(&format!("  Depth field: {}\n", field));
    }
    output.push('\n');

    output.push_str(&format!(
        "Poll every {}\n",
        humantime::format_duration(scaling.poll_interval)
    ));
    output.push_str(&format!(
        "Replicas: {}..={}\n",
        scaling.min_replicas, scaling.max_replicas
    ));
    output.push_str(&format!(
        "Scale up:   depth >= {:<8} replicas {}  cool off {}\n",
        scaling.scale_up_threshold,
        scaling.scale_up,
        humantime::format_duration(scaling.scale_up_cooldown)
    ));
    output.push_str(&format!(
        "Scale down: depth <= {:<8} replicas {}  cool off {}\n",
        scaling.scale_down_threshold,
        scaling.scale_down,
        humantime::format_duration(scaling.scale_down_cooldown)
    ));
    if let Some(timeout) = scaling.call_timeout {
        output.push_str(&format!(
            "Call timeout: {}\n",
            humantime::format_duration(timeout)
        ));
    }
    if scaling.thresholds_overlap() {
        output.push_str("\nWarning: thresholds overlap, both directions can fire on one tick\n");
    }

    output
}
