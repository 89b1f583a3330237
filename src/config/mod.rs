pub mod autoscaler;

pub use autoscaler::{AppConfig, AutoscalerConfig, QueueSettings, WorkloadSettings};

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::scaling::Direction;

/// Configuration problems. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid operator '{0}': expected one of +, -, *, /")]
    InvalidOperator(String),

    #[error("Poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("Max replicas ({max}) must be >= min replicas ({min})")]
    InvalidReplicaBounds { min: u32, max: u32 },

    #[error("Scale-{direction} amount must be a positive finite number, got {amount}")]
    InvalidAmount { direction: Direction, amount: f64 },

    #[error("Call timeout must be greater than zero")]
    InvalidCallTimeout,

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
}

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON, with `//` and `/* */` comments allowed
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension; JSON unless `.yaml`/`.yml`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

// ============================================================================
// Pure parsing (no I/O)
// ============================================================================

/// Strip `//` line comments and `/* */` block comments outside of strings
pub fn strip_jsonc_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            result.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }

        if !in_string && c == '/' {
            match chars.peek() {
                Some('/') => {
                    for nc in chars.by_ref() {
                        if nc == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for nc in chars.by_ref() {
                        if prev == '*' && nc == '/' {
                            break;
                        }
                        prev = nc;
                    }
                    continue;
                }
                _ => {}
            }
        }

        result.push(c);
    }

    result
}

/// Parse config text. Does not validate; see [`AppConfig::validate`].
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<AppConfig, ConfigError> {
    let mut config: AppConfig = match format {
        ConfigFormat::Json => serde_json::from_str(&strip_jsonc_comments(content))?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };
    expand_paths(&mut config);
    Ok(config)
}

/// Expand `~` and `$VAR` in the kubeconfig path
fn expand_paths(config: &mut AppConfig) {
    if let Some(ref mut path) = config.workload.kubeconfig {
        let raw = path.to_string_lossy().into_owned();
        if let Ok(expanded) = shellexpand::full(&raw) {
            *path = PathBuf::from(expanded.as_ref());
        }
    }
}

// ============================================================================
// SBIO: I/O wrapper - thin layer over pure functions
// ============================================================================

/// Load and parse a config file from disk
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content, ConfigFormat::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    use crate::scaling::{Operator, ScalingRule};

    fn create_temp_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_strip_jsonc_comments() {
        let input = r#"{
            // the queue
            "url": "http://queue//jobs", /* inline */ "depthField": "messages"
        }"#;
        let stripped = strip_jsonc_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["url"], "http://queue//jobs");
        assert_eq!(value["depthField"], "messages");
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            // poll fast
            "pollInterval": "1s",
            "scaleUpThreshold": 50,
            "scaleDown": {"operator": "/", "amount": 2},
            "queue": {"url": "http://rabbit:15672/api/queues/%2F/jobs", "depthField": "messages"},
            "workload": {"deployment": "worker", "namespace": "jobs"}
        }"#;
        let config = parse_config(json, ConfigFormat::Json).unwrap();

        assert_eq!(config.scaling.poll_interval, Duration::from_secs(1));
        assert_eq!(config.scaling.scale_up_threshold, 50);
        assert_eq!(config.scaling.scale_down, ScalingRule::new(Operator::Divide, 2.0));
        assert_eq!(config.queue.depth_field.as_deref(), Some("messages"));
        assert_eq!(config.workload.namespace, "jobs");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
pollInterval: 10s
scaleUpCooldown: 2m
minReplicas: 0
maxReplicas: 12
scaleUp:
  operator: "*"
  amount: 1.5
queue:
  url: http://sqs-proxy/attributes
  depthField: Attributes.ApproximateNumberOfMessages
workload:
  deployment: consumer
  context: staging
"#;
        let config = parse_config(yaml, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.scaling.poll_interval, Duration::from_secs(10));
        assert_eq!(config.scaling.scale_up_cooldown, Duration::from_secs(120));
        assert_eq!(config.scaling.min_replicas, 0);
        assert_eq!(config.scaling.scale_up, ScalingRule::new(Operator::Multiply, 1.5));
        assert_eq!(config.workload.namespace, "default");
        assert_eq!(config.workload.context.as_deref(), Some("staging"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_operator_fails_parse() {
        let json = r#"{"scaleUp": {"operator": "^", "amount": 2}}"#;
        let result = parse_config(json, ConfigFormat::Json);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.jsonc")), ConfigFormat::Json);
    }

    #[test]
    fn test_kubeconfig_tilde_expanded() {
        let yaml = "workload:\n  kubeconfig: ~/.kube/staging\n";
        let config = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        let kubeconfig = config.workload.kubeconfig.unwrap();
        assert!(!kubeconfig.to_string_lossy().starts_with('~'));
        assert!(kubeconfig.ends_with(".kube/staging"));
    }

    #[test]
    fn test_load_config_file() {
        let file = create_temp_file(
            ".json",
            r#"{"queue": {"url": "http://q"}, "workload": {"deployment": "w"}}"#,
        );
        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.queue.url.as_deref(), Some("http://q"));
        assert_eq!(config.scaling, AutoscalerConfig::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config_file(Path::new("/nonexistent/autoscaler.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
