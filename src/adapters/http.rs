//! Queue depth over HTTP
//!
//! [`HttpQueueDepth`] reads the depth from any endpoint that reports it as
//! JSON (RabbitMQ management API, an SQS attributes proxy, a custom
//! `/metrics/queue` handler) or as a plain number.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

use super::{AdapterError, QueueDepthSource};
use crate::config::QueueSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Pure parsing (no I/O)
// ============================================================================

/// Extract a queue depth from a response body.
///
/// With a `field` (dotted path such as `Attributes.ApproximateNumberOfMessages`)
/// the body must be JSON. Without one, the body is either a bare number or a
/// JSON number.
pub fn parse_depth(body: &str, field: Option<&str>) -> Result<u64, AdapterError> {
    let Some(field) = field else {
        if let Ok(depth) = body.trim().parse::<u64>() {
            return Ok(depth);
        }
        let value: Value = serde_json::from_str(body)
            .map_err(|e| AdapterError::Parse(format!("body is neither a number nor JSON: {}", e)))?;
        return value_to_depth(&value, "<body>");
    };

    let root: Value = serde_json::from_str(body)
        .map_err(|e| AdapterError::Parse(format!("invalid JSON: {}", e)))?;

    let mut current = &root;
    for part in field.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| AdapterError::Parse(format!("field '{}' not found", field)))?;
    }

    value_to_depth(current, field)
}

fn value_to_depth(value: &Value, field: &str) -> Result<u64, AdapterError> {
    match value {
        Value::Number(n) => {
            if let Some(depth) = n.as_u64() {
                return Ok(depth);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f.trunc() as u64),
                _ => Err(AdapterError::Parse(format!(
                    "field '{}' is not a non-negative number: {}",
                    field, n
                ))),
            }
        }
        // SQS reports attribute values as strings
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| {
            AdapterError::Parse(format!("field '{}' is not a non-negative integer: {:?}", field, s))
        }),
        other => Err(AdapterError::Parse(format!(
            "field '{}' has unexpected type: {}",
            field, other
        ))),
    }
}

async fn check_status(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AdapterError::Status {
        status: status.as_u16(),
        message,
    })
}

// ============================================================================
// Queue depth over HTTP
// ============================================================================

/// Queue depth read with a GET request
#[derive(Clone)]
pub struct HttpQueueDepth {
    client: Client,
    url: String,
    depth_field: Option<String>,
}

impl HttpQueueDepth {
    pub fn new(url: impl Into<String>, depth_field: Option<String>) -> Result<Self, AdapterError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            depth_field,
        })
    }

    pub fn from_settings(settings: &QueueSettings) -> Result<Self, AdapterError> {
        let url = settings
            .url
            .clone()
            .ok_or_else(|| AdapterError::Unavailable("queue url not configured".into()))?;
        Self::new(url, settings.depth_field.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QueueDepthSource for HttpQueueDepth {
    async fn sample(&self) -> Result<u64, AdapterError> {
        let response = self.client.get(&self.url).send().await?;
        let body = check_status(response).await?.text().await?;
        let depth = parse_depth(&body, self.depth_field.as_deref())?;
        debug!("Sampled queue depth {} from {}", depth, self.url);
        Ok(depth)
    }
}
