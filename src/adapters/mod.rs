//! Collaborator seams for the controller
//!
//! The control loop only ever talks to a [`QueueDepthSource`] and a
//! [`WorkloadScaler`]. Concrete backends live in submodules:
//!
//! - [`http`]: queue depth from a JSON endpoint
//! - [`kubernetes`]: replicas through a Deployment's `scale` subresource
//! - [`memory`]: in-memory fakes with failure injection

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod kubernetes;
pub mod memory;

pub use http::HttpQueueDepth;
pub use kubernetes::KubernetesScaler;
pub use memory::{InMemoryWorkload, StaticQueueDepth};

/// A failed collaborator call
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SBIO: Traits for abstraction (allows in-memory fakes in tests)
// ============================================================================

/// Reports the approximate number of pending messages
///
/// Called once per tick. Errors are retried by the next tick, never inline.
#[async_trait]
pub trait QueueDepthSource: Send + Sync {
    async fn sample(&self) -> Result<u64, AdapterError>;
}

/// Reads and writes the replica count of the managed workload
#[async_trait]
pub trait WorkloadScaler: Send + Sync {
    async fn current_replicas(&self) -> Result<u32, AdapterError>;

    /// Setting the count it already has must be a no-op.
    async fn set_replicas(&self, replicas: u32) -> Result<(), AdapterError>;
}
