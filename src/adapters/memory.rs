//! In-memory collaborators
//!
//! Fakes for tests and local experiments. Clones share state, so a test can
//! hand one clone to the controller and keep another to steer and inspect it.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AdapterError, QueueDepthSource, WorkloadScaler};

/// A queue whose depth is set by hand
#[derive(Debug, Clone, Default)]
pub struct StaticQueueDepth {
    depth: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
    samples: Arc<AtomicUsize>,
}

impl StaticQueueDepth {
    pub fn new(depth: u64) -> Self {
        let queue = Self::default();
        queue.set_depth(depth);
        queue
    }

    pub fn set_depth(&self, depth: u64) {
        self.depth.store(depth, Ordering::SeqCst);
    }

    /// Make every sample fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `sample` calls so far, failed ones included
    pub fn sample_count(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueDepthSource for StaticQueueDepth {
    async fn sample(&self) -> Result<u64, AdapterError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Unavailable("queue marked as failing".into()));
        }
        Ok(self.depth.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Default)]
struct WorkloadState {
    replicas: u32,
    writes: Vec<u32>,
    reads: usize,
    write_attempts: usize,
    fail_reads: bool,
    fail_writes: bool,
}

/// A workload that keeps its replica count in memory and records writes
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkload {
    state: Arc<Mutex<WorkloadState>>,
}

impl InMemoryWorkload {
    pub fn new(replicas: u32) -> Self {
        let workload = Self::default();
        workload.lock().replicas = replicas;
        workload
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorkloadState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn replicas(&self) -> u32 {
        self.lock().replicas
    }

    /// Change the count behind the controller's back (e.g. a manual edit)
    pub fn set(&self, replicas: u32) {
        self.lock().replicas = replicas;
    }

    /// Every value passed to a successful `set_replicas`, in order
    pub fn writes(&self) -> Vec<u32> {
        self.lock().writes.clone()
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Every `set_replicas` call, failed ones included
    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    /// Total collaborator calls, reads and writes, failed ones included
    pub fn call_count(&self) -> usize {
        let state = self.lock();
        state.reads + state.write_attempts
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.lock().fail_reads = failing;
    }

    pub fn set_failing_writes(&self, failing: bool) {
        self.lock().fail_writes = failing;
    }
}

#[async_trait]
impl WorkloadScaler for InMemoryWorkload {
    async fn current_replicas(&self) -> Result<u32, AdapterError> {
        let mut state = self.lock();
        state.reads += 1;
        if state.fail_reads {
            return Err(AdapterError::Unavailable("workload read marked as failing".into()));
        }
        Ok(state.replicas)
    }

    async fn set_replicas(&self, replicas: u32) -> Result<(), AdapterError> {
        let mut state = self.lock();
        state.write_attempts += 1;
        if state.fail_writes {
            return Err(AdapterError::Unavailable("workload write marked as failing".into()));
        }
        state.replicas = replicas;
        state.writes.push(replicas);
        Ok(())
    }
}
