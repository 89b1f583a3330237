use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AutoscalerConfig;
use crate::scaling::ControllerStatus;

/// Shared state of the status server
///
/// Holds only a receiver of controller snapshots; handlers never reach into
/// the running controller.
#[derive(Clone)]
pub struct StatusState {
    pub config: Arc<AutoscalerConfig>,
    pub status: watch::Receiver<ControllerStatus>,
}

impl StatusState {
    pub fn new(config: AutoscalerConfig, status: watch::Receiver<ControllerStatus>) -> Self {
        Self {
            config: Arc::new(config),
            status,
        }
    }

    /// Copy of the latest published status
    pub fn snapshot(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }
}
