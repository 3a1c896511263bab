//! Periodic connectivity checks.
//!
//! The monitor probes the active backend right away and then on a fixed
//! interval, publishing each result on a `tokio::sync::watch` channel. A
//! tick that lands while an upload is running is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::StatusConfig;
use crate::manager::ConnectionManager;
use crate::models::ConnectivityStatus;

pub struct StatusMonitor {
    manager: Arc<ConnectionManager>,
    interval: Duration,
}

impl StatusMonitor {
    pub fn new(manager: Arc<ConnectionManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    pub fn from_config(manager: Arc<ConnectionManager>, config: &StatusConfig) -> Self {
        Self::new(manager, Duration::from_secs(config.interval_secs))
    }

    /// Probe the active backend. `None` when skipped because of an upload.
    pub async fn check_once(&self) -> Option<ConnectivityStatus> {
        if self.manager.commit_in_progress() {
            tracing::debug!("upload in progress, skipping connectivity check");
            return None;
        }
        Some(self.manager.check_connectivity(None).await)
    }

    /// Run until every receiver is gone.
    pub async fn run(self, tx: watch::Sender<Option<ConnectivityStatus>>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            if let Some(status) = self.check_once().await {
                tracing::debug!(connected = status.connected, detail = %status.detail, "connectivity status");
                if tx.send(Some(status)).is_err() {
                    break;
                }
            }
        }
    }

    /// Start the monitor on the current runtime.
    pub fn spawn(self) -> (watch::Receiver<Option<ConnectivityStatus>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }
}
