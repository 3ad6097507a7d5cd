//! Dashboard watcher: recompute the dashboard periodically and on data changes.
//!
//! The latest state is published on a `watch` channel; the UI subscribes and
//! redraws. Does not block the main thread; uses tokio::time::sleep.

use crate::adapters::gateway::ChangeEvent;
use crate::domain::DashboardStats;
use crate::usecases::dashboard_service::DashboardService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// What the dashboard currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    /// Nothing computed yet.
    Loading,
    Ready(DashboardStats),
    /// Last refresh failed; previous numbers are not kept so a fetch error is
    /// never mistaken for real data.
    Failed(String),
}

pub struct DashboardWatcher {
    dashboard: Arc<DashboardService>,
    cycle_sleep: Duration,
    state: watch::Sender<DashboardState>,
}

impl DashboardWatcher {
    pub fn new(dashboard: Arc<DashboardService>, cycle_sleep: Duration) -> Self {
        let (state, _) = watch::channel(DashboardState::Loading);
        Self {
            dashboard,
            cycle_sleep,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Recompute once and publish the result.
    pub async fn refresh(&self) -> DashboardState {
        let next = match self.dashboard.stats(Utc::now()).await {
            Ok(stats) => DashboardState::Ready(stats),
            Err(e) => {
                warn!(error = %e, "dashboard refresh failed");
                DashboardState::Failed(e.to_string())
            }
        };
        self.state.send_replace(next.clone());
        next
    }

    /// Refresh now, then on every tick and on every change notification.
    /// Runs until the task is dropped (e.g. `select!` against Ctrl-C).
    pub async fn run_loop(&self, mut changes: Option<broadcast::Receiver<ChangeEvent>>) {
        info!(
            cycle_secs = self.cycle_sleep.as_secs(),
            "dashboard watcher started"
        );
        loop {
            self.refresh().await;

            tokio::select! {
                _ = tokio::time::sleep(self.cycle_sleep) => {
                    debug!("refresh interval elapsed");
                }
                changed = next_change(&mut changes) => {
                    match changed {
                        Some(event) => debug!(table = %event.table, record_id = %event.record_id, "data changed"),
                        // Sender gone; fall back to interval polling only.
                        None => changes = None,
                    }
                }
            }
        }
    }
}

/// Next change event. Lagged receivers skip ahead (one refresh covers all
/// missed changes). Pends forever when there is no receiver.
async fn next_change(changes: &mut Option<broadcast::Receiver<ChangeEvent>>) -> Option<ChangeEvent> {
    let Some(rx) = changes.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "change receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
