//! Snapshot polling.
//!
//! The poller fetches the facility's snapshot on a fixed interval and
//! publishes the newest one for the admission loop. It also keeps a short
//! history of received snapshots for inspection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use triage_id::EntityId;

use crate::error::GatewayError;
use crate::gateway::WorldModelGateway;
use crate::model::Snapshot;

/// Bounded history of received snapshots, oldest first.
#[derive(Debug, Clone)]
pub struct SnapshotLog {
    capacity: usize,
    entries: VecDeque<Arc<Snapshot>>,
}

impl SnapshotLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a snapshot, evicting the oldest when full.
    pub fn record(&mut self, snapshot: Arc<Snapshot>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.entries.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.entries.iter()
    }
}

/// Periodically fetches snapshots and publishes the latest.
pub struct SnapshotPoller {
    gateway: Arc<dyn WorldModelGateway>,
    entity_id: EntityId,
    interval: Duration,
    log: Arc<RwLock<SnapshotLog>>,
    publisher: watch::Sender<Option<Arc<Snapshot>>>,
}

impl SnapshotPoller {
    pub fn new(
        gateway: Arc<dyn WorldModelGateway>,
        entity_id: EntityId,
        interval: Duration,
        log: Arc<RwLock<SnapshotLog>>,
        publisher: watch::Sender<Option<Arc<Snapshot>>>,
    ) -> Self {
        Self {
            gateway,
            entity_id,
            interval,
            log,
            publisher,
        }
    }

    /// Fetch one snapshot, record it and publish it.
    pub async fn poll_once(&self) -> Result<Arc<Snapshot>, GatewayError> {
        let snapshot = Arc::new(self.gateway.fetch_snapshot(self.entity_id).await?);

        if let Some(previous) = self.log.read().await.latest() {
            if previous.hazard_active != snapshot.hazard_active {
                info!(
                    snapshot_id = %snapshot.id,
                    hazard_active = snapshot.hazard_active,
                    "Hazard status changed"
                );
            }
        }

        self.log.write().await.record(Arc::clone(&snapshot));
        self.publisher.send_replace(Some(Arc::clone(&snapshot)));

        debug!(
            snapshot_id = %snapshot.id,
            person_count = snapshot.persons.len(),
            hazard_active = snapshot.hazard_active,
            "Snapshot received"
        );
        Ok(snapshot)
    }

    /// Poll until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            entity_id = %self.entity_id,
            interval_ms = self.interval.as_millis() as u64,
            "Starting snapshot poller"
        );

        let mut consecutive_failures = 0u32;
        let mut interval_timer = tokio::time::interval(self.interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    match self.poll_once().await {
                        Ok(_) => {
                            consecutive_failures = 0;
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            if consecutive_failures <= 3 {
                                warn!(
                                    error = %e,
                                    transient = e.is_transient(),
                                    consecutive_failures,
                                    "Snapshot poll failed"
                                );
                            } else {
                                error!(
                                    error = %e,
                                    transient = e.is_transient(),
                                    consecutive_failures,
                                    "Snapshot poll failed repeatedly"
                                );
                            }
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Snapshot poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}
