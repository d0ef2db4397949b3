//! The running facility.
//!
//! Wires the ledger, assigner, scheduler, poller and admission controller
//! together once registration has produced an entity ID and time rate.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::info;
use triage_id::EntityId;

use crate::admission::AdmissionController;
use crate::assigner::TreatmentAssigner;
use crate::clock::TimeScale;
use crate::config::Config;
use crate::discharge::DischargeScheduler;
use crate::gateway::{Registration, WorldModelGateway};
use crate::ledger::CapacityLedger;
use crate::poller::{SnapshotLog, SnapshotPoller};
use crate::random::RandomSource;
use crate::roster::DoctorRoster;

/// A registered facility, ready to start its loops.
pub struct Facility {
    entity_id: EntityId,
    scale: TimeScale,
    poll_interval: Duration,
    admission_interval: Duration,
    gateway: Arc<dyn WorldModelGateway>,
    ledger: Arc<CapacityLedger>,
    scheduler: Arc<DischargeScheduler>,
    snapshots: Arc<RwLock<SnapshotLog>>,
    assigner: TreatmentAssigner,
}

impl Facility {
    pub fn new(
        config: &Config,
        registration: &Registration,
        roster: Arc<DoctorRoster>,
        gateway: Arc<dyn WorldModelGateway>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let entity_id = registration.entity_id;
        let scale = TimeScale::new(registration.time_rate, config.time_unit);
        let ledger = Arc::new(CapacityLedger::new(config.max_capacity));
        let scheduler = Arc::new(DischargeScheduler::new(
            entity_id,
            Arc::clone(&gateway),
            Arc::clone(&ledger),
        ));
        let assigner = TreatmentAssigner::new(roster, scale, config.death_rate, rng);

        Self {
            entity_id,
            scale,
            poll_interval: scale.scale_interval(config.poll_interval),
            admission_interval: scale.scale_interval(config.admission_interval),
            gateway,
            ledger,
            scheduler,
            snapshots: Arc::new(RwLock::new(SnapshotLog::new(config.snapshot_history))),
            assigner,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.ledger
    }

    /// Spawn the poller and admission loops.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> FacilityHandle {
        let (publisher, latest) = watch::channel(None);

        info!(
            entity_id = %self.entity_id,
            max_capacity = self.ledger.max_capacity(),
            time_rate = self.scale.time_rate(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            admission_interval_ms = self.admission_interval.as_millis() as u64,
            "Starting facility"
        );

        let poller = SnapshotPoller::new(
            Arc::clone(&self.gateway),
            self.entity_id,
            self.poll_interval,
            Arc::clone(&self.snapshots),
            publisher,
        );
        let poller = tokio::spawn(poller.run(shutdown.clone()));

        let controller = AdmissionController::new(
            self.entity_id,
            Arc::clone(&self.gateway),
            Arc::clone(&self.ledger),
            self.assigner,
            Arc::clone(&self.scheduler),
        );
        let admission = tokio::spawn(controller.run(latest, self.admission_interval, shutdown));

        FacilityHandle {
            ledger: self.ledger,
            scheduler: self.scheduler,
            snapshots: self.snapshots,
            poller,
            admission,
        }
    }
}

/// Handle to a started facility.
pub struct FacilityHandle {
    ledger: Arc<CapacityLedger>,
    scheduler: Arc<DischargeScheduler>,
    snapshots: Arc<RwLock<SnapshotLog>>,
    poller: JoinHandle<()>,
    admission: JoinHandle<()>,
}

impl FacilityHandle {
    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.ledger
    }

    pub fn scheduler(&self) -> &Arc<DischargeScheduler> {
        &self.scheduler
    }

    pub fn snapshots(&self) -> &Arc<RwLock<SnapshotLog>> {
        &self.snapshots
    }

    /// Resolves when either loop exits.
    pub async fn wait_any(&mut self) {
        tokio::select! {
            _ = &mut self.poller => {}
            _ = &mut self.admission => {}
        }
    }

    /// Wait for both loops, then abandon outstanding discharge timers.
    ///
    /// The shutdown signal must already have been sent.
    pub async fn stop(self) {
        // A loop that already finished was consumed by `wait_any`.
        for task in [self.poller, self.admission] {
            if !task.is_finished() {
                let _ = task.await;
            }
        }
        self.scheduler.shutdown().await;
    }
}
