//! Admission control.
//!
//! Each pass takes the persons still waiting from earlier passes plus the
//! newest snapshot, reserves capacity for as many as fit, starts their
//! treatment and reports the accepted set to the world model. Anyone not
//! admitted stays pending for the next pass. Discharge timers armed during a
//! pass stay held until that report has been sent.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use triage_id::{EntityId, PersonId};

use crate::assigner::{Assignment, TreatmentAssigner};
use crate::discharge::{DischargeScheduler, ReleaseGate};
use crate::gateway::WorldModelGateway;
use crate::ledger::CapacityLedger;
use crate::model::{LifeStatus, Person, Snapshot};

/// How one admission pass treated its candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionOutcome {
    /// Persons now in treatment.
    pub accepted: Vec<PersonId>,
    /// Persons to retry on a later pass.
    pub deferred: Vec<PersonId>,
    /// Persons already in treatment here.
    pub skipped: Vec<PersonId>,
}

/// Persons waiting for a slot, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    order: VecDeque<PersonId>,
    persons: HashMap<PersonId, Person>,
}

impl PendingQueue {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, person_id: PersonId) -> bool {
        self.persons.contains_key(&person_id)
    }

    /// Merge waiting persons with a fresh snapshot.
    ///
    /// Waiting persons come first, refreshed from the snapshot when it lists
    /// them again. New snapshot persons follow in snapshot order. Each person
    /// appears once and nobody the world model reports dead is included.
    pub fn merge(&self, snapshot: Option<&Snapshot>) -> Vec<Person> {
        let fresh: HashMap<PersonId, &Person> = snapshot
            .map(|s| s.persons.iter().map(|p| (p.id, p)).collect())
            .unwrap_or_default();

        let waiting = self
            .order
            .iter()
            .filter_map(|id| fresh.get(id).copied().or_else(|| self.persons.get(id)));
        let arrivals = snapshot.into_iter().flat_map(|s| s.persons.iter());

        let mut seen = HashSet::new();
        waiting
            .chain(arrivals)
            .filter(|p| p.status != LifeStatus::Dead)
            .filter(|p| seen.insert(p.id))
            .cloned()
            .collect()
    }

    /// Replace the queue with the given persons, keeping their order.
    pub fn reset<'a>(&mut self, persons: impl IntoIterator<Item = &'a Person>) {
        self.order.clear();
        self.persons.clear();
        for person in persons {
            if self.persons.insert(person.id, person.clone()).is_none() {
                self.order.push_back(person.id);
            }
        }
    }
}

/// Decides who gets treated.
pub struct AdmissionController {
    entity_id: EntityId,
    gateway: Arc<dyn WorldModelGateway>,
    ledger: Arc<CapacityLedger>,
    assigner: TreatmentAssigner,
    scheduler: Arc<DischargeScheduler>,
    pending: PendingQueue,
}

impl AdmissionController {
    pub fn new(
        entity_id: EntityId,
        gateway: Arc<dyn WorldModelGateway>,
        ledger: Arc<CapacityLedger>,
        assigner: TreatmentAssigner,
        scheduler: Arc<DischargeScheduler>,
    ) -> Self {
        Self {
            entity_id,
            gateway,
            ledger,
            assigner,
            scheduler,
            pending: PendingQueue::default(),
        }
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Admit as many of `persons` as capacity and staffing allow.
    ///
    /// Stops reserving at the first full-capacity denial; everyone after
    /// that is deferred. Does not talk to the world model. Discharge timers
    /// start counting once `gate` opens.
    pub async fn admit(&mut self, persons: &[Person], gate: &ReleaseGate) -> AdmissionOutcome {
        let mut outcome = AdmissionOutcome::default();
        let mut full = false;

        for person in persons {
            let person_id = person.id;

            if self.ledger.holds(person_id).await {
                debug!(person_id = %person_id, "Person already in treatment, skipping");
                outcome.skipped.push(person_id);
                continue;
            }

            if full {
                outcome.deferred.push(person_id);
                continue;
            }

            if !self.ledger.try_reserve(person_id).await {
                info!(
                    person_id = %person_id,
                    max_capacity = self.ledger.max_capacity(),
                    "Capacity exhausted, deferring remaining persons"
                );
                full = true;
                outcome.deferred.push(person_id);
                continue;
            }

            let treatment = match self.assigner.assign(person_id) {
                Assignment::Assigned(treatment) => treatment,
                Assignment::Denied { .. } => {
                    let _ = self.ledger.release(person_id).await;
                    outcome.deferred.push(person_id);
                    continue;
                }
            };

            let treatment_id = treatment.id;
            if let Err(e) = self.scheduler.arm_held(treatment, gate).await {
                error!(person_id = %person_id, treatment_id = %treatment_id, error = %e, "Could not arm discharge");
                let _ = self.ledger.release(person_id).await;
                outcome.deferred.push(person_id);
                continue;
            }

            info!(person_id = %person_id, treatment_id = %treatment_id, "Admitted patient");
            outcome.accepted.push(person_id);
        }

        outcome
    }

    /// Run one admission pass over the pending queue and `snapshot`.
    pub async fn run_pass(&mut self, snapshot: Option<&Snapshot>) -> AdmissionOutcome {
        let candidates = self.pending.merge(snapshot);
        if candidates.is_empty() {
            return AdmissionOutcome::default();
        }

        let gate = ReleaseGate::new();
        let outcome = self.admit(&candidates, &gate).await;

        let deferred: HashSet<PersonId> = outcome.deferred.iter().copied().collect();
        self.pending
            .reset(candidates.iter().filter(|p| deferred.contains(&p.id)));

        info!(
            candidates = candidates.len(),
            accepted = outcome.accepted.len(),
            deferred = outcome.deferred.len(),
            skipped = outcome.skipped.len(),
            "Admission pass complete"
        );

        if !outcome.accepted.is_empty() {
            self.report_accepted(&outcome.accepted).await;
        }
        gate.open();

        outcome
    }

    async fn report_accepted(&self, accepted: &[PersonId]) {
        match self.gateway.accept_persons(self.entity_id, accepted).await {
            Ok(decision) => {
                for person_id in &decision.rejected {
                    warn!(person_id = %person_id, "World model rejected admitted person");
                }
            }
            Err(e) => {
                warn!(error = %e, count = accepted.len(), "Failed to report accepted persons");
            }
        }
    }

    /// Run admission passes until shutdown.
    ///
    /// Each newly published snapshot is consumed by exactly one pass. Passes
    /// without a new snapshot still retry the pending queue.
    pub async fn run(
        mut self,
        mut snapshots: watch::Receiver<Option<Arc<Snapshot>>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_ms = interval.as_millis() as u64, "Starting admission loop");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let fresh = if snapshots.has_changed().unwrap_or(false) {
                        snapshots.borrow_and_update().clone()
                    } else {
                        None
                    };

                    if fresh.is_none() && self.pending.is_empty() {
                        debug!("Nothing to admit");
                        continue;
                    }

                    self.run_pass(fresh.as_deref()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Admission loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}
