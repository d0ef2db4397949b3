//! Discharge scheduling.
//!
//! Every admitted patient gets a one-shot timer keyed by treatment ID. When it
//! fires the scheduler reports the outcome to the world model, records a
//! discharge if the world model acknowledges it, and always gives the
//! capacity slot back.
//!
//! ```text
//! Scheduled ──fire──▶ Firing ──ack──▶ Acknowledged
//!                        └──reject/error──▶ Rejected
//! ```
//!
//! Both end states are terminal. A treatment never returns to `Scheduled`.
//!
//! Timers armed during an admission pass can be held behind a
//! [`ReleaseGate`] until the pass has reported its accepted persons, so the
//! world model always hears about an admission before the discharge.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use triage_id::{EntityId, TreatmentId};

use crate::error::ArmError;
use crate::gateway::WorldModelGateway;
use crate::ledger::CapacityLedger;
use crate::model::{Discharge, Treatment};

/// Where a treatment is in its discharge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreatmentPhase {
    /// Timer armed, outcome not yet reported.
    Scheduled,
    /// Timer fired, report in flight.
    Firing,
    /// The world model acknowledged the outcome; a discharge exists.
    Acknowledged,
    /// The world model rejected the outcome or could not be reached.
    Rejected,
}

impl TreatmentPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TreatmentPhase::Acknowledged | TreatmentPhase::Rejected)
    }
}

/// Holds timers back until opened.
///
/// Dropping the gate without opening it also releases its timers.
#[derive(Debug)]
pub struct ReleaseGate {
    tx: watch::Sender<bool>,
}

impl ReleaseGate {
    pub fn new() -> Self {
        Self {
            tx: watch::channel(false).0,
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Let every timer held by this gate start counting down.
    pub fn open(self) {
        self.tx.send_replace(true);
    }
}

impl Default for ReleaseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct TreatmentRecord {
    treatment: Treatment,
    phase: TreatmentPhase,
}

/// Owns treatments from admission until their outcome is reported.
pub struct DischargeScheduler {
    entity_id: EntityId,
    gateway: Arc<dyn WorldModelGateway>,
    ledger: Arc<CapacityLedger>,

    /// Every treatment ever armed, kept for history.
    treatments: RwLock<HashMap<TreatmentId, TreatmentRecord>>,

    /// Outstanding timers.
    timers: Mutex<HashMap<TreatmentId, JoinHandle<()>>>,

    /// Acknowledged outcomes in the order they happened.
    discharges: RwLock<Vec<Discharge>>,
}

impl DischargeScheduler {
    pub fn new(
        entity_id: EntityId,
        gateway: Arc<dyn WorldModelGateway>,
        ledger: Arc<CapacityLedger>,
    ) -> Self {
        Self {
            entity_id,
            gateway,
            ledger,
            treatments: RwLock::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            discharges: RwLock::new(Vec::new()),
        }
    }

    /// Arm the discharge timer for `treatment`.
    ///
    /// The timer fires after the treatment's effective delay. A treatment ID
    /// can only be armed once.
    pub async fn arm(self: &Arc<Self>, treatment: Treatment) -> Result<(), ArmError> {
        self.arm_timer(treatment, None).await
    }

    /// Arm the discharge timer for `treatment`, starting its countdown only
    /// once `gate` opens or is dropped.
    pub async fn arm_held(
        self: &Arc<Self>,
        treatment: Treatment,
        gate: &ReleaseGate,
    ) -> Result<(), ArmError> {
        self.arm_timer(treatment, Some(gate.subscribe())).await
    }

    async fn arm_timer(
        self: &Arc<Self>,
        treatment: Treatment,
        gate: Option<watch::Receiver<bool>>,
    ) -> Result<(), ArmError> {
        let treatment_id = treatment.id;
        let delay = treatment.delay;

        // Held across spawn so a zero-delay timer cannot finish and deregister
        // before its handle is stored.
        let mut timers = self.timers.lock().await;
        {
            let mut treatments = self.treatments.write().await;
            if timers.contains_key(&treatment_id) || treatments.contains_key(&treatment_id) {
                warn!(treatment_id = %treatment_id, "Rejected duplicate discharge timer");
                return Err(ArmError::AlreadyArmed(treatment_id));
            }

            debug!(
                treatment_id = %treatment_id,
                person_id = %treatment.patient_id,
                delay_ms = delay.as_millis() as u64,
                dies = treatment.is_dead(),
                "Arming discharge timer"
            );
            treatments.insert(
                treatment_id,
                TreatmentRecord {
                    treatment,
                    phase: TreatmentPhase::Scheduled,
                },
            );
        }

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Some(mut gate) = gate {
                // Err means the gate was dropped, which also releases.
                let _ = gate.wait_for(|open| *open).await;
            }
            tokio::time::sleep(delay).await;
            scheduler.fire(treatment_id).await;
        });
        timers.insert(treatment_id, handle);

        Ok(())
    }

    /// Finalize a treatment whose timer elapsed.
    ///
    /// Returns the terminal phase, or `None` if the firing was aborted because
    /// the treatment is unknown or already fired. Only the treatment's own
    /// timer calls this.
    pub(crate) async fn fire(&self, treatment_id: TreatmentId) -> Option<TreatmentPhase> {
        let treatment = {
            let mut treatments = self.treatments.write().await;
            let Some(record) = treatments.get_mut(&treatment_id) else {
                error!(treatment_id = %treatment_id, "Discharge fired for unknown treatment");
                return None;
            };
            if record.phase != TreatmentPhase::Scheduled {
                error!(
                    treatment_id = %treatment_id,
                    phase = ?record.phase,
                    "Discharge fired for a treatment that is not scheduled"
                );
                return None;
            }
            record.phase = TreatmentPhase::Firing;
            record.treatment.clone()
        };

        let person_id = treatment.patient_id;
        let status = treatment.outcome();

        let phase = match self
            .gateway
            .report_outcome(self.entity_id, status, &[person_id])
            .await
        {
            Ok(decision) if decision.is_accepted(person_id) => {
                let discharge = Discharge::new(&treatment, status);
                info!(
                    discharge_id = %discharge.id,
                    treatment_id = %treatment_id,
                    person_id = %person_id,
                    status = %status,
                    "Patient discharged"
                );
                self.discharges.write().await.push(discharge);
                TreatmentPhase::Acknowledged
            }
            Ok(_) => {
                warn!(
                    treatment_id = %treatment_id,
                    person_id = %person_id,
                    status = %status,
                    "World model rejected discharge"
                );
                TreatmentPhase::Rejected
            }
            Err(e) => {
                warn!(
                    treatment_id = %treatment_id,
                    person_id = %person_id,
                    status = %status,
                    error = %e,
                    "Failed to report discharge"
                );
                TreatmentPhase::Rejected
            }
        };

        if let Some(record) = self.treatments.write().await.get_mut(&treatment_id) {
            record.phase = phase;
        }

        // The patient has left regardless of what the world model said.
        // An unheld slot is logged by the ledger.
        let _ = self.ledger.release(person_id).await;
        self.timers.lock().await.remove(&treatment_id);

        Some(phase)
    }

    /// Abort every outstanding timer. Used on process shutdown.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        if !timers.is_empty() {
            info!(count = timers.len(), "Abandoning outstanding discharge timers");
        }
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    /// A treatment and its current phase.
    pub async fn treatment(&self, treatment_id: TreatmentId) -> Option<(Treatment, TreatmentPhase)> {
        self.treatments
            .read()
            .await
            .get(&treatment_id)
            .map(|r| (r.treatment.clone(), r.phase))
    }

    /// All treatments ever armed, in no particular order.
    pub async fn treatments(&self) -> Vec<(Treatment, TreatmentPhase)> {
        self.treatments
            .read()
            .await
            .values()
            .map(|r| (r.treatment.clone(), r.phase))
            .collect()
    }

    pub async fn discharges(&self) -> Vec<Discharge> {
        self.discharges.read().await.clone()
    }

    /// Number of timers that have not finished.
    pub async fn in_flight(&self) -> usize {
        self.timers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use triage_id::{DoctorId, PersonId};

    use super::*;
    use crate::clock::TimeScale;
    use crate::gateway::{GatewayCall, MockGateway};
    use crate::model::{DischargeStatus, TreatmentType};

    struct Harness {
        gateway: Arc<MockGateway>,
        ledger: Arc<CapacityLedger>,
        scheduler: Arc<DischargeScheduler>,
    }

    fn harness(capacity: usize) -> Harness {
        let gateway = Arc::new(MockGateway::new());
        let ledger = Arc::new(CapacityLedger::new(capacity));
        let scheduler = Arc::new(DischargeScheduler::new(
            EntityId::new(1),
            gateway.clone(),
            Arc::clone(&ledger),
        ));
        Harness {
            gateway,
            ledger,
            scheduler,
        }
    }

    fn treatment(person: i64, duration: u32, death_offset: Option<u32>) -> Treatment {
        Treatment::new(
            PersonId::new(person),
            DoctorId::new(),
            TreatmentType::Fracture,
            duration,
            death_offset,
            &TimeScale::identity(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_discharge_after_duration() {
        let h = harness(2);
        assert!(h.ledger.try_reserve(PersonId::new(1)).await);
        let t = treatment(1, 4, None);
        let id = t.id;
        h.scheduler.arm(t).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3_900)).await;
        assert!(h.scheduler.discharges().await.is_empty());
        assert_eq!(h.ledger.used().await, 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let discharges = h.scheduler.discharges().await;
        assert_eq!(discharges.len(), 1);
        assert_eq!(discharges[0].treatment_id, id);
        assert_eq!(discharges[0].status, DischargeStatus::Healthy);
        assert_eq!(h.ledger.used().await, 0);
        assert_eq!(h.scheduler.in_flight().await, 0);
        assert_eq!(
            h.scheduler.treatment(id).await.unwrap().1,
            TreatmentPhase::Acknowledged
        );
        assert_eq!(
            h.gateway.calls().await,
            vec![GatewayCall::ServiceDone(vec![PersonId::new(1)])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_arm_is_rejected() {
        let h = harness(1);
        assert!(h.ledger.try_reserve(PersonId::new(1)).await);
        let t = treatment(1, 2, None);

        h.scheduler.arm(t.clone()).await.unwrap();
        assert_eq!(
            h.scheduler.arm(t.clone()).await,
            Err(ArmError::AlreadyArmed(t.id))
        );
        assert_eq!(h.scheduler.in_flight().await, 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.scheduler.discharges().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fire_unknown_treatment_is_noop() {
        let h = harness(1);
        assert_eq!(h.scheduler.fire(TreatmentId::new()).await, None);
        assert!(h.gateway.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_twice_discharges_once() {
        let h = harness(1);
        assert!(h.ledger.try_reserve(PersonId::new(1)).await);
        let t = treatment(1, 1, None);
        let id = t.id;
        h.scheduler.arm(t).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.scheduler.fire(id).await, None);
        assert_eq!(h.scheduler.discharges().await.len(), 1);
        assert_eq!(h.ledger.used().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_world_model_still_releases() {
        let h = harness(1);
        h.gateway.set_unavailable(true);
        assert!(h.ledger.try_reserve(PersonId::new(1)).await);
        let t = treatment(1, 1, Some(0));
        let id = t.id;
        h.scheduler.arm(t).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.scheduler.discharges().await.is_empty());
        assert_eq!(h.ledger.used().await, 0);
        assert_eq!(
            h.scheduler.treatment(id).await.unwrap().1,
            TreatmentPhase::Rejected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_timer_waits_for_gate() {
        let h = harness(2);
        assert!(h.ledger.try_reserve(PersonId::new(1)).await);
        let gate = ReleaseGate::new();
        let t = treatment(1, 1, Some(0));
        let id = t.id;
        h.scheduler.arm_held(t, &gate).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.gateway.calls().await.is_empty());
        assert_eq!(
            h.scheduler.treatment(id).await.unwrap().1,
            TreatmentPhase::Scheduled
        );

        gate.open();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            h.gateway.calls().await,
            vec![GatewayCall::Death(vec![PersonId::new(1)])]
        );
        assert_eq!(h.ledger.used().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_gate_releases_timer() {
        let h = harness(1);
        assert!(h.ledger.try_reserve(PersonId::new(1)).await);
        let gate = ReleaseGate::new();
        h.scheduler
            .arm_held(treatment(1, 2, None), &gate)
            .await
            .unwrap();
        drop(gate);

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(h.scheduler.discharges().await.len(), 1);
        assert_eq!(h.scheduler.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_timers() {
        let h = harness(3);
        for person in 1..=3 {
            assert!(h.ledger.try_reserve(PersonId::new(person)).await);
            h.scheduler.arm(treatment(person, 5, None)).await.unwrap();
        }
        assert_eq!(h.scheduler.in_flight().await, 3);

        h.scheduler.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(h.scheduler.in_flight().await, 0);
        assert!(h.scheduler.discharges().await.is_empty());
        assert!(h.gateway.calls().await.is_empty());
    }
}
