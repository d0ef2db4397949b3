//! World model gateway interface and mock implementation.
//!
//! The gateway abstracts every call the agent makes to the world model:
//! - Registering the facility
//! - Fetching snapshots of persons needing care
//! - Reporting accepted persons and treatment outcomes
//!
//! A mock implementation is provided for testing and development.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use triage_id::{EntityId, PersonId};

use crate::error::GatewayError;
use crate::model::{DischargeStatus, Doctor, Snapshot};

/// Registration body.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub max_capacity: usize,
    pub eav: FacilityAttributes,
}

/// Free-form attributes the world model stores for the facility.
#[derive(Debug, Clone, Serialize)]
pub struct FacilityAttributes {
    pub name: String,
    pub doctors: Vec<Doctor>,
    pub creation_date: DateTime<Utc>,
}

/// Registration answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Registration {
    pub entity_id: EntityId,
    #[serde(default = "default_time_rate")]
    pub time_rate: f64,
}

fn default_time_rate() -> f64 {
    1.0
}

/// Body shared by accept, service-done and death reports.
#[derive(Debug, Clone, Serialize)]
pub struct PersonsRequest {
    pub entity_id: EntityId,
    pub persons_id: Vec<PersonId>,
}

/// The world model's verdict on a batch of persons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PersonsDecision {
    #[serde(default)]
    pub accepted: Vec<PersonId>,
    #[serde(default)]
    pub rejected: Vec<PersonId>,
}

impl PersonsDecision {
    pub fn is_accepted(&self, person_id: PersonId) -> bool {
        self.accepted.contains(&person_id)
    }
}

/// World model interface.
#[async_trait]
pub trait WorldModelGateway: Send + Sync {
    /// Register the facility and learn its entity ID and time rate.
    async fn register(&self, request: &RegisterRequest) -> Result<Registration, GatewayError>;

    /// Fetch the current snapshot for this facility.
    async fn fetch_snapshot(&self, entity_id: EntityId) -> Result<Snapshot, GatewayError>;

    /// Report persons the facility has taken in.
    async fn accept_persons(
        &self,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError>;

    /// Report persons discharged healthy.
    async fn report_service_done(
        &self,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError>;

    /// Report persons who died during treatment.
    async fn report_death(
        &self,
        entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError>;

    /// Report a treatment outcome through the matching endpoint.
    async fn report_outcome(
        &self,
        entity_id: EntityId,
        status: DischargeStatus,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        match status {
            DischargeStatus::Healthy => self.report_service_done(entity_id, persons).await,
            DischargeStatus::Dead => self.report_death(entity_id, persons).await,
        }
    }
}

/// A call recorded by [`MockGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Register,
    Snapshot,
    Accept(Vec<PersonId>),
    ServiceDone(Vec<PersonId>),
    Death(Vec<PersonId>),
}

/// In-memory gateway for testing and development.
///
/// Accepts every person unless told to reject them, serves queued snapshots
/// in order, and records every call.
pub struct MockGateway {
    registration: Registration,
    /// Registrations to fail before one succeeds.
    failing_registrations: AtomicU32,
    /// Whether every call should fail with a 503.
    unavailable: AtomicBool,
    /// Latency before an accept report arrives, in milliseconds.
    accept_delay_ms: AtomicU64,
    snapshots: Mutex<VecDeque<Snapshot>>,
    rejected: Mutex<HashSet<PersonId>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl MockGateway {
    /// Create a mock gateway that registers as entity 1 with time rate 1.0.
    pub fn new() -> Self {
        Self::with_registration(Registration {
            entity_id: EntityId::new(1),
            time_rate: 1.0,
        })
    }

    pub fn with_registration(registration: Registration) -> Self {
        Self {
            registration,
            failing_registrations: AtomicU32::new(0),
            unavailable: AtomicBool::new(false),
            accept_delay_ms: AtomicU64::new(0),
            snapshots: Mutex::new(VecDeque::new()),
            rejected: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `count` registrations.
    pub fn fail_registrations(&self, count: u32) {
        self.failing_registrations.store(count, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every accept report by `delay` before it is recorded.
    pub fn set_accept_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.accept_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub async fn push_snapshot(&self, snapshot: Snapshot) {
        self.snapshots.lock().await.push_back(snapshot);
    }

    /// Reject `person_id` in every subsequent report.
    pub async fn reject(&self, person_id: PersonId) {
        self.rejected.lock().await.insert(person_id);
    }

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().await.clone()
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Status {
                status: 503,
                body: "mock gateway unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn decide(&self, persons: &[PersonId]) -> PersonsDecision {
        let rejected = self.rejected.lock().await;
        let (rejected_ids, accepted_ids): (Vec<PersonId>, Vec<PersonId>) =
            persons.iter().partition(|id| rejected.contains(*id));
        PersonsDecision {
            accepted: accepted_ids,
            rejected: rejected_ids,
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorldModelGateway for MockGateway {
    async fn register(&self, request: &RegisterRequest) -> Result<Registration, GatewayError> {
        self.calls.lock().await.push(GatewayCall::Register);
        self.check_available()?;

        let failed = self
            .failing_registrations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(GatewayError::Malformed("[MOCK] registration refused".to_string()));
        }

        info!(
            name = %request.eav.name,
            max_capacity = request.max_capacity,
            "[MOCK] Registered facility"
        );
        Ok(self.registration.clone())
    }

    async fn fetch_snapshot(&self, _entity_id: EntityId) -> Result<Snapshot, GatewayError> {
        self.calls.lock().await.push(GatewayCall::Snapshot);
        self.check_available()?;

        self.snapshots
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                body: "no snapshot queued".to_string(),
            })
    }

    async fn accept_persons(
        &self,
        _entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        let delay = self.accept_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.calls.lock().await.push(GatewayCall::Accept(persons.to_vec()));
        self.check_available()?;
        Ok(self.decide(persons).await)
    }

    async fn report_service_done(
        &self,
        _entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        self.calls
            .lock()
            .await
            .push(GatewayCall::ServiceDone(persons.to_vec()));
        self.check_available()?;
        Ok(self.decide(persons).await)
    }

    async fn report_death(
        &self,
        _entity_id: EntityId,
        persons: &[PersonId],
    ) -> Result<PersonsDecision, GatewayError> {
        self.calls.lock().await.push(GatewayCall::Death(persons.to_vec()));
        self.check_available()?;
        Ok(self.decide(persons).await)
    }
}
