//! Domain records shared across the agent.
//!
//! Persons and snapshots arrive from the world model and are never mutated
//! locally. Doctors are seeded once at startup. Treatments and discharges are
//! created by the agent itself.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use triage_id::{DischargeId, DoctorId, PersonId, SnapshotId, TreatmentId};

use crate::clock::TimeScale;
use crate::serde_date;

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    #[serde(other)]
    Unspecified,
}

/// Life status as reported by the world model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    Alive,
    Injured,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expertise {
    Orthopedics,
    Traumatology,
    PhysicalTherapy,
    EmergencyMedicine,
    PlasticSurgery,
}

impl std::fmt::Display for Expertise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expertise::Orthopedics => write!(f, "orthopedics"),
            Expertise::Traumatology => write!(f, "traumatology"),
            Expertise::PhysicalTherapy => write!(f, "physical_therapy"),
            Expertise::EmergencyMedicine => write!(f, "emergency_medicine"),
            Expertise::PlasticSurgery => write!(f, "plastic_surgery"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentType {
    Fracture,
    WoundCare,
    Physiotherapy,
    Burn,
    Dislocation,
}

impl TreatmentType {
    /// Every treatment the facility offers, in catalog order.
    pub const CATALOG: [TreatmentType; 5] = [
        TreatmentType::Fracture,
        TreatmentType::WoundCare,
        TreatmentType::Physiotherapy,
        TreatmentType::Burn,
        TreatmentType::Dislocation,
    ];

    /// The specialty a doctor needs to perform this treatment.
    pub fn required_expertise(self) -> Expertise {
        match self {
            TreatmentType::Fracture | TreatmentType::Dislocation => Expertise::Orthopedics,
            TreatmentType::WoundCare => Expertise::Traumatology,
            TreatmentType::Physiotherapy => Expertise::PhysicalTherapy,
            TreatmentType::Burn => Expertise::PlasticSurgery,
        }
    }

    /// Inclusive range of base time units this treatment takes before scaling.
    pub fn base_duration_range(self) -> (u32, u32) {
        match self {
            TreatmentType::Fracture => (6, 8),
            TreatmentType::WoundCare => (1, 3),
            TreatmentType::Physiotherapy => (2, 4),
            TreatmentType::Burn => (1, 4),
            TreatmentType::Dislocation => (3, 5),
        }
    }
}

impl std::fmt::Display for TreatmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreatmentType::Fracture => write!(f, "fracture"),
            TreatmentType::WoundCare => write!(f, "wound_care"),
            TreatmentType::Physiotherapy => write!(f, "physiotherapy"),
            TreatmentType::Burn => write!(f, "burn"),
            TreatmentType::Dislocation => write!(f, "dislocation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DischargeStatus {
    Healthy,
    Dead,
}

impl std::fmt::Display for DischargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DischargeStatus::Healthy => write!(f, "healthy"),
            DischargeStatus::Dead => write!(f, "dead"),
        }
    }
}

// =============================================================================
// People
// =============================================================================

/// A person as seen in a world-model snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub gender: Gender,
    #[serde(with = "serde_date")]
    pub birth_date: NaiveDate,
    pub national_code: String,
    #[serde(default, with = "serde_date::option")]
    pub death_date: Option<NaiveDate>,
    pub status: LifeStatus,
}

/// A member of the facility's staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub gender: Gender,
    #[serde(with = "serde_date")]
    pub birth_date: NaiveDate,
    pub expertise: Expertise,
}

// =============================================================================
// Snapshots
// =============================================================================

/// Point-in-time list of persons needing care.
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    #[serde(default)]
    pub persons: Vec<Person>,
    /// Whether a disaster is currently active.
    #[serde(default, rename = "earthquake_status", alias = "hazard")]
    pub hazard_active: bool,
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Treatments and discharges
// =============================================================================

/// One course of care for one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Treatment {
    pub id: TreatmentId,
    pub patient_id: PersonId,
    pub doctor_id: DoctorId,
    pub treatment_type: TreatmentType,
    pub started_at: DateTime<Utc>,
    /// Full modeled length in scaled time units.
    pub duration: u32,
    /// Units into the treatment at which the patient dies, if they do.
    pub death_offset: Option<u32>,
    /// Wall-clock delay until the outcome is known.
    #[serde(skip)]
    pub delay: Duration,
    pub ends_at: DateTime<Utc>,
}

impl Treatment {
    /// Build a treatment starting now. A death offset past the end is
    /// clamped to the duration.
    pub fn new(
        patient_id: PersonId,
        doctor_id: DoctorId,
        treatment_type: TreatmentType,
        duration: u32,
        death_offset: Option<u32>,
        scale: &TimeScale,
    ) -> Self {
        let death_offset = death_offset.map(|offset| offset.min(duration));
        let delay = scale.duration(death_offset.unwrap_or(duration));
        let started_at = Utc::now();
        let ends_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| started_at.checked_add_signed(d))
            .unwrap_or(started_at);

        Self {
            id: TreatmentId::new(),
            patient_id,
            doctor_id,
            treatment_type,
            started_at,
            duration,
            death_offset,
            delay,
            ends_at,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.death_offset.is_some()
    }

    /// Units until the outcome, after death truncation.
    pub fn effective_duration(&self) -> u32 {
        self.death_offset.unwrap_or(self.duration)
    }

    pub fn outcome(&self) -> DischargeStatus {
        if self.is_dead() {
            DischargeStatus::Dead
        } else {
            DischargeStatus::Healthy
        }
    }
}

/// Terminal, acknowledged outcome of a treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discharge {
    pub id: DischargeId,
    pub treatment_id: TreatmentId,
    pub patient_id: PersonId,
    pub status: DischargeStatus,
    pub discharged_at: DateTime<Utc>,
}

impl Discharge {
    pub fn new(treatment: &Treatment, status: DischargeStatus) -> Self {
        Self {
            id: DischargeId::new(),
            treatment_id: treatment.id,
            patient_id: treatment.patient_id,
            status,
            discharged_at: Utc::now(),
        }
    }
}
