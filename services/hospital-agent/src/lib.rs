//! Triage Hospital Agent Library
//!
//! The hospital agent is a simulated medical facility. It registers with a
//! world model, polls snapshots of injured persons, admits as many as its
//! capacity and staff allow, and reports each patient's outcome when their
//! treatment ends.
//!
//! ## Architecture
//!
//! ```text
//! SnapshotPoller ──latest──▶ AdmissionController ──arm──▶ DischargeScheduler
//!                                 │                              │
//!                                 └──reserve──▶ CapacityLedger ◀─release
//! ```
//!
//! - **Capacity Ledger**: Which persons hold a treatment slot
//! - **Treatment Assigner**: Samples treatment type, doctor, duration and death
//! - **Admission Controller**: Pending queue plus per-pass admission
//! - **Discharge Scheduler**: One-shot timer per treatment, outcome reporting
//! - **Gateway**: World model interface (HTTP in production, mock in tests)

pub mod admission;
pub mod assigner;
pub mod backoff;
pub mod client;
pub mod clock;
pub mod config;
pub mod discharge;
pub mod error;
pub mod facility;
pub mod gateway;
pub mod ledger;
pub mod model;
pub mod poller;
pub mod random;
pub mod registration;
pub mod roster;
pub mod serde_date;

// Re-export commonly used types
pub use admission::{AdmissionController, AdmissionOutcome};
pub use assigner::{Assignment, TreatmentAssigner};
pub use client::WorldModelClient;
pub use clock::TimeScale;
pub use config::Config;
pub use discharge::{DischargeScheduler, TreatmentPhase};
pub use facility::{Facility, FacilityHandle};
pub use gateway::{MockGateway, WorldModelGateway};
pub use ledger::CapacityLedger;
