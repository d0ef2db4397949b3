//! Error types for the hospital agent.

use thiserror::Error;
use triage_id::{PersonId, TreatmentId};

/// Failures talking to the world model.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, timeout or body-decoding failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The world model answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The world model answered with a body we could not use.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether retrying later might succeed. Everything except a 4xx
    /// rejection is treated as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Status { status, .. } => !(400..500).contains(status),
            GatewayError::Transport(_) | GatewayError::Malformed(_) => true,
        }
    }
}

/// Capacity ledger misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A slot was released for a person who does not hold one.
    #[error("person {0} does not hold a capacity slot")]
    NotHeld(PersonId),
}

/// Discharge scheduling misuse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArmError {
    /// The treatment already has a discharge timer.
    #[error("treatment {0} is already armed")]
    AlreadyArmed(TreatmentId),
}
