//! Capacity ledger.
//!
//! The ledger is the single serialization point for treatment slots. The
//! admission pass reserves slots and every discharge timer releases them, all
//! through the same mutex, so `used <= max` holds under any interleaving.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::{debug, error};
use triage_id::PersonId;

use crate::error::LedgerError;

/// Tracks which persons currently occupy a treatment slot.
#[derive(Debug)]
pub struct CapacityLedger {
    max_capacity: usize,
    holders: Mutex<HashSet<PersonId>>,
}

impl CapacityLedger {
    pub fn new(max_capacity: usize) -> Self {
        Self {
            max_capacity,
            holders: Mutex::new(HashSet::with_capacity(max_capacity)),
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Take a slot for `person_id`.
    ///
    /// Returns `false`, leaving the ledger untouched, when the facility is
    /// full or the person already holds a slot.
    pub async fn try_reserve(&self, person_id: PersonId) -> bool {
        let mut holders = self.holders.lock().await;
        if holders.len() >= self.max_capacity || holders.contains(&person_id) {
            return false;
        }

        holders.insert(person_id);
        debug!(
            person_id = %person_id,
            used = holders.len(),
            max = self.max_capacity,
            "Reserved capacity slot"
        );
        true
    }

    /// Give back the slot held by `person_id`.
    pub async fn release(&self, person_id: PersonId) -> Result<(), LedgerError> {
        let mut holders = self.holders.lock().await;
        if !holders.remove(&person_id) {
            error!(person_id = %person_id, "Released a capacity slot that was not held");
            return Err(LedgerError::NotHeld(person_id));
        }

        debug!(
            person_id = %person_id,
            used = holders.len(),
            max = self.max_capacity,
            "Released capacity slot"
        );
        Ok(())
    }

    /// Whether `person_id` is currently in treatment here.
    pub async fn holds(&self, person_id: PersonId) -> bool {
        self.holders.lock().await.contains(&person_id)
    }

    pub async fn used(&self) -> usize {
        self.holders.lock().await.len()
    }

    pub async fn available(&self) -> usize {
        self.max_capacity.saturating_sub(self.used().await)
    }

    /// Persons currently holding a slot, in no particular order.
    pub async fn in_progress(&self) -> Vec<PersonId> {
        self.holders.lock().await.iter().copied().collect()
    }
}
