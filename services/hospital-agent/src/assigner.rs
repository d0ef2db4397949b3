//! Treatment assignment.
//!
//! For an admitted person the assigner picks a treatment type, finds a doctor
//! with the matching specialty, samples how long the treatment takes and
//! whether the patient dies during it.

use std::sync::Arc;

use tracing::{debug, info};
use triage_id::PersonId;

use crate::clock::TimeScale;
use crate::model::{Expertise, Treatment, TreatmentType};
use crate::random::RandomSource;
use crate::roster::DoctorRoster;

/// Result of an assignment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Assigned(Treatment),
    /// No doctor holds the required specialty. The caller should defer the
    /// person.
    Denied {
        treatment_type: TreatmentType,
        expertise: Expertise,
    },
}

/// Builds treatments for admitted persons.
pub struct TreatmentAssigner {
    roster: Arc<DoctorRoster>,
    scale: TimeScale,
    death_rate: f64,
    rng: Box<dyn RandomSource>,
}

impl TreatmentAssigner {
    pub fn new(
        roster: Arc<DoctorRoster>,
        scale: TimeScale,
        death_rate: f64,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            roster,
            scale,
            death_rate: death_rate.clamp(0.0, 1.0),
            rng,
        }
    }

    /// Propose a treatment for `patient_id`.
    pub fn assign(&mut self, patient_id: PersonId) -> Assignment {
        let catalog = TreatmentType::CATALOG;
        let treatment_type = catalog[self.rng.index(catalog.len())];
        let expertise = treatment_type.required_expertise();

        let candidates = self.roster.with_expertise(expertise);
        if candidates.is_empty() {
            info!(
                person_id = %patient_id,
                treatment_type = %treatment_type,
                expertise = %expertise,
                "No doctor available for required expertise"
            );
            return Assignment::Denied {
                treatment_type,
                expertise,
            };
        }
        let doctor = candidates[self.rng.index(candidates.len())];

        let (low, high) = treatment_type.base_duration_range();
        let duration = self.scale.scale_units(self.rng.between(low, high));

        let death_offset = if self.rng.chance(self.death_rate) {
            Some(self.rng.between(0, duration))
        } else {
            None
        };

        let treatment = Treatment::new(
            patient_id,
            doctor.id,
            treatment_type,
            duration,
            death_offset,
            &self.scale,
        );

        debug!(
            treatment_id = %treatment.id,
            person_id = %patient_id,
            doctor_id = %doctor.id,
            treatment_type = %treatment_type,
            duration,
            death_offset = ?death_offset,
            "Assigned treatment"
        );

        Assignment::Assigned(treatment)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use proptest::prelude::*;
    use triage_id::DoctorId;

    use super::*;
    use crate::model::{Doctor, Gender};
    use crate::random::{ScriptedRandom, StdRandom};

    fn doctor(name: &str, expertise: Expertise) -> Doctor {
        Doctor {
            id: DoctorId::new(),
            name: name.to_string(),
            gender: Gender::Female,
            birth_date: NaiveDate::from_ymd_opt(1980, 1, 1).unwrap(),
            expertise,
        }
    }

    fn assigner(roster: DoctorRoster, rng: ScriptedRandom) -> TreatmentAssigner {
        TreatmentAssigner::new(
            Arc::new(roster),
            TimeScale::identity(),
            0.2,
            Box::new(rng),
        )
    }

    #[test]
    fn test_assigns_matching_doctor() {
        let roster = DoctorRoster::new(vec![
            doctor("A", Expertise::Traumatology),
            doctor("B", Expertise::Orthopedics),
            doctor("C", Expertise::Orthopedics),
        ]);
        let second_ortho = roster.doctors()[2].id;
        let rng = ScriptedRandom {
            // fracture, then the second orthopedist
            indices: [0, 1].into(),
            values: [7].into(),
            chances: [false].into(),
        };

        let Assignment::Assigned(treatment) = assigner(roster, rng).assign(PersonId::new(5)) else {
            panic!("expected a treatment");
        };
        assert_eq!(treatment.treatment_type, TreatmentType::Fracture);
        assert_eq!(treatment.doctor_id, second_ortho);
        assert_eq!(treatment.duration, 7);
        assert_eq!(treatment.death_offset, None);
        assert_eq!(treatment.delay, Duration::from_secs(7));
    }

    #[test]
    fn test_denied_without_specialist() {
        let roster = DoctorRoster::new(vec![doctor("A", Expertise::EmergencyMedicine)]);
        let rng = ScriptedRandom {
            indices: [3].into(), // burn
            ..Default::default()
        };

        assert_eq!(
            assigner(roster, rng).assign(PersonId::new(1)),
            Assignment::Denied {
                treatment_type: TreatmentType::Burn,
                expertise: Expertise::PlasticSurgery,
            }
        );
    }

    #[test]
    fn test_death_truncates_treatment() {
        let roster = DoctorRoster::seeded();
        let rng = ScriptedRandom {
            indices: [4, 0].into(), // dislocation
            values: [5, 2].into(),
            chances: [true].into(),
        };

        let Assignment::Assigned(treatment) = assigner(roster, rng).assign(PersonId::new(1)) else {
            panic!("expected a treatment");
        };
        assert_eq!(treatment.duration, 5);
        assert_eq!(treatment.death_offset, Some(2));
        assert_eq!(treatment.effective_duration(), 2);
        assert_eq!(treatment.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_duration_is_scaled() {
        let roster = DoctorRoster::seeded();
        let rng = ScriptedRandom {
            indices: [0, 0].into(),
            values: [8].into(),
            ..Default::default()
        };
        let mut assigner = TreatmentAssigner::new(
            Arc::new(roster),
            TimeScale::new(4.0, Duration::from_millis(10)),
            0.0,
            Box::new(rng),
        );

        let Assignment::Assigned(treatment) = assigner.assign(PersonId::new(1)) else {
            panic!("expected a treatment");
        };
        assert_eq!(treatment.duration, 2);
        assert_eq!(treatment.delay, Duration::from_millis(20));
    }

    proptest! {
        #[test]
        fn prop_death_offset_within_duration(seed in any::<u64>(), rate in 0.0f64..=1.0) {
            let mut assigner = TreatmentAssigner::new(
                Arc::new(DoctorRoster::seeded()),
                TimeScale::identity(),
                rate,
                Box::new(StdRandom::seeded(seed)),
            );
            for id in 0..16 {
                if let Assignment::Assigned(t) = assigner.assign(PersonId::new(id)) {
                    prop_assert!(t.duration >= 1);
                    if let Some(offset) = t.death_offset {
                        prop_assert!(offset <= t.duration);
                    }
                }
            }
        }
    }
}
