//! The facility's medical staff.
//!
//! The roster is built once at startup and only read afterwards.

use chrono::NaiveDate;

use crate::model::{Doctor, Expertise, Gender};
use triage_id::DoctorId;

/// Seed staff: (name, gender, birth date as (y, m, d), expertise).
const SEED: [(&str, Gender, (i32, u32, u32), Expertise); 10] = [
    ("Sophia Williams", Gender::Female, (1985, 6, 15), Expertise::Orthopedics),
    ("John Smith", Gender::Male, (1990, 4, 22), Expertise::Traumatology),
    ("Emily Brown", Gender::Female, (1987, 3, 8), Expertise::PhysicalTherapy),
    ("Michael Johnson", Gender::Male, (1982, 12, 19), Expertise::EmergencyMedicine),
    ("Emma Garcia", Gender::Female, (1995, 9, 14), Expertise::PlasticSurgery),
    ("David Hernandez", Gender::Male, (1980, 7, 1), Expertise::Orthopedics),
    ("Jane Martinez", Gender::Female, (1993, 11, 2), Expertise::PhysicalTherapy),
    ("Chris Davis", Gender::Male, (1992, 5, 30), Expertise::EmergencyMedicine),
    ("Sarah Miller", Gender::Female, (1988, 10, 10), Expertise::PlasticSurgery),
    ("Alex Jones", Gender::Male, (1984, 8, 25), Expertise::Traumatology),
];

/// Read-only list of doctors.
#[derive(Debug, Clone, Default)]
pub struct DoctorRoster {
    doctors: Vec<Doctor>,
}

impl DoctorRoster {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self { doctors }
    }

    /// The standard ten-doctor staff.
    pub fn seeded() -> Self {
        let doctors = SEED
            .iter()
            .filter_map(|&(name, gender, (y, m, d), expertise)| {
                Some(Doctor {
                    id: DoctorId::new(),
                    name: name.to_string(),
                    gender,
                    birth_date: NaiveDate::from_ymd_opt(y, m, d)?,
                    expertise,
                })
            })
            .collect();

        Self { doctors }
    }

    pub fn doctors(&self) -> &[Doctor] {
        &self.doctors
    }

    /// Doctors holding the given specialty.
    pub fn with_expertise(&self, expertise: Expertise) -> Vec<&Doctor> {
        self.doctors
            .iter()
            .filter(|d| d.expertise == expertise)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.doctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doctors.is_empty()
    }
}
