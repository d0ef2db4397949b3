//! Typed ID definitions for every entity the agent tracks.

use crate::{define_external_id, define_id};

// =============================================================================
// Local IDs
// =============================================================================

define_id!(
    /// Identifies one course of treatment for one patient.
    TreatmentId,
    "trt"
);
define_id!(
    /// Identifies the terminal outcome record of a treatment.
    DischargeId,
    "dis"
);
define_id!(
    /// Identifies a member of the facility's medical staff.
    DoctorId,
    "doc"
);

// =============================================================================
// External IDs
// =============================================================================

define_external_id!(
    /// A person known to the world model.
    PersonId
);
define_external_id!(
    /// The ID the world model assigned to this facility at registration.
    EntityId
);
define_external_id!(
    /// A point-in-time snapshot served by the world model.
    SnapshotId
);
