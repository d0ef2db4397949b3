//! # triage-id
//!
//! Typed identifiers for the triage facility agent.
//!
//! Two families of IDs exist:
//!
//! - **Local IDs** are minted by the agent itself (treatments, discharges,
//!   doctors). They use a prefixed ULID format: `{prefix}_{ulid}`, e.g.
//!   `trt_01HV4Z2WQXKJNM8GPQY6VBKC3D`.
//! - **External IDs** are issued by the world model (persons, the registered
//!   entity, snapshots). They are plain integers on the wire and are accepted
//!   either as JSON numbers or as numeric strings.
//!
//! Both families are distinct types so a person ID can never be passed where
//! a treatment ID is expected.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;

#[doc(hidden)]
pub use serde as __serde;

/// Wire form of an external ID before validation.
#[doc(hidden)]
#[derive(serde::Deserialize)]
#[serde(untagged)]
pub enum RawExternalId {
    Number(i64),
    Text(String),
}
