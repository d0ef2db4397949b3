//! ID parsing failures.

use thiserror::Error;

/// Why a string could not be turned into an ID.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("ID is empty")]
    Empty,

    /// A local ID carried another type's prefix, e.g. `dis_` for a treatment.
    #[error("expected '{expected}_' prefix, found '{found}_'")]
    WrongPrefix {
        expected: &'static str,
        found: String,
    },

    /// A local ID without the `_` between prefix and ULID.
    #[error("ID has no '_' separator")]
    MissingSeparator,

    #[error("bad ULID: {0}")]
    BadUlid(String),

    /// A world model ID that is not an integer.
    #[error("not a numeric ID: '{0}'")]
    NotNumeric(String),
}

impl IdError {
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    pub fn is_wrong_prefix(&self) -> bool {
        matches!(self, IdError::WrongPrefix { .. })
    }
}
