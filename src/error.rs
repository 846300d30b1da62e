//! Error types for map operations and configuration.

use core::fmt;
use thiserror::Error;

/// Which half of an entry a size check was made against.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Key,
    Value,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Key => f.write_str("key"),
            Field::Value => f.write_str("value"),
        }
    }
}

/// Failures surfaced by `SlotTable` and `TraceMap` operations.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum MapError {
    /// The key has no live entry.
    #[error("no entry for key")]
    NotFound,

    /// A create-only write hit an existing key.
    #[error("entry already exists")]
    AlreadyExists,

    /// Inserting a new key would exceed the map's capacity.
    #[error("map capacity exceeded")]
    CapacityExceeded,

    /// Caller passed bytes whose length does not match the map layout.
    #[error("{field} size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        field: Field,
        expected: usize,
        actual: usize,
    },

    /// The operation is disabled for this map.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl MapError {
    /// True for misuse of the fixed layout rather than an ordinary runtime outcome.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, MapError::SizeMismatch { .. })
    }
}

/// Rejected `MapConfig` values.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("capacity must be greater than 0")]
    ZeroCapacity,

    #[error("{0} size must be greater than 0")]
    ZeroSize(Field),

    #[error("capacity {capacity} exceeds the maximum of {max} entries")]
    CapacityTooLarge { capacity: usize, max: usize },

    #[error("cannot reserve storage for {capacity} entries")]
    Reserve { capacity: usize },
}
