//! Map configuration.
//!
//! A map's layout (capacity, key width, value width) is fixed when it is
//! created. The remaining switches mirror creation flags of kernel hash maps.

use crate::error::{ConfigError, Field};
use serde::{Deserialize, Serialize};

/// Largest accepted capacity. Slot handles index storage with 32 bits and
/// one position is reserved.
pub const MAX_CAPACITY: usize = u32::MAX as usize - 1;

/// Settings used to construct a `TraceMap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Maximum number of live entries.
    pub capacity: usize,
    /// Exact key length in bytes.
    pub key_size: usize,
    /// Exact value length in bytes.
    pub value_size: usize,
    /// Reserve storage for `capacity` entries up front. Clearing this is the
    /// equivalent of `BPF_F_NO_PREALLOC`.
    pub preallocate: bool,
    /// Whether `lookup_and_delete` is available. Older backends reject it.
    pub lookup_and_delete: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            key_size: 4,
            value_size: 4,
            preallocate: true,
            lookup_and_delete: true,
        }
    }
}

impl MapConfig {
    /// Config with the given layout and default flags.
    pub fn new(capacity: usize, key_size: usize, value_size: usize) -> Self {
        Self {
            capacity,
            key_size,
            value_size,
            ..Self::default()
        }
    }

    pub fn with_preallocate(mut self, preallocate: bool) -> Self {
        self.preallocate = preallocate;
        self
    }

    pub fn with_lookup_and_delete(mut self, supported: bool) -> Self {
        self.lookup_and_delete = supported;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.capacity > MAX_CAPACITY {
            return Err(ConfigError::CapacityTooLarge {
                capacity: self.capacity,
                max: MAX_CAPACITY,
            });
        }
        if self.key_size == 0 {
            return Err(ConfigError::ZeroSize(Field::Key));
        }
        if self.value_size == 0 {
            return Err(ConfigError::ZeroSize(Field::Value));
        }
        Ok(())
    }
}
