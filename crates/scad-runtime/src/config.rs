//! Simulator configuration

use crate::error::{Result, RuntimeError};
use scad_asm::{ProcessorDescription, UnitDescription};
use scad_chip::UnitType;
use tracing::debug;

/// Simulator limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Scheduling rounds before a run is cut off
    pub max_steps: u64,

    /// Global memory size in 8-byte words
    pub memory_words: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            memory_words: 256,
        }
    }
}

impl SimConfig {
    /// Configuration derived from a topology
    ///
    /// Memory is sized to the largest `memory_words` parameter declared on
    /// a memory-touching unit, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidParameter`] if a `memory_words`
    /// parameter is not a non-negative integer.
    pub fn from_description(topology: &ProcessorDescription) -> Result<Self> {
        let defaults = Self::default();
        let mut memory_words = None;
        for unit in topology.units().filter(|u| {
            matches!(
                u.unit_type,
                UnitType::LoadStore | UnitType::MemoryStreamIn | UnitType::MemoryStreamOut
            )
        }) {
            if let Some(words) = unit_parameter(unit, "memory_words")? {
                memory_words = memory_words.max(Some(words));
            }
        }
        let memory_words = memory_words.unwrap_or(defaults.memory_words);

        debug!("Config for '{}': {} memory words", topology.name(), memory_words);

        Ok(Self {
            memory_words,
            ..defaults
        })
    }

    /// Override the step limit
    #[must_use]
    pub const fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Override the memory size
    #[must_use]
    pub const fn with_memory_words(mut self, memory_words: usize) -> Self {
        self.memory_words = memory_words;
        self
    }
}

/// Unit parameter as a non-negative integer, `None` if absent
///
/// # Errors
///
/// Returns [`RuntimeError::InvalidParameter`] if the value is present but
/// does not parse.
pub(crate) fn unit_parameter(unit: &UnitDescription, key: &str) -> Result<Option<usize>> {
    unit.parameter(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| RuntimeError::invalid_parameter(&unit.name, key, value))
        })
        .transpose()
}
