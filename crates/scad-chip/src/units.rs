//! Unit types and their fixed buffer layouts.
//!
//! Buffer indices per unit type are part of the machine, not of a topology:
//! every arithmetic unit has inputs `in0`, `in1`, `opc` at indices 0, 1, 2
//! and output `out` at index 0, whatever its unit number.
//!
//! | Type | Config name | Inputs | Outputs |
//! |------|-------------|--------|---------|
//! | Control | `cu` | in0, in1, in2 | none |
//! | Load-store | `lsu` | in0, in1, opc | out |
//! | Memory stream in | `memory_stream_in` | in0 | none |
//! | Memory stream out | `memory_stream_out` | none | out |
//! | Reorder buffer | `rob` | in0 | out |
//! | Arithmetic | `pu` | in0, in1, opc | out |

use std::fmt;

/// Which side of a unit a buffer sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Receives values (a move destination).
    Input,
    /// Emits values (a move source).
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// Hardware unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    /// Control unit: fetches and dispatches the program.
    Control,
    /// Load-store unit.
    LoadStore,
    /// Writes a value stream into memory.
    MemoryStreamIn,
    /// Reads a value stream out of memory.
    MemoryStreamOut,
    /// Reorder buffer.
    Reorder,
    /// Arithmetic (processing) unit.
    Arithmetic,
}

type Layout = &'static [(&'static str, u8)];

const THREE_IN: Layout = &[("in0", 0), ("in1", 1), ("in2", 2)];
const OPERANDS_IN: Layout = &[("in0", 0), ("in1", 1), ("opc", 2)];
const ONE_IN: Layout = &[("in0", 0)];
const ONE_OUT: Layout = &[("out", 0)];
const NONE: Layout = &[];

impl UnitType {
    /// Every unit type.
    pub const ALL: [Self; 6] = [
        Self::Control,
        Self::LoadStore,
        Self::MemoryStreamIn,
        Self::MemoryStreamOut,
        Self::Reorder,
        Self::Arithmetic,
    ];

    /// Name used in topology descriptions.
    #[must_use]
    pub const fn config_name(self) -> &'static str {
        match self {
            Self::Control => "cu",
            Self::LoadStore => "lsu",
            Self::MemoryStreamIn => "memory_stream_in",
            Self::MemoryStreamOut => "memory_stream_out",
            Self::Reorder => "rob",
            Self::Arithmetic => "pu",
        }
    }

    /// Parse a topology type name.
    #[must_use]
    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.config_name() == name)
    }

    /// Input buffers as `(name, index)`.
    #[must_use]
    pub const fn inputs(self) -> &'static [(&'static str, u8)] {
        match self {
            Self::Control => THREE_IN,
            Self::LoadStore | Self::Arithmetic => OPERANDS_IN,
            Self::MemoryStreamIn | Self::Reorder => ONE_IN,
            Self::MemoryStreamOut => NONE,
        }
    }

    /// Output buffers as `(name, index)`.
    #[must_use]
    pub const fn outputs(self) -> &'static [(&'static str, u8)] {
        match self {
            Self::LoadStore | Self::Arithmetic | Self::Reorder | Self::MemoryStreamOut => ONE_OUT,
            Self::Control | Self::MemoryStreamIn => NONE,
        }
    }

    /// Buffers on one side.
    #[must_use]
    pub const fn buffers(self, direction: Direction) -> &'static [(&'static str, u8)] {
        match direction {
            Direction::Input => self.inputs(),
            Direction::Output => self.outputs(),
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}
