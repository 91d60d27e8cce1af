//! Error types for the buffer runtime and the simulator

use scad_chip::BufferAddress;
use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Which stream of a buffer an overflow refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Input buffer source registrations
    Sources,
    /// Output buffer destination tags
    Destinations,
    /// Output buffer values
    Values,
    /// Manager instruction inbox
    Instructions,
    /// Packets held by the interconnect
    InFlight,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sources => write!(f, "source"),
            Self::Destinations => write!(f, "destination"),
            Self::Values => write!(f, "value"),
            Self::Instructions => write!(f, "instruction"),
            Self::InFlight => write!(f, "in-flight"),
        }
    }
}

/// Errors raised by the runtime
///
/// Full, empty and no-packet states are not errors; they are queried
/// before acting. These variants signal a broken protocol contract, a
/// malformed image or a faulting unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Push into a stream that reported full
    #[error("Push into full {stream} stream (capacity {capacity})")]
    BufferOverflow {
        /// Stream written
        stream: Stream,
        /// Capacity of the stream
        capacity: usize,
    },

    /// Data arrived with no open registration for its sender
    #[error("Data from {from} without a matching source registration")]
    UnmatchedData {
        /// Emitting output buffer
        from: BufferAddress,
    },

    /// Address names no buffer of the loaded topology
    #[error("No buffer at {address}")]
    UnknownBuffer {
        /// Offending address
        address: BufferAddress,
    },

    /// Program image is malformed
    #[error("Invalid program image: {reason}")]
    InvalidImage {
        /// Reason for rejection
        reason: String,
    },

    /// Unit received an opcode it does not implement
    #[error("Unit {unit} ({unit_type}) received invalid micro-op {opcode}")]
    InvalidMicroOp {
        /// Unit number
        unit: u8,
        /// Unit type name
        unit_type: &'static str,
        /// Raw opcode
        opcode: u32,
    },

    /// Division or remainder by zero on an arithmetic unit
    #[error("Unit {unit}: division by zero")]
    DivisionByZero {
        /// Unit number
        unit: u8,
    },

    /// Memory access outside the configured memory
    #[error("Unit {unit}: memory address {address} out of bounds (memory has {len} words)")]
    MemoryOutOfBounds {
        /// Unit number
        unit: u8,
        /// Word address
        address: u64,
        /// Memory size in words
        len: usize,
    },

    /// Host memory access outside the configured memory
    #[error("Memory range {offset}+{len} out of bounds (memory has {size} words)")]
    MemoryRange {
        /// First word
        offset: usize,
        /// Number of words
        len: usize,
        /// Memory size in words
        size: usize,
    },

    /// Unit parameter present but not a valid value for its key
    #[error("Unit '{unit}': parameter {key} = '{value}' is not a non-negative integer")]
    InvalidParameter {
        /// Unit name
        unit: String,
        /// Parameter key
        key: String,
        /// Value as written
        value: String,
    },

    /// Topology has no control unit to run the program
    #[error("Topology has no control unit")]
    NoControlUnit,

    /// Topology has more than one control unit
    #[error("Topology has control units {first} and {second}, expected exactly one")]
    MultipleControlUnits {
        /// First control unit name
        first: String,
        /// Second control unit name
        second: String,
    },

    /// Operation requires a state the backend is not in
    #[error("Backend not ready: {reason}")]
    NotReady {
        /// What is missing
        reason: String,
    },
}

impl RuntimeError {
    /// Create an overflow error
    pub fn overflow(stream: Stream, capacity: usize) -> Self {
        Self::BufferOverflow { stream, capacity }
    }

    /// Create an invalid image error
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }

    /// Create a not ready error
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        unit: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            unit: unit.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a memory bounds error
    pub fn out_of_bounds(unit: u8, address: u64, len: usize) -> Self {
        Self::MemoryOutOfBounds { unit, address, len }
    }
}
