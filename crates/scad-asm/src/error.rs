//! Error types for topology construction and assembly

use scad_chip::Direction;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for file-level entry points
pub type Result<T> = std::result::Result<T, ScadAsmError>;

/// Errors building a [`ProcessorDescription`](crate::ProcessorDescription)
///
/// Construction is all-or-nothing: on any of these no description exists.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Description is not well-formed TOML or has the wrong shape
    #[error("Malformed topology description: {source}")]
    Malformed {
        /// Underlying deserialisation error
        #[from]
        source: toml::de::Error,
    },

    /// No `[[interconnect]]` table
    #[error("No interconnect given in topology '{processor}'")]
    MissingInterconnect {
        /// Processor name
        processor: String,
    },

    /// More than one `[[interconnect]]` table
    #[error("{count} interconnects given in topology '{processor}', expected exactly one")]
    MultipleInterconnects {
        /// Processor name
        processor: String,
        /// Number of interconnect declarations
        count: usize,
    },

    /// Two units share a name
    #[error("Two units with name '{name}'")]
    DuplicateUnit {
        /// Repeated name
        name: String,
    },

    /// Type name not in the unit layout table
    #[error("Unit '{unit}' has unknown type '{unit_type}'")]
    UnknownUnitType {
        /// Unit name
        unit: String,
        /// Offending type name
        unit_type: String,
    },

    /// Two units share a number (and would share addresses)
    #[error("Units '{first}' and '{second}' both have number {number}")]
    DuplicateUnitNumber {
        /// Shared number
        number: u8,
        /// Unit declared first
        first: String,
        /// Unit declared second
        second: String,
    },

    /// Unit number is reserved or not addressable by the interconnect
    #[error("Unit '{unit}' number {number} out of range (interconnect serves {unit_count} units, 255 is reserved)")]
    UnitNumberOutOfRange {
        /// Unit name
        unit: String,
        /// Declared number
        number: u32,
        /// Interconnect size
        unit_count: u32,
    },

    /// Buffer depth outside 1..=255
    #[error("Buffer depth {depth} out of range (1..=255)")]
    InvalidBufferDepth {
        /// Declared depth
        depth: u32,
    },
}

/// Errors resolving `unit`/`buffer` to an address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No unit with this name
    #[error("Unit '{unit}' not found")]
    UnknownUnit {
        /// Requested unit
        unit: String,
    },

    /// Unit exists but has no such buffer on that side
    #[error("Unit '{unit}' has no {direction} buffer '{buffer}'")]
    UnknownBuffer {
        /// Unit name
        unit: String,
        /// Requested buffer
        buffer: String,
        /// Side searched
        direction: Direction,
    },
}

/// Which operand of a move an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Left of `->`
    Source,
    /// Right of `->`
    Destination,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::Destination => write!(f, "Destination"),
        }
    }
}

/// Errors from one assembly run. No instruction stream is returned on any of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    /// Label defined twice
    #[error("line {line}: duplicate label '{label}' (first defined on line {first_line})")]
    DuplicateLabel {
        /// Label name
        label: String,
        /// Line of the second definition
        line: usize,
        /// Line of the first definition
        first_line: usize,
    },

    /// Label named like a micro-op, `pc` or `null`
    #[error("line {line}: '{label}' is reserved and cannot name a label")]
    ReservedLabel {
        /// Label name
        label: String,
        /// Line of the definition
        line: usize,
    },

    /// Label referenced but never defined
    #[error("line {line}: unknown reference to '{label}'")]
    UnknownSymbol {
        /// Label name
        label: String,
        /// Line of the reference
        line: usize,
    },

    /// `unit@buffer` names a missing unit
    #[error("line {line}: {operand} unit '{unit}' not found in: {statement}")]
    UnknownUnit {
        /// Source or destination
        operand: Operand,
        /// Unit name
        unit: String,
        /// Offending statement
        statement: String,
        /// Source line
        line: usize,
    },

    /// `unit@buffer` names a missing buffer
    #[error("line {line}: {operand} buffer '{buffer}' not found on unit '{unit}' in: {statement}")]
    UnknownBuffer {
        /// Source or destination
        operand: Operand,
        /// Unit name
        unit: String,
        /// Buffer name
        buffer: String,
        /// Offending statement
        statement: String,
        /// Source line
        line: usize,
    },

    /// Source is neither immediate, micro-op, address nor label
    #[error("line {line}: source '{source_token}' is neither address nor immediate value in: {statement}")]
    MalformedSource {
        /// Offending token
        source_token: String,
        /// Offending statement
        statement: String,
        /// Source line
        line: usize,
    },

    /// `(token, N)` with a token that is no micro-op
    #[error("line {line}: no opcode corresponds to '{token}' in: {statement}")]
    UnknownMicroOp {
        /// Offending token
        token: String,
        /// Offending statement
        statement: String,
        /// Source line
        line: usize,
    },

    /// Destination is neither address, `pc` nor `null`
    #[error("line {line}: destination '{destination}' is no address in: {statement}")]
    InvalidDestination {
        /// Offending token
        destination: String,
        /// Offending statement
        statement: String,
        /// Source line
        line: usize,
    },

    /// `pc` written from a buffer address
    #[error("line {line}: only immediate or label moves to pc supported: {statement}")]
    InvalidPcSource {
        /// Offending statement
        statement: String,
        /// Source line
        line: usize,
    },

    /// Text that is no comment, label or move
    #[error("line {line}: unexpected text '{text}'")]
    UnexpectedText {
        /// Offending text
        text: String,
        /// Source line
        line: usize,
    },
}

/// Errors from the file-level entry points
#[derive(Debug, Error)]
pub enum ScadAsmError {
    /// Topology could not be built
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Program could not be assembled
    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl ResolveError {
    /// Create an unknown unit error
    pub fn unknown_unit(unit: impl Into<String>) -> Self {
        Self::UnknownUnit { unit: unit.into() }
    }

    /// Create an unknown buffer error
    pub fn unknown_buffer(unit: impl Into<String>, buffer: impl Into<String>, direction: Direction) -> Self {
        Self::UnknownBuffer {
            unit: unit.into(),
            buffer: buffer.into(),
            direction,
        }
    }
}

impl AssemblerError {
    /// Attach operand and statement context to a resolve failure
    pub fn from_resolve(err: ResolveError, operand: Operand, statement: &str, line: usize) -> Self {
        match err {
            ResolveError::UnknownUnit { unit } => Self::UnknownUnit {
                operand,
                unit,
                statement: statement.to_string(),
                line,
            },
            ResolveError::UnknownBuffer { unit, buffer, .. } => Self::UnknownBuffer {
                operand,
                unit,
                buffer,
                statement: statement.to_string(),
                line,
            },
        }
    }

    /// Source line the error refers to
    pub fn line(&self) -> usize {
        match self {
            Self::DuplicateLabel { line, .. }
            | Self::ReservedLabel { line, .. }
            | Self::UnknownSymbol { line, .. }
            | Self::UnknownUnit { line, .. }
            | Self::UnknownBuffer { line, .. }
            | Self::MalformedSource { line, .. }
            | Self::UnknownMicroOp { line, .. }
            | Self::InvalidDestination { line, .. }
            | Self::InvalidPcSource { line, .. }
            | Self::UnexpectedText { line, .. } => *line,
        }
    }
}
