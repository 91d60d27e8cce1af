#![deny(unsafe_code)]

//! SCAD topology model and assembler
//!
//! This crate turns a processor topology description and assembly text into
//! an ordered instruction stream for the SCAD dataflow processor.
//!
//! # Pipeline
//!
//! - **Topology**: a TOML document naming units, their types and numbers.
//!   Every `unit@buffer` name resolves to a fixed [`BufferAddress`].
//! - **Assembly**: comments, labels and `source -> destination` moves,
//!   scanned in one pass with label references recorded as fixups.
//! - **Build**: fixups are patched with label indices; any failure aborts
//!   the run without a partial stream.
//!
//! # Example
//!
//! ```
//! use scad_asm::{assemble, ProcessorDescription};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = ProcessorDescription::parse(r#"
//!     [processor]
//!     name = "demo"
//!     buffer_depth = 4
//!
//!     [[interconnect]]
//!     name = "ic"
//!     unit_count = 2
//!
//!     [[unit]]
//!     name = "a"
//!     type = "lsu"
//!     number = 0
//! "#)?;
//!
//! let program = assemble(&topology, "loop: $1 -> a@in0\nloop -> pc")?;
//! assert_eq!(program.len(), 2);
//! println!("{}", program[1]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod assembler;
mod error;
mod topology;

pub use assembler::{assemble, assemble_file, Assembler};
pub use error::{AssemblerError, Operand, ResolveError, Result, ScadAsmError, TopologyError};
pub use topology::{
    InterconnectDescription, ParameterValue, ProcessorDescription, UnitDescription, UnitSpec,
};

pub use scad_chip::{BufferAddress, Direction, Instruction, UnitType};

/// Resolve `unit`/`buffer` on one side of a topology to its address
///
/// Pure: the same arguments always give the same address.
///
/// # Errors
///
/// Returns error if the unit does not exist or lacks the buffer on that side.
pub fn resolve(
    topology: &ProcessorDescription,
    unit: &str,
    buffer: &str,
    direction: Direction,
) -> std::result::Result<BufferAddress, ResolveError> {
    topology.resolve(unit, buffer, direction)
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{assemble, resolve, Assembler, AssemblerError, ProcessorDescription, Result};
}
